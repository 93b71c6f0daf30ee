//! Camera pixel geometry.
//!
//! The camera is a 4x4 grid of FPMs, each carrying one module whose 64
//! channels form an 8x8 pixel block. Blocks in every other FPM column are
//! mounted rotated by 180 degrees, and the whole image is mirrored
//! horizontally when looking at the sky instead of at the camera face.

use std::collections::BTreeMap;

use eyre::{eyre, Result};
use itertools::iproduct;

/// Side of the full camera image in pixels.
pub const GRID_SIDE: usize = 32;
/// Side of a single module block in pixels.
pub const BLOCK_SIDE: usize = 8;
/// Side of the FPM grid.
pub const FPM_SIDE: usize = GRID_SIDE / BLOCK_SIDE;
pub const TOTAL_CELLS: usize = GRID_SIDE * GRID_SIDE;
pub const CHANNELS_PER_ASIC: u32 = 16;

/// Module numbers in FPM order, paired positionally with [`FPM_NUMBERS`].
pub const MODULE_NUMBERS: [u32; 16] = [
    100, 111, 114, 107, 128, 123, 124, 112, 119, 108, 121, 110, 118, 125, 126, 101,
];

/// Occupied FPM slots, laid out row-major over the 4x4 grid.
pub const FPM_NUMBERS: [u32; 16] = [0, 1, 2, 3, 5, 6, 7, 8, 10, 11, 12, 13, 15, 16, 17, 18];

/// Combined channel id (`asic * 16 + channel`) at each pixel of a block.
pub const CHANNEL_NUMBERS: ChannelTable = [
    [21, 20, 17, 16, 5, 4, 1, 0],
    [23, 22, 19, 18, 7, 6, 3, 2],
    [29, 28, 25, 24, 13, 12, 9, 8],
    [31, 30, 27, 26, 15, 14, 11, 10],
    [53, 52, 49, 48, 37, 36, 33, 32],
    [55, 54, 51, 50, 39, 38, 35, 34],
    [61, 60, 57, 56, 45, 44, 41, 40],
    [63, 62, 59, 58, 47, 46, 43, 42],
];

pub type ChannelTable = [[u32; BLOCK_SIDE]; BLOCK_SIDE];

pub fn rotate_180(table: &ChannelTable) -> ChannelTable {
    let mut rotated = [[0; BLOCK_SIDE]; BLOCK_SIDE];
    for (row, col) in iproduct!(0..BLOCK_SIDE, 0..BLOCK_SIDE) {
        rotated[BLOCK_SIDE - 1 - row][BLOCK_SIDE - 1 - col] = table[row][col];
    }
    rotated
}

pub fn mirror_columns(table: &ChannelTable) -> ChannelTable {
    let mut mirrored = *table;
    mirrored.iter_mut().for_each(|row| row.reverse());
    mirrored
}

/// Combined channel id as stored in [`CHANNEL_NUMBERS`].
pub fn combined_channel(asic: u32, channel: u32) -> u32 {
    asic * CHANNELS_PER_ASIC + channel
}

/// channel id -> row-major position inside the block
fn positions(table: &ChannelTable) -> BTreeMap<u32, usize> {
    table
        .iter()
        .flatten()
        .enumerate()
        .map(|(pos, ch)| (*ch, pos))
        .collect()
}

#[derive(Debug, Clone)]
pub struct CameraGeometry {
    camera_facing: bool,
    module_to_fpm: BTreeMap<u32, u32>,
    fpm_to_pos: BTreeMap<u32, (usize, usize)>,
    channel_table: ChannelTable,
    rotated_channel_table: ChannelTable,
    ch_to_pos: BTreeMap<u32, usize>,
    rot_ch_to_pos: BTreeMap<u32, usize>,
}

impl CameraGeometry {
    pub fn new(camera_facing: bool) -> Self {
        let module_to_fpm = MODULE_NUMBERS
            .iter()
            .copied()
            .zip(FPM_NUMBERS.iter().copied())
            .collect();

        let fpm_to_pos = FPM_NUMBERS
            .iter()
            .copied()
            .zip(iproduct!(0..FPM_SIDE, 0..FPM_SIDE))
            .collect();

        let channel_table = if camera_facing {
            mirror_columns(&CHANNEL_NUMBERS)
        } else {
            CHANNEL_NUMBERS
        };
        let rotated_channel_table = rotate_180(&channel_table);

        CameraGeometry {
            camera_facing,
            module_to_fpm,
            fpm_to_pos,
            ch_to_pos: positions(&channel_table),
            rot_ch_to_pos: positions(&rotated_channel_table),
            channel_table,
            rotated_channel_table,
        }
    }

    pub fn channel_table(&self) -> &ChannelTable {
        &self.channel_table
    }

    pub fn rotated_channel_table(&self) -> &ChannelTable {
        &self.rotated_channel_table
    }

    pub fn fpm(&self, module: u32) -> Result<u32> {
        self.module_to_fpm
            .get(&module)
            .copied()
            .ok_or_else(|| eyre!("module {module} is not mounted on the camera"))
    }

    /// (row, column) of the module in the FPM grid, before mirroring.
    pub fn quadrant(&self, module: u32) -> Result<(usize, usize)> {
        let fpm = self.fpm(module)?;
        self.fpm_to_pos
            .get(&fpm)
            .copied()
            .ok_or_else(|| eyre!("FPM {fpm} has no grid position"))
    }

    /// Flat pixel indices of the module block, in block row-major order.
    pub fn block_indices(&self, module: u32) -> Result<[usize; BLOCK_SIDE * BLOCK_SIDE]> {
        let (i, j) = self.quadrant(module)?;
        let j = if self.camera_facing { j } else { FPM_SIDE - 1 - j };

        let mut indices = [0; BLOCK_SIDE * BLOCK_SIDE];
        for (pos, (row, col)) in iproduct!(0..BLOCK_SIDE, 0..BLOCK_SIDE).enumerate() {
            indices[pos] = (BLOCK_SIDE * i + row) * GRID_SIDE + BLOCK_SIDE * j + col;
        }
        Ok(indices)
    }

    pub fn pixel_index(&self, module: u32, asic: u32, channel: u32) -> Result<usize> {
        let (_, j) = self.quadrant(module)?;

        // rotation parity is taken from the unmirrored column
        let ch_map = if j % 2 == 0 {
            &self.rot_ch_to_pos
        } else {
            &self.ch_to_pos
        };

        let pos = ch_map
            .get(&combined_channel(asic, channel))
            .copied()
            .ok_or_else(|| {
                eyre!("module {module} asic {asic} channel {channel} has no pixel position")
            })?;

        Ok(self.block_indices(module)?[pos])
    }
}

impl Default for CameraGeometry {
    fn default() -> Self {
        CameraGeometry::new(false)
    }
}

#[cfg(test)]
fn all_triples() -> impl Iterator<Item = (u32, u32, u32)> {
    iproduct!(MODULE_NUMBERS.into_iter(), 0..4u32, 0..CHANNELS_PER_ASIC)
}

#[test]
fn test_indices_are_unique_and_cover_grid() {
    use std::collections::BTreeSet;

    for camera_facing in [false, true] {
        let geometry = CameraGeometry::new(camera_facing);
        let indices = all_triples()
            .map(|(module, asic, channel)| geometry.pixel_index(module, asic, channel).unwrap())
            .collect::<BTreeSet<_>>();

        assert_eq!(indices.len(), TOTAL_CELLS);
        assert!(indices.iter().all(|idx| *idx < TOTAL_CELLS));
    }
}

#[test]
fn test_camera_facing_mirrors_columns() {
    let sky = CameraGeometry::new(false);
    let camera = CameraGeometry::new(true);

    for (module, asic, channel) in all_triples() {
        let sky_idx = sky.pixel_index(module, asic, channel).unwrap();
        let camera_idx = camera.pixel_index(module, asic, channel).unwrap();

        assert_eq!(sky_idx / GRID_SIDE, camera_idx / GRID_SIDE);
        assert_eq!(sky_idx % GRID_SIDE, GRID_SIDE - 1 - camera_idx % GRID_SIDE);
    }
}

#[test]
fn test_rotated_table_is_inverse_rotation() {
    for camera_facing in [false, true] {
        let geometry = CameraGeometry::new(camera_facing);
        assert_eq!(rotate_180(geometry.rotated_channel_table()), *geometry.channel_table());
        assert_eq!(rotate_180(geometry.channel_table()), *geometry.rotated_channel_table());
    }
    assert_eq!(CHANNEL_NUMBERS[0][7], 0);
    assert_eq!(rotate_180(&CHANNEL_NUMBERS)[7][0], 0);
}

#[test]
fn test_known_positions() {
    let sky = CameraGeometry::new(false);
    // module 100 sits in FPM 0 (even column, rotated) and is mirrored to the right edge
    assert_eq!(sky.quadrant(100).unwrap(), (0, 0));
    assert_eq!(sky.pixel_index(100, 0, 0).unwrap(), 7 * GRID_SIDE + 24);
    // module 111 sits in FPM 1 (odd column, not rotated)
    assert_eq!(sky.quadrant(111).unwrap(), (0, 1));
    assert_eq!(sky.pixel_index(111, 0, 0).unwrap(), 23);
    // FPM 18 is the last slot
    assert_eq!(sky.quadrant(101).unwrap(), (3, 3));

    let camera = CameraGeometry::new(true);
    assert_eq!(camera.pixel_index(100, 0, 0).unwrap(), 7 * GRID_SIDE + 7);
}

#[test]
fn test_unmapped_lookups_fail() {
    let geometry = CameraGeometry::default();
    assert!(geometry.pixel_index(999, 0, 0).is_err());
    assert!(geometry.pixel_index(100, 4, 0).is_err());
    assert!(geometry.quadrant(102).is_err());
}
