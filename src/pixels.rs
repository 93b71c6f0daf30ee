//! Per-pixel averaged charge and waveform of the whole camera.

use eyre::{bail, Result, WrapErr};
use itertools::iproduct;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::{
    geometry::{CameraGeometry, GRID_SIDE, TOTAL_CELLS},
    waveform::WaveformSource,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pixel {
    pub charge: f64,
    pub waveform: Vec<f64>,
    pub module: u32,
    pub asic: u32,
    pub channel: u32,
}

impl Pixel {
    /// Pixel with no data assigned.
    pub fn empty(n_samples: usize) -> Self {
        Pixel {
            charge: 0.0,
            waveform: vec![0.0; n_samples],
            module: 0,
            asic: 0,
            channel: 0,
        }
    }
}

/// Mean charge over events, zero if the channel recorded nothing.
pub fn mean_charge(charge: &[f64]) -> f64 {
    if charge.is_empty() {
        0.0
    } else {
        charge.iter().mean()
    }
}

/// Sample-wise mean of the event traces.
pub fn mean_waveform(traces: &[Vec<f64>], n_samples: usize) -> Result<Vec<f64>> {
    let mut sum = vec![0.0; n_samples];
    for (event, trace) in traces.iter().enumerate() {
        if trace.len() != n_samples {
            bail!(
                "event {event} has {} samples, expected {n_samples}",
                trace.len()
            );
        }
        sum.iter_mut().zip(trace).for_each(|(acc, v)| *acc += v);
    }

    if !traces.is_empty() {
        let events = traces.len() as f64;
        sum.iter_mut().for_each(|acc| *acc /= events);
    }
    Ok(sum)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraImage {
    n_samples: usize,
    pixels: Vec<Pixel>,
}

impl CameraImage {
    pub fn new(n_samples: usize) -> Self {
        CameraImage {
            n_samples,
            pixels: vec![Pixel::empty(n_samples); TOTAL_CELLS],
        }
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Overwrites the pixel; nothing is accumulated across writes.
    pub fn set(&mut self, index: usize, pixel: Pixel) -> Result<()> {
        if pixel.waveform.len() != self.n_samples {
            bail!(
                "pixel {index} waveform has {} samples, expected {}",
                pixel.waveform.len(),
                self.n_samples
            );
        }
        match self.pixels.get_mut(index) {
            Some(slot) => *slot = pixel,
            None => bail!("pixel index {index} is out of the {TOTAL_CELLS} pixel grid"),
        }
        Ok(())
    }

    /// Averages every module/asic/channel of the source into its pixel.
    pub fn fill(&mut self, source: &dyn WaveformSource, geometry: &CameraGeometry) -> Result<()> {
        let asics = source.asic_list();
        let channels = source.channel_list();

        for module in source.module_list() {
            for (asic, channel) in iproduct!(asics.iter().copied(), channels.iter().copied()) {
                let grid_ind = geometry.pixel_index(module, asic, channel)?;

                let charge = source.charge(module, asic, channel)?;
                let traces = source.cal_waveform(module, asic, channel)?;
                let waveform = mean_waveform(&traces, self.n_samples)
                    .wrap_err_with(|| format!("Module{module}/Asic{asic}/Channel{channel}"))?;

                self.set(
                    grid_ind,
                    Pixel {
                        charge: mean_charge(&charge),
                        waveform,
                        module,
                        asic,
                        channel,
                    },
                )?;
            }
        }
        Ok(())
    }

    pub fn from_source(source: &dyn WaveformSource, geometry: &CameraGeometry) -> Result<Self> {
        let mut image = CameraImage::new(source.n_samples());
        image.fill(source, geometry)?;
        Ok(image)
    }

    pub fn max_charge(&self) -> f64 {
        self.pixels
            .iter()
            .map(|pixel| pixel.charge)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Charges as 32 rows of 32, row 0 first.
    pub fn charge_grid(&self) -> Vec<Vec<f64>> {
        self.pixels
            .chunks(GRID_SIDE)
            .map(|row| row.iter().map(|pixel| pixel.charge).collect())
            .collect()
    }
}

#[cfg(test)]
use crate::waveform::JsonRun;

#[test]
fn test_single_channel_lands_on_its_pixel() {
    let geometry = CameraGeometry::new(false);
    let mut run = JsonRun::new(4);
    run.insert(
        (100, 0, 0),
        vec![2.0, 4.0, 6.0],
        vec![
            vec![0.0, 1.0, 2.0, 3.0],
            vec![2.0, 3.0, 4.0, 5.0],
            vec![4.0, 5.0, 6.0, 7.0],
        ],
    );

    let image = CameraImage::from_source(&run, &geometry).unwrap();
    let expected = 7 * GRID_SIDE + 24;

    for (idx, pixel) in image.pixels().iter().enumerate() {
        if idx == expected {
            assert_eq!(pixel.charge, 4.0);
            assert_eq!(pixel.waveform, vec![2.0, 3.0, 4.0, 5.0]);
            assert_eq!((pixel.module, pixel.asic, pixel.channel), (100, 0, 0));
        } else {
            assert_eq!(*pixel, Pixel::empty(4));
        }
    }
    assert_eq!(image.max_charge(), 4.0);
    assert_eq!(image.charge_grid()[7][24], 4.0);
}

#[test]
fn test_last_write_wins() {
    let mut image = CameraImage::new(2);
    let pixel = |charge| Pixel {
        charge,
        waveform: vec![charge; 2],
        module: 100,
        asic: 0,
        channel: 0,
    };

    image.set(5, pixel(10.0)).unwrap();
    image.set(5, pixel(3.0)).unwrap();

    assert_eq!(image.pixels()[5].charge, 3.0);
    assert!(image.set(TOTAL_CELLS, pixel(1.0)).is_err());
}

#[test]
fn test_max_charge_of_negative_run() {
    let mut image = CameraImage::new(1);
    for idx in 0..TOTAL_CELLS {
        let pixel = Pixel {
            charge: -(idx as f64) - 3.0,
            waveform: vec![0.0],
            module: 100,
            asic: 0,
            channel: 0,
        };
        image.set(idx, pixel).unwrap();
    }
    assert_eq!(image.max_charge(), -3.0);
}

#[test]
fn test_mismatched_waveform_is_rejected() {
    assert!(mean_waveform(&[vec![1.0, 2.0], vec![1.0]], 2).is_err());
    assert_eq!(mean_waveform(&[], 3).unwrap(), vec![0.0; 3]);
    assert_eq!(mean_charge(&[]), 0.0);
}

#[test]
fn test_unknown_module_fails_fill() {
    let mut run = JsonRun::new(1);
    run.insert((999, 0, 0), vec![1.0], vec![vec![1.0]]);
    assert!(CameraImage::from_source(&run, &CameraGeometry::default()).is_err());
}
