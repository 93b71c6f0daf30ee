use std::path::PathBuf;

use eyre::Result;

use geometry::CameraGeometry;
use pixels::CameraImage;
use workspace::HeatmapConfig;

pub mod geometry;
pub mod html;
pub mod pixels;
pub mod thumbnail;
pub mod waveform;

pub mod workspace;

/// Reads the run and assigns its channels to camera pixels.
pub fn load_image(config: &HeatmapConfig, run_id: u32) -> Result<CameraImage> {
    let filepath = config.run_file(run_id);
    println!("Reading file: {}", filepath.display());
    let source = waveform::open_run(&filepath)?;

    println!("Generating camera image pixel mappings");
    let geometry = CameraGeometry::new(config.camera_facing);

    println!("Assigning data to correct location in pixel map");
    CameraImage::from_source(source.as_ref(), &geometry)
}

/// Full pipeline, returns the path of the written page.
pub fn make_heatmap(config: &HeatmapConfig, run_id: u32) -> Result<PathBuf> {
    let image = load_image(config, run_id)?;
    let image_uris = thumbnail::render_all(&image, config.thumbnail_size())?;

    println!("Generating html");
    html::write_page(&config.output, &image, image_uris, &config.plot_title())?;

    Ok(config.output.clone())
}
