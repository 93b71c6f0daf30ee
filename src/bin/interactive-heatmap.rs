//! Interactive camera heatmap of a single run: hover a pixel to see its
//! averaged waveform.

use std::path::PathBuf;

use clap::Parser;

use camera_heatmap::{make_heatmap, workspace::HeatmapConfig};

#[cfg(target_family = "unix")]
use tikv_jemallocator::Jemalloc;
#[cfg(target_family = "unix")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Arg {
    /// Run number, resolved to `<run_dir>/run<run_id>.h5`.
    /// Reading `.h5` runs needs the `hdf5` feature, without it point
    /// `file_pattern` in the config at a json run (e.g. `run{run}.json`)
    pub run_id: u32,
    /// Path to the config file in yaml format
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Show the camera as seen from its face instead of the sky view
    #[clap(long)]
    pub camera_facing: bool,
    /// Where to write the page
    #[clap(long, short)]
    pub output: Option<PathBuf>,
}

fn main() -> eyre::Result<()> {
    let args = Arg::parse();

    let mut config = match &args.config {
        Some(filepath) => HeatmapConfig::load(filepath)?,
        None => HeatmapConfig::default(),
    };
    config.camera_facing |= args.camera_facing;
    if let Some(output) = args.output {
        config.output = output;
    }

    let output = make_heatmap(&config, args.run_id)?;
    println!("Written {}", output.display());

    Ok(())
}
