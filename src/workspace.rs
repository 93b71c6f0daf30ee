// Defaults for everything the heatmap binary reads and writes,
// overridable from a yaml config and from the command line.

use std::{fs::File, path::{Path, PathBuf}};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};

pub fn get_run_dir() -> PathBuf {
    PathBuf::from("run_files")
}

pub fn get_file_pattern() -> String {
    "run{run}.h5".to_owned()
}

pub fn get_output() -> PathBuf {
    PathBuf::from("interactive_heatmap.html")
}

pub fn get_thumbnail_size() -> (u32, u32) {
    (640, 480)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub run_dir: PathBuf,
    /// File name of a run, `{run}` is replaced with the run id
    pub file_pattern: String,
    pub output: PathBuf,
    pub camera_facing: bool,
    pub title: Option<String>,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        let (thumbnail_width, thumbnail_height) = get_thumbnail_size();
        HeatmapConfig {
            run_dir: get_run_dir(),
            file_pattern: get_file_pattern(),
            output: get_output(),
            camera_facing: false,
            title: None,
            thumbnail_width,
            thumbnail_height,
        }
    }
}

impl HeatmapConfig {
    pub fn load(filepath: &Path) -> Result<Self> {
        let file = File::open(filepath)
            .wrap_err_with(|| format!("can't open config {}", filepath.display()))?;
        serde_yaml::from_reader(file)
            .wrap_err_with(|| format!("malformed config {}", filepath.display()))
    }

    pub fn run_file(&self, run_id: u32) -> PathBuf {
        self.run_dir
            .join(self.file_pattern.replace("{run}", &run_id.to_string()))
    }

    pub fn plot_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None if self.camera_facing => "Camera View Camera Image".to_owned(),
            None => "Sky View Camera Image".to_owned(),
        }
    }

    pub fn thumbnail_size(&self) -> (u32, u32) {
        (self.thumbnail_width, self.thumbnail_height)
    }
}

#[test]
fn test_defaults() {
    let config = HeatmapConfig::default();
    assert_eq!(config.run_file(42), PathBuf::from("run_files/run42.h5"));
    assert_eq!(config.output, PathBuf::from("interactive_heatmap.html"));
    assert_eq!(config.plot_title(), "Sky View Camera Image");
    assert_eq!(config.thumbnail_size(), (640, 480));
}

#[test]
fn test_partial_yaml() {
    let config: HeatmapConfig = serde_yaml::from_str(
        "run_dir: /data/sct\nfile_pattern: run{run}.json\ncamera_facing: true\n",
    )
    .unwrap();

    assert_eq!(config.run_file(7), PathBuf::from("/data/sct/run7.json"));
    assert_eq!(config.plot_title(), "Camera View Camera Image");
    assert_eq!(config.output, get_output());
}
