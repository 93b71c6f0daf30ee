//! Access to per-channel charge and calibrated waveform data of a run.
//!
//! Data is addressed by branch paths of the form
//! `Module{m}/Asic{a}/Channel{c}/{charge|cal_waveform}`.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use eyre::{bail, eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Charge,
    CalWaveform,
}

impl BranchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchKind::Charge => "charge",
            BranchKind::CalWaveform => "cal_waveform",
        }
    }
}

pub fn branch_path(module: u32, asic: u32, channel: u32, kind: BranchKind) -> String {
    format!("Module{module}/Asic{asic}/Channel{channel}/{}", kind.as_str())
}

/// Content of a single branch: one value per event or one trace per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Branch {
    Values(Vec<f64>),
    Traces(Vec<Vec<f64>>),
}

pub trait WaveformSource {
    fn module_list(&self) -> Vec<u32>;
    fn asic_list(&self) -> Vec<u32>;
    fn channel_list(&self) -> Vec<u32>;
    fn n_samples(&self) -> usize;
    fn branch(&self, path: &str) -> Result<Branch>;

    /// Charge of every event recorded by the channel.
    fn charge(&self, module: u32, asic: u32, channel: u32) -> Result<Vec<f64>> {
        let path = branch_path(module, asic, channel, BranchKind::Charge);
        match self.branch(&path)? {
            Branch::Values(values) => Ok(values),
            Branch::Traces(_) => bail!("{path} holds traces instead of values"),
        }
    }

    /// Calibrated waveform of every event recorded by the channel.
    fn cal_waveform(&self, module: u32, asic: u32, channel: u32) -> Result<Vec<Vec<f64>>> {
        let path = branch_path(module, asic, channel, BranchKind::CalWaveform);
        match self.branch(&path)? {
            Branch::Traces(traces) => Ok(traces),
            // an empty json array can't be told apart from an empty trace list
            Branch::Values(values) if values.is_empty() => Ok(vec![]),
            Branch::Values(_) => bail!("{path} holds values instead of traces"),
        }
    }
}

/// Run stored as a single json document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonRun {
    pub modules: Vec<u32>,
    pub asics: Vec<u32>,
    pub channels: Vec<u32>,
    pub n_samples: usize,
    pub branches: BTreeMap<String, Branch>,
}

impl JsonRun {
    pub fn new(n_samples: usize) -> Self {
        JsonRun {
            n_samples,
            ..Default::default()
        }
    }

    pub fn load(filepath: &Path) -> Result<Self> {
        let file = File::open(filepath)
            .wrap_err_with(|| format!("can't open run file {}", filepath.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .wrap_err_with(|| format!("malformed run file {}", filepath.display()))
    }

    pub fn save(&self, filepath: &Path) -> Result<()> {
        let file = File::create(filepath)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Add data of one channel, registering its module/asic/channel ids.
    pub fn insert(
        &mut self,
        (module, asic, channel): (u32, u32, u32),
        charge: Vec<f64>,
        cal_waveform: Vec<Vec<f64>>,
    ) {
        for (list, id) in [
            (&mut self.modules, module),
            (&mut self.asics, asic),
            (&mut self.channels, channel),
        ] {
            if !list.contains(&id) {
                list.push(id);
            }
        }
        self.branches.insert(
            branch_path(module, asic, channel, BranchKind::Charge),
            Branch::Values(charge),
        );
        self.branches.insert(
            branch_path(module, asic, channel, BranchKind::CalWaveform),
            Branch::Traces(cal_waveform),
        );
    }
}

impl WaveformSource for JsonRun {
    fn module_list(&self) -> Vec<u32> {
        self.modules.clone()
    }

    fn asic_list(&self) -> Vec<u32> {
        self.asics.clone()
    }

    fn channel_list(&self) -> Vec<u32> {
        self.channels.clone()
    }

    fn n_samples(&self) -> usize {
        self.n_samples
    }

    fn branch(&self, path: &str) -> Result<Branch> {
        self.branches
            .get(path)
            .cloned()
            .ok_or_else(|| eyre!("branch {path} not found"))
    }
}

/// Parses ids out of group names like `Module100`.
#[cfg_attr(not(feature = "hdf5"), allow(dead_code))]
fn parse_ids(names: &[String], prefix: &str) -> Vec<u32> {
    let mut ids = names
        .iter()
        .filter_map(|name| name.strip_prefix(prefix)?.parse::<u32>().ok())
        .collect::<Vec<_>>();
    ids.sort_unstable();
    ids
}

#[cfg(feature = "hdf5")]
pub use h5::Hdf5Run;

#[cfg(feature = "hdf5")]
mod h5 {
    use std::path::Path;

    use eyre::{bail, eyre, Result, WrapErr};

    use super::{parse_ids, Branch, WaveformSource};

    /// Run stored as `Module{m}/Asic{a}/Channel{c}` groups holding
    /// `charge` (events) and `cal_waveform` (events x samples) datasets.
    pub struct Hdf5Run {
        file: hdf5::File,
        modules: Vec<u32>,
        asics: Vec<u32>,
        channels: Vec<u32>,
        n_samples: usize,
    }

    impl Hdf5Run {
        pub fn open(filepath: &Path) -> Result<Self> {
            let file = hdf5::File::open(filepath)
                .wrap_err_with(|| format!("can't open run file {}", filepath.display()))?;

            let modules = parse_ids(&file.member_names()?, "Module");
            let first_module = modules
                .first()
                .ok_or_else(|| eyre!("{} has no Module groups", filepath.display()))?;
            let module_group = file.group(&format!("Module{first_module}"))?;

            let asics = parse_ids(&module_group.member_names()?, "Asic");
            let first_asic = asics
                .first()
                .ok_or_else(|| eyre!("Module{first_module} has no Asic groups"))?;
            let asic_group = module_group.group(&format!("Asic{first_asic}"))?;

            let channels = parse_ids(&asic_group.member_names()?, "Channel");
            let first_channel = channels.first().ok_or_else(|| {
                eyre!("Module{first_module}/Asic{first_asic} has no Channel groups")
            })?;

            let shape = asic_group
                .dataset(&format!("Channel{first_channel}/cal_waveform"))?
                .shape();
            let n_samples = match shape.as_slice() {
                [_, samples] => *samples,
                _ => bail!("cal_waveform must be two-dimensional, got shape {shape:?}"),
            };

            Ok(Hdf5Run {
                file,
                modules,
                asics,
                channels,
                n_samples,
            })
        }
    }

    impl WaveformSource for Hdf5Run {
        fn module_list(&self) -> Vec<u32> {
            self.modules.clone()
        }

        fn asic_list(&self) -> Vec<u32> {
            self.asics.clone()
        }

        fn channel_list(&self) -> Vec<u32> {
            self.channels.clone()
        }

        fn n_samples(&self) -> usize {
            self.n_samples
        }

        fn branch(&self, path: &str) -> Result<Branch> {
            let dataset = self
                .file
                .dataset(path)
                .wrap_err_with(|| format!("branch {path} not found"))?;
            let shape = dataset.shape();
            let raw = dataset.read_raw::<f64>()?;

            match shape.as_slice() {
                [_] => Ok(Branch::Values(raw)),
                [events, 0] => Ok(Branch::Traces(vec![vec![]; *events])),
                [_, samples] => Ok(Branch::Traces(
                    raw.chunks(*samples).map(|trace| trace.to_vec()).collect(),
                )),
                _ => bail!("branch {path} has unsupported shape {shape:?}"),
            }
        }
    }
}

/// Opens a run file, picking the reader by extension.
pub fn open_run(filepath: &Path) -> Result<Box<dyn WaveformSource>> {
    let extension = filepath
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    match extension {
        #[cfg(feature = "hdf5")]
        "h5" | "hdf5" => Ok(Box::new(Hdf5Run::open(filepath)?)),
        #[cfg(not(feature = "hdf5"))]
        "h5" | "hdf5" => bail!(
            "{} is an hdf5 file but hdf5 support is not compiled in (enable the `hdf5` feature)",
            filepath.display()
        ),
        _ => Ok(Box::new(JsonRun::load(filepath)?)),
    }
}

#[test]
fn test_branch_paths() {
    assert_eq!(
        branch_path(100, 2, 15, BranchKind::CalWaveform),
        "Module100/Asic2/Channel15/cal_waveform"
    );
    assert_eq!(branch_path(101, 0, 0, BranchKind::Charge), "Module101/Asic0/Channel0/charge");
}

#[test]
fn test_json_run_access() {
    let mut run = JsonRun::new(3);
    run.insert((100, 0, 1), vec![1.0, 2.0], vec![vec![0.0, 1.0, 2.0]]);
    run.insert((100, 1, 1), vec![3.0], vec![vec![1.0, 1.0, 1.0]]);

    assert_eq!(run.module_list(), vec![100]);
    assert_eq!(run.asic_list(), vec![0, 1]);
    assert_eq!(run.channel_list(), vec![1]);
    assert_eq!(run.charge(100, 0, 1).unwrap(), vec![1.0, 2.0]);
    assert_eq!(run.cal_waveform(100, 1, 1).unwrap(), vec![vec![1.0, 1.0, 1.0]]);
    assert!(run.charge(100, 0, 2).is_err());
    assert!(run.branch("Module100/Asic0/Channel1/cal_waveform").is_ok());
}

#[test]
fn test_json_branches_deserialize() {
    let json = r#"{
        "modules": [100], "asics": [0], "channels": [0], "n_samples": 2,
        "branches": {
            "Module100/Asic0/Channel0/charge": [5.0, 7.0],
            "Module100/Asic0/Channel0/cal_waveform": [[1.0, 2.0], [3.0, 4.0]]
        }
    }"#;
    let run: JsonRun = serde_json::from_str(json).unwrap();

    assert_eq!(run.charge(100, 0, 0).unwrap(), vec![5.0, 7.0]);
    assert_eq!(run.cal_waveform(100, 0, 0).unwrap(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    assert!(matches!(
        run.branch("Module100/Asic0/Channel0/charge").unwrap(),
        Branch::Values(_)
    ));
}

#[test]
fn test_parse_group_ids() {
    let names = ["Module101", "Module100", "Extra", "ModuleX"]
        .map(String::from)
        .to_vec();
    assert_eq!(parse_ids(&names, "Module"), vec![100, 101]);
}

#[cfg(feature = "hdf5")]
#[test]
fn test_hdf5_run_access() {
    let dir = tempfile::tempdir().unwrap();
    let filepath = dir.path().join("run1.h5");
    {
        let file = hdf5::File::create(&filepath).unwrap();
        let asic = file.create_group("Module100").unwrap().create_group("Asic0").unwrap();
        for (channel, offset) in [(0u32, 0.0), (1, 10.0)] {
            let group = asic.create_group(&format!("Channel{channel}")).unwrap();
            group
                .new_dataset::<f64>()
                .shape([2])
                .create("charge")
                .unwrap()
                .write(&[offset + 1.0, offset + 2.0][..])
                .unwrap();
            group
                .new_dataset::<f64>()
                .shape([2, 3])
                .create("cal_waveform")
                .unwrap()
                .write_raw(&[0.0, offset, 0.0, 1.0, offset + 1.0, 1.0][..])
                .unwrap();
        }
    }

    let run = open_run(&filepath).unwrap();
    assert_eq!(run.module_list(), vec![100]);
    assert_eq!(run.asic_list(), vec![0]);
    assert_eq!(run.channel_list(), vec![0, 1]);
    assert_eq!(run.n_samples(), 3);
    assert_eq!(run.charge(100, 0, 1).unwrap(), vec![11.0, 12.0]);
    assert_eq!(
        run.cal_waveform(100, 0, 1).unwrap(),
        vec![vec![0.0, 10.0, 0.0], vec![1.0, 11.0, 1.0]]
    );
    assert!(run.charge(100, 0, 2).is_err());
}

#[cfg(not(feature = "hdf5"))]
#[test]
fn test_hdf5_needs_feature() {
    let err = open_run(Path::new("run_files/run1.h5")).err().unwrap();
    assert!(err.to_string().contains("hdf5 support is not compiled in"));
}
