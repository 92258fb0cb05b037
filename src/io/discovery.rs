//! Locating the files of ChemStation `.D` run folders

use std::{
    fmt::Display,
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

/// The files a ChemStation run folder may hold that this crate reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunFileKind {
    /// `DATA.MS`, the mass spectrometer scans
    DataMs,
    /// `RESULTS.CSV`, the integration and library search report
    Results,
    /// `FID1A.ch`, the flame ionization detector signal
    Fid,
    Unknown,
}

impl RunFileKind {
    /// Classify a file by its name, ignoring case
    pub fn from_file_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "data.ms" => Self::DataMs,
            "results.csv" => Self::Results,
            "fid1a.ch" => Self::Fid,
            _ => Self::Unknown,
        }
    }
}

impl Display for RunFileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Whether `path` looks like a ChemStation run folder, a directory ending in `.D`
pub fn is_run_directory(path: &Path) -> bool {
    path.is_dir()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("d"))
}

/// The known files found in one run folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunDirectory {
    /// The run key, by default the folder name
    pub key: String,
    pub path: PathBuf,
    pub data_ms: Option<PathBuf>,
    pub results: Option<PathBuf>,
    pub fid: Option<PathBuf>,
}

impl RunDirectory {
    /// List the known files in the folder at `path`, keyed by the folder name
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::open_with_key(path, key)
    }

    pub fn open_with_key<P: AsRef<Path>>(path: P, key: impl Into<String>) -> io::Result<Self> {
        let path = path.as_ref();
        let mut this = Self {
            key: key.into(),
            path: path.to_path_buf(),
            ..Default::default()
        };
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let slot = match RunFileKind::from_file_name(&name.to_string_lossy()) {
                RunFileKind::DataMs => &mut this.data_ms,
                RunFileKind::Results => &mut this.results,
                RunFileKind::Fid => &mut this.fid,
                RunFileKind::Unknown => continue,
            };
            if let Some(previous) = slot.replace(entry.path()) {
                warn!(
                    "{} holds more than one file like {}, using {}",
                    path.display(),
                    previous.display(),
                    entry.path().display()
                );
            }
        }
        debug!(
            "Run {} has DATA.MS: {}, RESULTS.CSV: {}, FID: {}",
            this.key,
            this.data_ms.is_some(),
            this.results.is_some(),
            this.fid.is_some()
        );
        Ok(this)
    }

    pub fn file(&self, kind: RunFileKind) -> Option<&Path> {
        match kind {
            RunFileKind::DataMs => self.data_ms.as_deref(),
            RunFileKind::Results => self.results.as_deref(),
            RunFileKind::Fid => self.fid.as_deref(),
            RunFileKind::Unknown => None,
        }
    }
}

/// Find every run folder directly below `root`, in name order
pub fn discover_runs<P: AsRef<Path>>(root: P) -> io::Result<Vec<RunDirectory>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(root.as_ref())? {
        let path = entry?.path();
        if is_run_directory(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    paths.into_iter().map(RunDirectory::open).collect()
}
