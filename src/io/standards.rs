//! The table of known concentrations in each calibration standard.
//!
//! It is written by hand as a CSV file with one row per species and one
//! column per standard run:
//!
//! ```text
//! library_id,STD01.D,STD02.D
//! Methanol,0.5,1.0
//! Toluene,,0.25
//! ```
//!
//! An empty cell means the species is not present in that standard.

use std::{fs, io, path::Path};

use thiserror::Error;

/// The name of the first column of a standards table
pub const SPECIES_COLUMN: &str = "library_id";

#[derive(Debug, Error)]
pub enum StandardsError {
    #[error("The standards table must start with a {SPECIES_COLUMN:?} column, found {found:?}")]
    MissingSpeciesColumn { found: Option<String> },
    #[error("Invalid concentration {text:?} for sample {sample:?} on line {line}")]
    InvalidValue {
        line: u64,
        sample: String,
        text: String,
    },
    #[error("Failed to read the standards table: {0}")]
    CSVError(
        #[from]
        #[source]
        csv::Error,
    ),
    #[error("An IO error occurred: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl From<StandardsError> for io::Error {
    fn from(value: StandardsError) -> Self {
        match value {
            StandardsError::IOError(e) => e,
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// One species' known concentrations, one per sample column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StandardsRow {
    pub library_id: String,
    pub concentrations: Vec<Option<f64>>,
}

/// One known (species, sample, concentration) point
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StandardPoint {
    pub library_id: String,
    pub sample: String,
    pub concentration: f64,
}

/// A wide table of species × standard sample concentrations
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StandardsTable {
    samples: Vec<String>,
    rows: Vec<StandardsRow>,
}

impl StandardsTable {
    pub fn new(samples: Vec<String>) -> Self {
        Self {
            samples,
            rows: Vec::new(),
        }
    }

    /// Add a species row. Missing trailing cells are unknown.
    pub fn push(&mut self, library_id: impl Into<String>, mut concentrations: Vec<Option<f64>>) {
        concentrations.resize(self.samples.len(), None);
        self.rows.push(StandardsRow {
            library_id: library_id.into(),
            concentrations,
        });
    }

    pub fn with_row(
        mut self,
        library_id: impl Into<String>,
        concentrations: Vec<Option<f64>>,
    ) -> Self {
        self.push(library_id, concentrations);
        self
    }

    /// The sample column names, i.e. the run keys of the standards
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn rows(&self) -> &[StandardsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether `key` names one of the standard samples
    pub fn is_standard_sample(&self, key: &str) -> bool {
        self.samples.iter().any(|s| s == key)
    }

    /// Reshape into one point per known concentration, species-major
    pub fn melt(&self) -> Vec<StandardPoint> {
        self.rows
            .iter()
            .flat_map(|row| {
                self.samples
                    .iter()
                    .zip(row.concentrations.iter())
                    .filter_map(move |(sample, conc)| {
                        conc.map(|concentration| StandardPoint {
                            library_id: row.library_id.clone(),
                            sample: sample.clone(),
                            concentration,
                        })
                    })
            })
            .collect()
    }

    /// Read a standards table from CSV text
    pub fn read_csv<R: io::Read>(stream: R) -> Result<Self, StandardsError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(stream);
        let headers = reader.headers()?.clone();
        match headers.get(0) {
            Some(SPECIES_COLUMN) => {}
            found => {
                return Err(StandardsError::MissingSpeciesColumn {
                    found: found.map(String::from),
                })
            }
        }
        let samples: Vec<String> = headers.iter().skip(1).map(String::from).collect();
        let mut table = Self::new(samples);

        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let Some(library_id) = record.get(0).filter(|s| !s.is_empty()) else {
                continue;
            };
            let mut concentrations = Vec::with_capacity(table.samples.len());
            for (sample, cell) in table.samples.iter().zip(record.iter().skip(1)) {
                if cell.is_empty() {
                    concentrations.push(None);
                    continue;
                }
                let value: f64 = cell.parse().map_err(|_| StandardsError::InvalidValue {
                    line,
                    sample: sample.clone(),
                    text: cell.to_string(),
                })?;
                concentrations.push(if value.is_nan() { None } else { Some(value) });
            }
            table.push(library_id, concentrations);
        }
        Ok(table)
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, StandardsError> {
        let handle = fs::File::open(path.as_ref())?;
        Self::read_csv(io::BufReader::new(handle))
    }
}
