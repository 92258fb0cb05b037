//! Read Agilent ChemStation GC/MS run folders and quantify the species they
//! identify against calibration standards.
pub mod io;
pub mod matching;
pub mod quant;

pub use crate::io::agilent::{decode_fid, decode_spectra, decode_trace, DataMsReader};
pub use crate::io::report::{parse_report, Keyed, KeyedTables, SchemaRegistry};
pub use crate::io::standards::StandardsTable;

pub use crate::matching::{
    match_retention_times, MatchParameters, MatchedTable, RetentionTimeMatcher,
};
pub use crate::quant::{compute_concentrations, fit_calibration, quantify, Quantification};
