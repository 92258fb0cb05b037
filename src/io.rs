pub mod agilent;
pub mod discovery;
pub mod report;
pub mod standards;

pub use crate::io::agilent::{
    decode_fid, decode_spectra, decode_trace, AgilentDecodeError, DataMsReader, FidReader,
    FidTrace, SpectralMatrix, Trace,
};
pub use crate::io::discovery::{discover_runs, RunDirectory, RunFileKind};
pub use crate::io::report::{
    parse_report, parse_report_path, Keyed, KeyedTables, ReportError, ReportTables,
    SchemaRegistry, TableKind,
};
pub use crate::io::standards::{StandardsError, StandardsTable};
