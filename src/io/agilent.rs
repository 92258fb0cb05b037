//! Readers for the binary files Agilent ChemStation writes into a `.D` run folder.
//!
//! `DATA.MS` holds one record per scan. Each record carries its own length, a
//! retention time as a 60 kHz clock count, a list of packed (mass channel,
//! intensity) pairs, and a total ion intensity at its tail. [`decode_trace`]
//! reads the total ion chromatogram from it, and [`decode_spectra`] reads the
//! whole scan × mass channel matrix.
//!
//! `FID1A.ch` holds the flame ionization detector signal and is read by
//! [`decode_fid`].

mod fid;
mod header;
mod reader;
mod scan;
mod spectra;
mod trace;


pub use fid::{decode_fid, FidReader, FidReaderType, FidTrace};
pub use header::{
    ticks_to_minutes, AgilentDecodeError, DataMsHeader, InstrumentKind, CLOCK_TICKS_PER_MINUTE,
};
pub use reader::{decode_spectra, decode_trace, DataMsReader, DataMsReaderType, ScanIter};
pub use scan::{channel_mass, decode_intensity, IonPeak, Scan, MASS_CHANNEL_SCALE};
pub use spectra::{ChannelIndex, DenseSpectra, SpectralMatrix};
pub use trace::{Trace, TracePoint};
