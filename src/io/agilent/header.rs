use std::io::{self, prelude::*, SeekFrom};

use byteorder::{BigEndian, ByteOrder};
use log::debug;
use thiserror::Error;

/// Offset of the four byte instrument tag, the start of the file's type string
pub const TAG_OFFSET: u64 = 0x05;
/// Where GC-only instruments record the number of scans
pub const GC_SCAN_COUNT_OFFSET: u64 = 0x142;
/// Where MS instruments record the number of scans
pub const MS_SCAN_COUNT_OFFSET: u64 = 0x118;
/// Location of the data start pointer, stored in 16-bit words
pub const DATA_START_OFFSET: u64 = 0x10A;

/// The acquisition clock runs at 60 kHz on all ChemStation MS instruments
pub const CLOCK_TICKS_PER_MINUTE: f64 = 60000.0;

#[derive(Debug, Error)]
pub enum AgilentDecodeError {
    #[error("Malformed header at offset {offset:#x}: {reason}")]
    MalformedHeader { offset: u64, reason: String },
    #[error("Corrupt scan record {scan} at offset {offset:#x}: {reason}")]
    CorruptScanRecord {
        scan: usize,
        offset: u64,
        reason: String,
    },
    #[error("File ended early at offset {offset:#x}: {detail}")]
    TruncatedFile { offset: u64, detail: String },
    #[error("An IO error occurred: {0}")]
    IOError(
        #[from]
        #[source]
        io::Error,
    ),
}

impl AgilentDecodeError {
    /// Translate an [`io::Error`] raised while reading at `offset`, treating an
    /// unexpected end-of-file as a [`AgilentDecodeError::TruncatedFile`].
    pub(crate) fn from_read_error(err: io::Error, offset: u64, detail: impl Into<String>) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedFile {
                offset,
                detail: detail.into(),
            }
        } else {
            Self::IOError(err)
        }
    }

    /// The byte offset the error was raised at, if it is known
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::MalformedHeader { offset, .. }
            | Self::CorruptScanRecord { offset, .. }
            | Self::TruncatedFile { offset, .. } => Some(*offset),
            Self::IOError(_) => None,
        }
    }
}

impl From<AgilentDecodeError> for io::Error {
    fn from(value: AgilentDecodeError) -> Self {
        match value {
            AgilentDecodeError::IOError(e) => e,
            AgilentDecodeError::TruncatedFile { .. } => {
                Self::new(io::ErrorKind::UnexpectedEof, value)
            }
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// The two instrument families which store their scan count in different places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstrumentKind {
    /// A bare `GC` tag
    GcOnly,
    /// `GC / MS Data File` or `LC / MS Data File`
    MassSpectrometer,
}

impl InstrumentKind {
    /// Classify the four byte tag found at [`TAG_OFFSET`]
    pub fn from_tag(tag: &[u8; 4]) -> Option<Self> {
        match tag {
            b"GC /" | b"LC /" => Some(Self::MassSpectrometer),
            [b'G', b'C', rest @ ..] if rest.iter().all(|b| *b == 0 || *b == b' ') => {
                Some(Self::GcOnly)
            }
            _ => None,
        }
    }

    pub const fn scan_count_offset(&self) -> u64 {
        match self {
            Self::GcOnly => GC_SCAN_COUNT_OFFSET,
            Self::MassSpectrometer => MS_SCAN_COUNT_OFFSET,
        }
    }
}

/// The fixed-offset fields of a `DATA.MS` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataMsHeader {
    pub tag: [u8; 4],
    pub instrument: InstrumentKind,
    /// The number of scan records the file declares
    pub scan_count: usize,
    /// The absolute byte offset of the first scan record
    pub data_start: u64,
}

/// Every header field lies within this many leading bytes
const HEADER_SPAN: u64 = GC_SCAN_COUNT_OFFSET + 2;

/// Borrow `width` bytes at `offset` of the header block
fn header_field<'a>(
    block: &'a [u8],
    offset: u64,
    width: usize,
    what: &str,
) -> Result<&'a [u8], AgilentDecodeError> {
    let start = offset as usize;
    block
        .get(start..start + width)
        .ok_or_else(|| AgilentDecodeError::TruncatedFile {
            offset,
            detail: format!("reading {what}"),
        })
}

impl DataMsHeader {
    /// Read the header fields from `handle` with a single read of the leading
    /// bytes. The stream position afterwards is unspecified, callers should
    /// seek to [`DataMsHeader::data_start`].
    pub fn read_from<R: Read + Seek>(handle: &mut R) -> Result<Self, AgilentDecodeError> {
        handle.seek(SeekFrom::Start(0))?;
        let mut block = Vec::with_capacity(HEADER_SPAN as usize);
        handle.by_ref().take(HEADER_SPAN).read_to_end(&mut block)?;

        let mut tag = [0u8; 4];
        tag.copy_from_slice(header_field(&block, TAG_OFFSET, 4, "the instrument tag")?);

        let instrument =
            InstrumentKind::from_tag(&tag).ok_or_else(|| AgilentDecodeError::MalformedHeader {
                offset: TAG_OFFSET,
                reason: format!(
                    "unrecognized instrument tag {:?}",
                    String::from_utf8_lossy(&tag)
                ),
            })?;

        let count_offset = instrument.scan_count_offset();
        let scan_count =
            BigEndian::read_u16(header_field(&block, count_offset, 2, "the scan count")?) as usize;

        let pointer = BigEndian::read_u16(header_field(
            &block,
            DATA_START_OFFSET,
            2,
            "the data start pointer",
        )?);
        if pointer == 0 {
            return Err(AgilentDecodeError::MalformedHeader {
                offset: DATA_START_OFFSET,
                reason: "data start pointer is zero".into(),
            });
        }
        let data_start = 2 * pointer as u64 - 2;

        debug!("Read {instrument:?} header with {scan_count} scans starting at {data_start:#x}");

        Ok(Self {
            tag,
            instrument,
            scan_count,
            data_start,
        })
    }
}

/// Convert a raw 60 kHz clock count into minutes
#[inline]
pub fn ticks_to_minutes(ticks: u32) -> f64 {
    ticks as f64 / CLOCK_TICKS_PER_MINUTE
}

/// Convert a clock count stored as a float, as detector channel files do
#[inline]
pub fn ticks_to_minutes_f32(ticks: f32) -> f64 {
    ticks as f64 / CLOCK_TICKS_PER_MINUTE
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::agilent::tests::DataMsBuilder;

    #[test]
    fn test_instrument_tags() {
        assert_eq!(
            InstrumentKind::from_tag(b"GC /"),
            Some(InstrumentKind::MassSpectrometer)
        );
        assert_eq!(
            InstrumentKind::from_tag(b"LC /"),
            Some(InstrumentKind::MassSpectrometer)
        );
        assert_eq!(InstrumentKind::from_tag(b"GC\0\0"), Some(InstrumentKind::GcOnly));
        assert_eq!(InstrumentKind::from_tag(b"GC  "), Some(InstrumentKind::GcOnly));
        assert_eq!(InstrumentKind::from_tag(b"GCMS"), None);
        assert_eq!(InstrumentKind::from_tag(b"\0\0\0\0"), None);
    }

    #[test]
    fn test_read_header() -> Result<(), AgilentDecodeError> {
        let data = DataMsBuilder::new()
            .trace_scan(60000, 10)
            .trace_scan(120000, 20)
            .build();
        let mut cursor = io::Cursor::new(data);
        let header = DataMsHeader::read_from(&mut cursor)?;
        assert_eq!(header.instrument, InstrumentKind::MassSpectrometer);
        assert_eq!(header.scan_count, 2);
        assert_eq!(header.data_start, DataMsBuilder::DEFAULT_DATA_START);
        Ok(())
    }

    #[test]
    fn test_gc_only_header_uses_alternate_count() -> Result<(), AgilentDecodeError> {
        let data = DataMsBuilder::new()
            .tag(*b"GC\0\0")
            .trace_scan(60000, 10)
            .build();
        let mut cursor = io::Cursor::new(data);
        let header = DataMsHeader::read_from(&mut cursor)?;
        assert_eq!(header.instrument, InstrumentKind::GcOnly);
        assert_eq!(header.scan_count, 1);
        Ok(())
    }

    #[test]
    fn test_unknown_tag() {
        let data = DataMsBuilder::new().tag(*b"XYZW").build();
        let err = DataMsHeader::read_from(&mut io::Cursor::new(data)).unwrap_err();
        assert!(matches!(
            err,
            AgilentDecodeError::MalformedHeader { offset: TAG_OFFSET, .. }
        ));
    }

    #[test]
    fn test_zero_data_pointer() {
        let data = DataMsBuilder::new().data_pointer(0).build();
        let err = DataMsHeader::read_from(&mut io::Cursor::new(data)).unwrap_err();
        assert!(matches!(
            err,
            AgilentDecodeError::MalformedHeader {
                offset: DATA_START_OFFSET,
                ..
            }
        ));
    }

    #[test]
    fn test_short_file() {
        let err = DataMsHeader::read_from(&mut io::Cursor::new(b"\x01\x02\x03".to_vec()))
            .unwrap_err();
        assert!(matches!(err, AgilentDecodeError::TruncatedFile { .. }));
    }
}
