use std::{
    fs,
    io::{self, prelude::*, SeekFrom},
    path::Path,
};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use log::debug;

use super::header::{ticks_to_minutes_f32, AgilentDecodeError};
use super::trace::Trace;

/// Where the acquisition start time is stored, followed by the end time
pub const FID_TIME_RANGE_OFFSET: u64 = 0x11A;
/// Where the signal values begin. They continue to the end of the file.
pub const FID_SIGNAL_OFFSET: u64 = 0x1800;

const SIGNAL_VALUE_SIZE: usize = 8;

/// A flame ionization detector trace read from a `FID1A.ch` file
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FidTrace {
    /// The declared acquisition start, in minutes
    pub start_time: f64,
    /// The declared acquisition end, in minutes
    pub end_time: f64,
    pub signal: Trace,
}

impl FidTrace {
    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }
}

/// `count` evenly spaced values from `start` to `end` inclusive
fn linspace(start: f64, end: f64, count: usize) -> impl Iterator<Item = f64> {
    let step = if count > 1 {
        (end - start) / (count - 1) as f64
    } else {
        0.0
    };
    (0..count).map(move |i| {
        if count > 1 && i == count - 1 {
            end
        } else {
            start + step * i as f64
        }
    })
}

/// A reader for the FID channel files written next to `DATA.MS`
pub struct FidReaderType<R: Read + Seek> {
    handle: io::BufReader<R>,
    start_time: f64,
    end_time: f64,
    length: u64,
}

pub type FidReader = FidReaderType<fs::File>;

impl<R: Read + Seek> FidReaderType<R> {
    pub fn new(stream: R) -> Result<Self, AgilentDecodeError> {
        let mut handle = io::BufReader::new(stream);
        let length = handle.seek(SeekFrom::End(0))?;
        if length < FID_SIGNAL_OFFSET {
            return Err(AgilentDecodeError::TruncatedFile {
                offset: length,
                detail: format!(
                    "FID files hold their signal from {FID_SIGNAL_OFFSET:#x} onwards"
                ),
            });
        }
        handle.seek(SeekFrom::Start(FID_TIME_RANGE_OFFSET))?;
        let start = handle.read_f32::<BigEndian>().map_err(|e| {
            AgilentDecodeError::from_read_error(e, FID_TIME_RANGE_OFFSET, "reading the start time")
        })?;
        let end = handle.read_f32::<BigEndian>().map_err(|e| {
            AgilentDecodeError::from_read_error(
                e,
                FID_TIME_RANGE_OFFSET + 4,
                "reading the end time",
            )
        })?;
        let start_time = ticks_to_minutes_f32(start);
        let end_time = ticks_to_minutes_f32(end);
        debug!("FID acquisition runs from {start_time} to {end_time} minutes");
        Ok(Self {
            handle,
            start_time,
            end_time,
            length,
        })
    }

    /// The declared (start, end) of the acquisition, in minutes
    pub fn time_range(&self) -> (f64, f64) {
        (self.start_time, self.end_time)
    }

    /// The number of complete signal values in the file
    pub fn len(&self) -> usize {
        ((self.length - FID_SIGNAL_OFFSET) as usize) / SIGNAL_VALUE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_trace(&mut self) -> Result<FidTrace, AgilentDecodeError> {
        let span = (self.length - FID_SIGNAL_OFFSET) as usize;
        if span % SIGNAL_VALUE_SIZE != 0 {
            let count = span / SIGNAL_VALUE_SIZE;
            return Err(AgilentDecodeError::CorruptScanRecord {
                scan: count,
                offset: FID_SIGNAL_OFFSET + (count * SIGNAL_VALUE_SIZE) as u64,
                reason: format!(
                    "{} trailing bytes do not form a whole signal value",
                    span % SIGNAL_VALUE_SIZE
                ),
            });
        }
        self.handle.seek(SeekFrom::Start(FID_SIGNAL_OFFSET))?;
        let mut buffer = vec![0u8; span];
        self.handle.read_exact(&mut buffer).map_err(|e| {
            AgilentDecodeError::from_read_error(e, FID_SIGNAL_OFFSET, "reading the FID signal")
        })?;
        let mut values = vec![0.0f64; span / SIGNAL_VALUE_SIZE];
        LittleEndian::read_f64_into(&buffer, &mut values);

        let signal: Trace = linspace(self.start_time, self.end_time, values.len())
            .zip(values)
            .collect();
        Ok(FidTrace {
            start_time: self.start_time,
            end_time: self.end_time,
            signal,
        })
    }

    pub fn into_inner(self) -> R {
        self.handle.into_inner()
    }
}

impl FidReaderType<fs::File> {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, AgilentDecodeError> {
        let handle = fs::File::open(path.as_ref())?;
        Self::new(handle)
    }
}

/// Decode a `FID1A.ch` stream into a detector trace
pub fn decode_fid<R: Read + Seek>(stream: R) -> Result<FidTrace, AgilentDecodeError> {
    FidReaderType::new(stream)?.read_trace()
}
