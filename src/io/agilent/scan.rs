use std::io::{prelude::*, SeekFrom};

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};

use super::header::{ticks_to_minutes, AgilentDecodeError};

/// Bytes after the length field that are not part of the ion list
const RECORD_OVERHEAD: i64 = 26;
/// Where the first (mass, intensity) pair sits within a record body, past
/// the time field and a 12 byte gap
const ION_LIST_START: usize = 16;
/// The length field, the time field and the tail-aligned total intensity
const MIN_RECORD_SPAN: u64 = 10;

/// The number of fixed-point steps per dalton in a mass channel id
pub const MASS_CHANNEL_SCALE: f64 = 20.0;

const MANTISSA_MASK: u16 = 0x3FFF;
const EXPONENT_SHIFT: u16 = 14;

/// Decode a packed 16-bit intensity. The low 14 bits are a mantissa and the
/// high 2 bits a base-8 exponent.
#[inline]
pub fn decode_intensity(raw: u16) -> f64 {
    let mantissa = (raw & MANTISSA_MASK) as f64;
    let exponent = (raw >> EXPONENT_SHIFT) as i32;
    mantissa * 8f64.powi(exponent)
}

/// Convert a raw mass channel id to daltons
#[inline]
pub fn channel_mass(raw: u16) -> f64 {
    raw as f64 / MASS_CHANNEL_SCALE
}

/// A single (mass channel, intensity) measurement within a [`Scan`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IonPeak {
    /// The raw fixed-point channel id, see [`channel_mass`]
    pub channel: u16,
    pub intensity: f64,
}

impl IonPeak {
    pub fn from_raw(channel: u16, intensity: u16) -> Self {
        Self {
            channel,
            intensity: decode_intensity(intensity),
        }
    }

    pub fn mass(&self) -> f64 {
        channel_mass(self.channel)
    }
}

/// One instrument sample
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scan {
    pub index: usize,
    /// Retention time in minutes
    pub time: f64,
    pub total_intensity: f64,
    pub ions: Vec<IonPeak>,
}

/// The location of one scan record and the location of its successor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRecordHeader {
    pub index: usize,
    /// Offset of the record's length field
    pub offset: u64,
    /// Offset of the next record's length field
    pub next_offset: u64,
}

impl ScanRecordHeader {
    /// Read the length field of the record starting at `offset`. The stream
    /// must already be positioned there.
    pub fn read_from<R: Read>(
        handle: &mut R,
        index: usize,
        offset: u64,
    ) -> Result<Self, AgilentDecodeError> {
        let length = handle.read_u16::<BigEndian>().map_err(|e| {
            AgilentDecodeError::from_read_error(
                e,
                offset,
                format!("reading the length of scan {index}"),
            )
        })?;
        let next_offset = offset + 2 * length as u64;
        if next_offset < offset + MIN_RECORD_SPAN {
            return Err(AgilentDecodeError::CorruptScanRecord {
                scan: index,
                offset,
                reason: format!(
                    "record length of {} bytes cannot hold a time and total intensity",
                    2 * length as u64
                ),
            });
        }
        Ok(Self {
            index,
            offset,
            next_offset,
        })
    }

    /// The offset just past the length field
    #[inline]
    pub fn body_offset(&self) -> u64 {
        self.offset + 2
    }

    /// The number of bytes following the length field
    #[inline]
    pub fn body_len(&self) -> usize {
        (self.next_offset - self.body_offset()) as usize
    }

    /// The number of (mass, intensity) pairs this record holds
    pub fn point_count(&self) -> Result<usize, AgilentDecodeError> {
        let span = self.body_len() as i64 - RECORD_OVERHEAD;
        if span < 0 || span % 4 != 0 {
            return Err(AgilentDecodeError::CorruptScanRecord {
                scan: self.index,
                offset: self.offset,
                reason: format!("record implies a point count of {span}/4"),
            });
        }
        Ok((span / 4) as usize)
    }

    /// Read the rest of the record into `buffer` in one go, leaving the stream
    /// at the next record
    pub fn read_body<'a, R: Read>(
        &self,
        handle: &mut R,
        buffer: &'a mut Vec<u8>,
    ) -> Result<ScanRecord<'a>, AgilentDecodeError> {
        buffer.resize(self.body_len(), 0);
        handle.read_exact(buffer).map_err(|e| {
            AgilentDecodeError::from_read_error(
                e,
                self.body_offset(),
                format!("reading the {} byte body of scan {}", self.body_len(), self.index),
            )
        })?;
        Ok(ScanRecord {
            header: *self,
            body: buffer,
        })
    }
}

/// A scan record whose body has been read into memory
#[derive(Debug, Clone, Copy)]
pub struct ScanRecord<'a> {
    pub header: ScanRecordHeader,
    body: &'a [u8],
}

impl ScanRecord<'_> {
    /// The retention time, in minutes
    pub fn time(&self) -> f64 {
        ticks_to_minutes(BigEndian::read_u32(&self.body[..4]))
    }

    /// The tail-aligned total intensity
    pub fn total_intensity(&self) -> f64 {
        BigEndian::read_u32(&self.body[self.body.len() - 4..]) as f64
    }

    /// Collect the raw (mass channel, packed intensity) pairs into `buffer`
    pub fn raw_ions(&self, buffer: &mut Vec<(u16, u16)>) -> Result<(), AgilentDecodeError> {
        buffer.clear();
        let count = self.header.point_count()?;
        let block = self
            .body
            .get(ION_LIST_START..ION_LIST_START + 4 * count)
            .ok_or_else(|| AgilentDecodeError::CorruptScanRecord {
                scan: self.header.index,
                offset: self.header.offset,
                reason: format!("ion list of {count} points overruns the record"),
            })?;
        buffer.extend(
            block
                .chunks_exact(4)
                .map(|pair| (BigEndian::read_u16(&pair[..2]), BigEndian::read_u16(&pair[2..]))),
        );
        Ok(())
    }

    pub fn to_scan(&self) -> Result<Scan, AgilentDecodeError> {
        let mut raw = Vec::new();
        self.raw_ions(&mut raw)?;
        Ok(Scan {
            index: self.header.index,
            time: self.time(),
            total_intensity: self.total_intensity(),
            ions: raw
                .into_iter()
                .map(|(channel, intensity)| IonPeak::from_raw(channel, intensity))
                .collect(),
        })
    }
}

/// Walks the chain of scan records, each one locating its successor. The
/// first record is sought out, after which each record's body must be read or
/// skipped before asking for the next one.
#[derive(Debug)]
pub(crate) struct ScanRecordWalker {
    next_offset: u64,
    next_index: usize,
    scan_count: usize,
}

impl ScanRecordWalker {
    pub fn new(data_start: u64, scan_count: usize) -> Self {
        Self {
            next_offset: data_start,
            next_index: 0,
            scan_count,
        }
    }

    fn read_next<R: Read + Seek>(
        &mut self,
        handle: &mut R,
    ) -> Result<ScanRecordHeader, AgilentDecodeError> {
        if self.next_index == 0 {
            handle.seek(SeekFrom::Start(self.next_offset))?;
        }
        ScanRecordHeader::read_from(handle, self.next_index, self.next_offset)
    }

    pub fn next_record<R: Read + Seek>(
        &mut self,
        handle: &mut R,
    ) -> Option<Result<ScanRecordHeader, AgilentDecodeError>> {
        if self.next_index >= self.scan_count {
            return None;
        }
        let result = self.read_next(handle);
        match &result {
            Ok(header) => {
                self.next_offset = header.next_offset;
                self.next_index += 1;
            }
            Err(_) => {
                self.next_index = self.scan_count;
            }
        }
        Some(result)
    }
}

/// Keeps track of the last retention time seen so that a decode pass can
/// reject files whose scans are not in increasing time order
#[derive(Debug, Default)]
pub(crate) struct TimeOrderGuard {
    last: Option<f64>,
}

impl TimeOrderGuard {
    pub fn check(
        &mut self,
        header: &ScanRecordHeader,
        time: f64,
    ) -> Result<(), AgilentDecodeError> {
        if let Some(last) = self.last {
            if time.partial_cmp(&last) != Some(std::cmp::Ordering::Greater) {
                return Err(AgilentDecodeError::CorruptScanRecord {
                    scan: header.index,
                    offset: header.offset,
                    reason: format!("retention time {time} does not follow {last}"),
                });
            }
        }
        self.last = Some(time);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_decode_intensity() {
        assert_eq!(decode_intensity(0), 0.0);
        assert_eq!(decode_intensity(100), 100.0);
        assert_eq!(decode_intensity(0x3FFF), 16383.0);
        // exponent 1
        assert_eq!(decode_intensity(0x4000 | 5), 40.0);
        // exponent 3
        assert_eq!(decode_intensity(0xC000 | 2), 1024.0);
    }

    #[test]
    fn test_channel_mass() {
        assert_eq!(channel_mass(1000), 50.0);
        assert_eq!(channel_mass(1), 0.05);
    }

    #[test]
    fn test_point_count() {
        let header = ScanRecordHeader {
            index: 0,
            offset: 100,
            next_offset: 100 + 28 + 4 * 3,
        };
        assert_eq!(header.point_count().unwrap(), 3);

        let header = ScanRecordHeader {
            index: 0,
            offset: 100,
            next_offset: 100 + 28 + 2,
        };
        assert!(matches!(
            header.point_count(),
            Err(AgilentDecodeError::CorruptScanRecord { .. })
        ));

        let header = ScanRecordHeader {
            index: 0,
            offset: 100,
            next_offset: 100 + 12,
        };
        assert!(matches!(
            header.point_count(),
            Err(AgilentDecodeError::CorruptScanRecord { .. })
        ));
    }

    #[test]
    fn test_record_body_in_one_read() -> Result<(), AgilentDecodeError> {
        let mut bytes = 16u16.to_be_bytes().to_vec();
        bytes.extend(90000u32.to_be_bytes());
        bytes.extend([0u8; 12]);
        bytes.extend(1000u16.to_be_bytes());
        bytes.extend((0x4000u16 | 5).to_be_bytes());
        bytes.extend([0u8; 6]);
        bytes.extend(77u32.to_be_bytes());

        let mut cursor = std::io::Cursor::new(bytes);
        let header = ScanRecordHeader::read_from(&mut cursor, 0, 0)?;
        assert_eq!(header.body_len(), 30);
        let mut body = Vec::new();
        let record = header.read_body(&mut cursor, &mut body)?;
        assert_eq!(cursor.position(), header.next_offset);
        let scan = record.to_scan()?;
        assert_eq!(scan.time, 1.5);
        assert_eq!(scan.total_intensity, 77.0);
        assert_eq!(
            scan.ions,
            vec![IonPeak {
                channel: 1000,
                intensity: 40.0
            }]
        );
        Ok(())
    }

    #[test]
    fn test_time_order_guard() {
        let header = ScanRecordHeader {
            index: 1,
            offset: 0,
            next_offset: 30,
        };
        let mut guard = TimeOrderGuard::default();
        guard.check(&header, 1.0).unwrap();
        guard.check(&header, 2.0).unwrap();
        assert!(guard.check(&header, 2.0).is_err());
    }
}
