use std::{
    fs,
    io::{self, prelude::*, SeekFrom},
    path::Path,
};

use log::{debug, warn};

use super::header::{AgilentDecodeError, DataMsHeader};
use super::scan::{decode_intensity, Scan, ScanRecordHeader, ScanRecordWalker, TimeOrderGuard};
use super::spectra::{ChannelIndexBuilder, SpectralMatrix};
use super::trace::Trace;

/**
A reader for Agilent ChemStation `DATA.MS` files.

The header is parsed when the reader is constructed. Every read method walks the
scan record chain from the start of the data region, so a reader may be used
to produce a [`Trace`] and then a [`SpectralMatrix`] from the same file. Each
record is pulled from the stream with a single read of its body.
*/
pub struct DataMsReaderType<R: Read + Seek> {
    handle: io::BufReader<R>,
    header: DataMsHeader,
}

/// A [`DataMsReaderType`] over a file on disk
pub type DataMsReader = DataMsReaderType<fs::File>;

impl<R: Read + Seek> DataMsReaderType<R> {
    /// Wrap `stream` and read its header
    pub fn new(stream: R) -> Result<Self, AgilentDecodeError> {
        let mut handle = io::BufReader::new(stream);
        let header = DataMsHeader::read_from(&mut handle)?;
        handle.seek(SeekFrom::Start(header.data_start))?;
        Ok(Self { handle, header })
    }

    pub fn header(&self) -> &DataMsHeader {
        &self.header
    }

    /// The number of scans the header declares
    pub fn len(&self) -> usize {
        self.header.scan_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.scan_count == 0
    }

    /// Move the stream back to the first scan record
    pub fn reset(&mut self) -> Result<(), AgilentDecodeError> {
        self.handle.seek(SeekFrom::Start(self.header.data_start))?;
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.handle.into_inner()
    }

    fn walker(&self) -> ScanRecordWalker {
        ScanRecordWalker::new(self.header.data_start, self.header.scan_count)
    }

    /// Iterate over fully decoded scans. Iteration stops after the first error.
    pub fn iter_scans(&mut self) -> ScanIter<'_, R> {
        let walker = self.walker();
        ScanIter {
            reader: self,
            walker,
            guard: TimeOrderGuard::default(),
            body: Vec::new(),
            failed: false,
        }
    }

    /// Read the total ion chromatogram, one point per scan
    pub fn read_trace(&mut self) -> Result<Trace, AgilentDecodeError> {
        let mut walker = self.walker();
        let mut guard = TimeOrderGuard::default();
        let mut trace = Trace::with_capacity(self.header.scan_count);
        let mut body = Vec::new();
        while let Some(header) = walker.next_record(&mut self.handle) {
            let record = header?.read_body(&mut self.handle, &mut body)?;
            let time = record.time();
            guard.check(&record.header, time)?;
            trace.push(time, record.total_intensity());
        }
        debug!("Decoded a trace of {} points", trace.len());
        Ok(trace)
    }

    /// Read every scan's ion list into a sparse scan × mass channel matrix.
    ///
    /// The first pass sizes the rows from each record's point count, skipping
    /// over the record bodies, the second reads the ions and assigns mass
    /// channels to columns.
    pub fn read_spectra(&mut self) -> Result<SpectralMatrix, AgilentDecodeError> {
        let mut walker = self.walker();
        let mut row_pointers = Vec::with_capacity(self.header.scan_count + 1);
        row_pointers.push(0usize);
        let mut total_points = 0usize;
        while let Some(header) = walker.next_record(&mut self.handle) {
            let header = header?;
            total_points += header.point_count()?;
            row_pointers.push(total_points);
            self.handle.seek_relative(header.body_len() as i64)?;
        }
        let n_rows = row_pointers.len() - 1;
        debug!("Sized {n_rows} scan rows holding {total_points} points");

        let mut walker = self.walker();
        let mut guard = TimeOrderGuard::default();
        let mut builder = ChannelIndexBuilder::default();
        let mut times = Vec::with_capacity(n_rows);
        let mut column_indices = Vec::with_capacity(total_points);
        let mut values = Vec::with_capacity(total_points);
        let mut body = Vec::new();
        let mut raw = Vec::new();
        while let Some(header) = walker.next_record(&mut self.handle) {
            let record = header?.read_body(&mut self.handle, &mut body)?;
            let time = record.time();
            guard.check(&record.header, time)?;
            record.raw_ions(&mut raw)?;
            for (channel, intensity) in raw.iter().copied() {
                column_indices.push(builder.column_of(channel));
                values.push(decode_intensity(intensity));
            }
            times.push(time);
        }

        let channels = builder.freeze();
        if channels.is_empty() && !times.is_empty() {
            warn!("No ions were recorded in {} scans", times.len());
        }
        Ok(SpectralMatrix::from_parts(
            times,
            row_pointers,
            column_indices,
            values,
            channels,
        ))
    }
}

impl DataMsReaderType<fs::File> {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, AgilentDecodeError> {
        let handle = fs::File::open(path.as_ref())?;
        Self::new(handle)
    }
}

/// Iterator over the decoded [`Scan`]s of a [`DataMsReaderType`]
pub struct ScanIter<'a, R: Read + Seek> {
    reader: &'a mut DataMsReaderType<R>,
    walker: ScanRecordWalker,
    guard: TimeOrderGuard,
    body: Vec<u8>,
    failed: bool,
}

impl<R: Read + Seek> ScanIter<'_, R> {
    fn read_one(&mut self, header: ScanRecordHeader) -> Result<Scan, AgilentDecodeError> {
        let scan = header
            .read_body(&mut self.reader.handle, &mut self.body)?
            .to_scan()?;
        self.guard.check(&header, scan.time)?;
        Ok(scan)
    }
}

impl<R: Read + Seek> Iterator for ScanIter<'_, R> {
    type Item = Result<Scan, AgilentDecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.walker.next_record(&mut self.reader.handle)? {
            Ok(record) => self.read_one(record),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

/// Decode the total ion chromatogram of a `DATA.MS` stream
pub fn decode_trace<R: Read + Seek>(stream: R) -> Result<Trace, AgilentDecodeError> {
    DataMsReaderType::new(stream)?.read_trace()
}

/// Decode the full scan × mass channel matrix of a `DATA.MS` stream
pub fn decode_spectra<R: Read + Seek>(stream: R) -> Result<SpectralMatrix, AgilentDecodeError> {
    DataMsReaderType::new(stream)?.read_spectra()
}
