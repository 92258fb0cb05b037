use std::str::FromStr;

use super::reader::ReportError;
use super::schema::TableKind;

/// The cells of one table body row, addressed by column name
#[derive(Debug, Clone, Copy)]
pub struct RowCells<'a> {
    header: &'a [String],
    cells: &'a [String],
    /// The 1-based line the row was read from
    pub line: u64,
    /// The ordinal of the `Header=` row that opened the table
    pub block: usize,
}

impl<'a> RowCells<'a> {
    pub(crate) fn new(
        header: &'a [String],
        cells: &'a [String],
        line: u64,
        block: usize,
    ) -> Result<Self, ReportError> {
        if cells.len() < header.len() {
            return Err(ReportError::MissingColumns {
                line,
                expected: header.len(),
                found: cells.len(),
            });
        }
        Ok(Self {
            header,
            cells,
            line,
            block,
        })
    }

    /// The raw text of the cell under `column`
    pub fn text(&self, column: &str) -> Result<&'a str, ReportError> {
        let index = self
            .header
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| ReportError::UnknownColumn {
                line: self.line,
                column: column.to_string(),
            })?;
        Ok(self.cells[index].as_str())
    }

    /// Parse the cell under `column` as a number
    pub fn parse<T: FromStr>(&self, column: &str) -> Result<T, ReportError> {
        let text = self.text(column)?;
        text.parse().map_err(|_| ReportError::InvalidValue {
            line: self.line,
            column: column.to_string(),
            text: text.to_string(),
        })
    }

    /// Parse the numeric label of the row, `7=` → 7
    pub fn entry(&self) -> Result<u32, ReportError> {
        let text = self.text("Header=")?;
        text.trim_end_matches('=')
            .parse()
            .map_err(|_| ReportError::InvalidValue {
                line: self.line,
                column: "Header=".to_string(),
                text: text.to_string(),
            })
    }
}

/// A typed row of one of the known report tables
pub trait ReportRow: Sized {
    const KIND: TableKind;

    fn from_cells(cells: &RowCells<'_>) -> Result<Self, ReportError>;

    /// Borrow the rows of this type out of a table body
    fn rows_of(rows: &ReportRows) -> Option<&[Self]>;
}

/// A row of the total ion chromatogram peak integration table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakRow {
    pub block: usize,
    pub entry: u32,
    pub peak: i64,
    /// Retention time in minutes
    pub rt: f64,
    /// First, apex and last scan of the peak
    pub first: i64,
    pub max: i64,
    pub last: i64,
    pub peak_type: String,
    pub height: f64,
    pub area: f64,
    pub pct_max: f64,
    pub pct_total: f64,
}

impl ReportRow for PeakRow {
    const KIND: TableKind = TableKind::PeakIntegration;

    fn rows_of(rows: &ReportRows) -> Option<&[Self]> {
        match rows {
            ReportRows::PeakIntegration(rows) => Some(rows),
            _ => None,
        }
    }

    fn from_cells(cells: &RowCells<'_>) -> Result<Self, ReportError> {
        Ok(Self {
            block: cells.block,
            entry: cells.entry()?,
            peak: cells.parse("Peak")?,
            rt: cells.parse("R.T.")?,
            first: cells.parse("First")?,
            max: cells.parse("Max")?,
            last: cells.parse("Last")?,
            peak_type: cells.text("PK  TY")?.to_string(),
            height: cells.parse("Height")?,
            area: cells.parse("Area")?,
            pct_max: cells.parse("Pct Max")?,
            pct_total: cells.parse("Pct Total")?,
        })
    }
}

/// A row of the library search table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LibraryRow {
    pub block: usize,
    pub entry: u32,
    pub peak: i64,
    /// Retention time in minutes
    pub rt: f64,
    pub area_pct: f64,
    pub library_id: String,
    pub reference: i64,
    pub cas: String,
    pub quality: i64,
}

impl LibraryRow {
    /// A bare library hit, for building tables by hand
    pub fn new(peak: i64, rt: f64, library_id: impl Into<String>) -> Self {
        Self {
            block: 0,
            entry: u32::try_from(peak).unwrap_or_default(),
            peak,
            rt,
            area_pct: 0.0,
            library_id: library_id.into(),
            reference: 0,
            cas: String::new(),
            quality: 0,
        }
    }
}

impl ReportRow for LibraryRow {
    const KIND: TableKind = TableKind::LibraryMatch;

    fn rows_of(rows: &ReportRows) -> Option<&[Self]> {
        match rows {
            ReportRows::LibraryMatch(rows) => Some(rows),
            _ => None,
        }
    }

    fn from_cells(cells: &RowCells<'_>) -> Result<Self, ReportError> {
        Ok(Self {
            block: cells.block,
            entry: cells.entry()?,
            peak: cells.parse("PK")?,
            rt: cells.parse("RT")?,
            area_pct: cells.parse("Area Pct")?,
            library_id: cells.text("Library/ID")?.to_string(),
            reference: cells.parse("Ref")?,
            cas: cells.text("CAS")?.to_string(),
            quality: cells.parse("Qual")?,
        })
    }
}

/// A row of the flame ionization detector integration table
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FidRow {
    pub block: usize,
    pub entry: u32,
    pub peak: i64,
    pub rt: f64,
    pub start: f64,
    pub end: f64,
    pub peak_type: String,
    pub height: f64,
    pub area: f64,
    pub pct_max: f64,
    pub pct_total: f64,
}

impl ReportRow for FidRow {
    const KIND: TableKind = TableKind::FidIntegration;

    fn rows_of(rows: &ReportRows) -> Option<&[Self]> {
        match rows {
            ReportRows::FidIntegration(rows) => Some(rows),
            _ => None,
        }
    }

    fn from_cells(cells: &RowCells<'_>) -> Result<Self, ReportError> {
        Ok(Self {
            block: cells.block,
            entry: cells.entry()?,
            peak: cells.parse("Peak")?,
            rt: cells.parse("R.T.")?,
            start: cells.parse("Start")?,
            end: cells.parse("End")?,
            peak_type: cells.text("PK TY")?.to_string(),
            height: cells.parse("Height")?,
            area: cells.parse("Area")?,
            pct_max: cells.parse("Pct Max")?,
            pct_total: cells.parse("Pct Total")?,
        })
    }
}

/// The typed body of a [`ReportTable`](super::ReportTable)
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReportRows {
    PeakIntegration(Vec<PeakRow>),
    LibraryMatch(Vec<LibraryRow>),
    FidIntegration(Vec<FidRow>),
}

impl ReportRows {
    pub fn empty(kind: TableKind) -> Self {
        match kind {
            TableKind::PeakIntegration => Self::PeakIntegration(Vec::new()),
            TableKind::LibraryMatch => Self::LibraryMatch(Vec::new()),
            TableKind::FidIntegration => Self::FidIntegration(Vec::new()),
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Self::PeakIntegration(_) => TableKind::PeakIntegration,
            Self::LibraryMatch(_) => TableKind::LibraryMatch,
            Self::FidIntegration(_) => TableKind::FidIntegration,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::PeakIntegration(rows) => rows.len(),
            Self::LibraryMatch(rows) => rows.len(),
            Self::FidIntegration(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push_cells(&mut self, cells: &RowCells<'_>) -> Result<(), ReportError> {
        match self {
            Self::PeakIntegration(rows) => rows.push(PeakRow::from_cells(cells)?),
            Self::LibraryMatch(rows) => rows.push(LibraryRow::from_cells(cells)?),
            Self::FidIntegration(rows) => rows.push(FidRow::from_cells(cells)?),
        }
        Ok(())
    }

    /// Append the rows of another table of the same kind. Returns `false` and
    /// leaves `self` untouched if the kinds differ.
    pub(crate) fn extend(&mut self, other: ReportRows) -> bool {
        match (self, other) {
            (Self::PeakIntegration(a), Self::PeakIntegration(b)) => a.extend(b),
            (Self::LibraryMatch(a), Self::LibraryMatch(b)) => a.extend(b),
            (Self::FidIntegration(a), Self::FidIntegration(b)) => a.extend(b),
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_library_row_by_name() -> Result<(), ReportError> {
        let header = strings(&[
            "Header=", "RT", "PK", "Area Pct", "Library/ID", "Ref", "CAS", "Qual",
        ]);
        let body = strings(&[
            "3=", "4.512", "3", "12.5", "Toluene", "1021", "000108-88-3", "94",
        ]);
        let cells = RowCells::new(&header, &body, 12, 1)?;
        let row = LibraryRow::from_cells(&cells)?;
        assert_eq!(row.entry, 3);
        assert_eq!(row.peak, 3);
        assert_eq!(row.rt, 4.512);
        assert_eq!(row.library_id, "Toluene");
        assert_eq!(row.cas, "000108-88-3");
        assert_eq!(row.quality, 94);
        assert_eq!(row.block, 1);
        Ok(())
    }

    #[test]
    fn test_row_errors() {
        let header = strings(&["Header=", "Peak", "R.T."]);
        let short = strings(&["1=", "1"]);
        assert!(matches!(
            RowCells::new(&header, &short, 4, 0),
            Err(ReportError::MissingColumns {
                line: 4,
                expected: 3,
                found: 2
            })
        ));

        let body = strings(&["1=", "1", "abc"]);
        let cells = RowCells::new(&header, &body, 5, 0).unwrap();
        match cells.parse::<f64>("R.T.") {
            Err(ReportError::InvalidValue { line, column, text }) => {
                assert_eq!(line, 5);
                assert_eq!(column, "R.T.");
                assert_eq!(text, "abc");
            }
            other => panic!("Expected an invalid value, got {other:?}"),
        }
    }

    #[test]
    fn test_library_row_entry_from_peak() {
        assert_eq!(LibraryRow::new(7, 1.0, "X").entry, 7);
        assert_eq!(LibraryRow::new(-1, 1.0, "X").entry, 0);
        assert_eq!(LibraryRow::new(i64::from(u32::MAX) + 1, 1.0, "X").entry, 0);
    }

    #[test]
    fn test_extend_requires_same_kind() {
        let mut rows = ReportRows::LibraryMatch(vec![LibraryRow::new(1, 1.0, "A")]);
        assert!(rows.extend(ReportRows::LibraryMatch(vec![LibraryRow::new(2, 2.0, "B")])));
        assert!(!rows.extend(ReportRows::PeakIntegration(Vec::new())));
        match rows {
            ReportRows::LibraryMatch(hits) => {
                let ids: Vec<&str> = hits.iter().map(|r| r.library_id.as_str()).collect();
                assert_eq!(ids, ["A", "B"]);
            }
            other => panic!("Expected library rows, got {other:?}"),
        }
    }
}
