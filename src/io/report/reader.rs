use std::{fs, io, path::Path, sync::LazyLock};

use indexmap::IndexMap;
use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use super::rows::{ReportRow, ReportRows, RowCells};
use super::schema::{SchemaRegistry, TableKind};

/// The first cell of a row that opens a table
pub const HEADER_SENTINEL: &str = "Header=";

static BODY_ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+=").unwrap());

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Table opened on line {line} has an unknown set of columns: {columns:?}")]
    UnknownTableSchema { line: u64, columns: Vec<String> },
    #[error("Invalid value {text:?} in column {column:?} on line {line}")]
    InvalidValue {
        line: u64,
        column: String,
        text: String,
    },
    #[error("Row on line {line} has {found} cells, its table has {expected} columns")]
    MissingColumns {
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("Row on line {line} has no column {column:?}")]
    UnknownColumn { line: u64, column: String },
    #[error("Failed to tokenize the report: {0}")]
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

impl From<ReportError> for io::Error {
    fn from(value: ReportError) -> Self {
        match value {
            ReportError::IOError(e) => e,
            _ => Self::new(io::ErrorKind::InvalidData, value),
        }
    }
}

/// Whether a tokenized row opens a table
pub fn is_header_row<S: AsRef<str>>(tokens: &[S]) -> bool {
    tokens
        .first()
        .is_some_and(|t| t.as_ref() == HEADER_SENTINEL)
}

/// Whether a tokenized row is a table body row, labeled `<n>=`
pub fn is_body_row<S: AsRef<str>>(tokens: &[S]) -> bool {
    tokens
        .first()
        .is_some_and(|t| BODY_ROW.is_match(t.as_ref()))
}

/// A named, typed table read from a report
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportTable {
    pub kind: TableKind,
    /// The column names of the first block of this kind
    pub columns: Vec<String>,
    pub rows: ReportRows,
    /// How many `Header=` blocks contributed rows
    pub blocks: usize,
}

impl ReportTable {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows as the typed row `T`, or `None` if this table holds another kind
    pub fn rows_as<T: ReportRow>(&self) -> Option<&[T]> {
        T::rows_of(&self.rows)
    }
}

/// Everything read from one report: its tables in order of first appearance and
/// the lines that were not part of any table
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportTables {
    pub meta: Vec<Vec<String>>,
    tables: IndexMap<TableKind, ReportTable>,
}

impl ReportTables {
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn get(&self, kind: TableKind) -> Option<&ReportTable> {
        self.tables.get(&kind)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ReportTable> {
        self.get(TableKind::from_name(name)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReportTable> {
        self.tables.values()
    }

    /// The rows of type `T`, empty if the report held no such table
    pub fn rows<T: ReportRow>(&self) -> &[T] {
        self.get(T::KIND)
            .and_then(|t| t.rows_as::<T>())
            .unwrap_or_default()
    }

    fn insert(&mut self, table: ReportTable) {
        match self.tables.get_mut(&table.kind) {
            Some(existing) => {
                warn!(
                    "Found another {} table, appending its {} rows",
                    table.kind,
                    table.len()
                );
                existing.blocks += table.blocks;
                let appended = existing.rows.extend(table.rows);
                debug_assert!(appended, "{} table holds rows of another kind", table.kind);
            }
            None => {
                self.tables.insert(table.kind, table);
            }
        }
    }
}

/// The two states of the table boundary scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportParserState {
    /// Looking for the next `Header=` row
    Seek,
    /// Consuming body rows of an open table
    Collect,
}

#[derive(Debug)]
struct OpenTable {
    line: u64,
    block: usize,
    header: Vec<String>,
    body: Vec<(u64, Vec<String>)>,
}

/// Splits a stream of tokenized rows into tables and meta lines
#[derive(Debug)]
pub struct ReportParser<'a> {
    registry: &'a SchemaRegistry,
    state: ReportParserState,
    open: Option<OpenTable>,
    blocks_seen: usize,
    tables: ReportTables,
}

impl<'a> ReportParser<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            state: ReportParserState::Seek,
            open: None,
            blocks_seen: 0,
            tables: ReportTables::default(),
        }
    }

    pub fn state(&self) -> ReportParserState {
        self.state
    }

    /// Feed one tokenized row read from `line`
    pub fn handle_row(&mut self, line: u64, tokens: Vec<String>) -> Result<(), ReportError> {
        match self.state {
            ReportParserState::Seek => {
                if is_header_row(&tokens) {
                    let mut header = tokens;
                    while header.last().is_some_and(|h| h.is_empty()) {
                        header.pop();
                    }
                    self.open = Some(OpenTable {
                        line,
                        block: self.blocks_seen,
                        header,
                        body: Vec::new(),
                    });
                    self.blocks_seen += 1;
                    self.state = ReportParserState::Collect;
                } else {
                    self.tables.meta.push(tokens);
                }
            }
            ReportParserState::Collect => {
                if is_body_row(&tokens) {
                    if let Some(open) = self.open.as_mut() {
                        open.body.push((line, tokens));
                    }
                } else {
                    self.close_table()?;
                    return self.handle_row(line, tokens);
                }
            }
        }
        Ok(())
    }

    fn close_table(&mut self) -> Result<(), ReportError> {
        self.state = ReportParserState::Seek;
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        let kind = self.registry.classify(&open.header).ok_or_else(|| {
            ReportError::UnknownTableSchema {
                line: open.line,
                columns: open.header.clone(),
            }
        })?;
        let mut rows = ReportRows::empty(kind);
        for (line, cells) in open.body.iter() {
            let cells = RowCells::new(&open.header, cells, *line, open.block)?;
            rows.push_cells(&cells)?;
        }
        debug!(
            "Closed {kind} table from line {} with {} rows",
            open.line,
            rows.len()
        );
        self.tables.insert(ReportTable {
            kind,
            columns: open.header,
            rows,
            blocks: 1,
        });
        Ok(())
    }

    /// Close any open table and return what was read
    pub fn finish(mut self) -> Result<ReportTables, ReportError> {
        self.close_table()?;
        Ok(self.tables)
    }
}

/// Parse a ChemStation `RESULTS.CSV` stream into its tables.
///
/// Each line is split as CSV, with surrounding whitespace trimmed from every
/// cell. Lines without any content are skipped.
pub fn parse_report<R: io::Read>(
    stream: R,
    registry: &SchemaRegistry,
) -> Result<ReportTables, ReportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(stream);
    let mut parser = ReportParser::new(registry);
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let tokens: Vec<String> = record
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        if tokens.iter().all(|t| t.is_empty()) {
            continue;
        }
        parser.handle_row(line, tokens)?;
    }
    parser.finish()
}

/// Open and parse a report file
pub fn parse_report_path<P: AsRef<Path>>(
    path: P,
    registry: &SchemaRegistry,
) -> Result<ReportTables, ReportError> {
    let handle = fs::File::open(path.as_ref())?;
    parse_report(io::BufReader::new(handle), registry)
}
