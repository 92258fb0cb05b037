use std::collections::HashSet;
use std::fmt::Display;

/// The kinds of table a ChemStation report holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TableKind {
    /// Total ion chromatogram peak integration
    PeakIntegration,
    /// Library search hits
    LibraryMatch,
    /// Flame ionization detector peak integration
    FidIntegration,
}

pub const PEAK_INTEGRATION_COLUMNS: &[&str] = &[
    "Header=",
    "Peak",
    "R.T.",
    "First",
    "Max",
    "Last",
    "PK  TY",
    "Height",
    "Area",
    "Pct Max",
    "Pct Total",
];

pub const LIBRARY_MATCH_COLUMNS: &[&str] = &[
    "Header=",
    "PK",
    "RT",
    "Area Pct",
    "Library/ID",
    "Ref",
    "CAS",
    "Qual",
];

pub const FID_INTEGRATION_COLUMNS: &[&str] = &[
    "Header=",
    "Peak",
    "R.T.",
    "Start",
    "End",
    "PK TY",
    "Height",
    "Area",
    "Pct Max",
    "Pct Total",
];

impl TableKind {
    /// The short name the table is known by
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PeakIntegration => "tic",
            Self::LibraryMatch => "lib",
            Self::FidIntegration => "fid",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tic" => Some(Self::PeakIntegration),
            "lib" => Some(Self::LibraryMatch),
            "fid" => Some(Self::FidIntegration),
            _ => None,
        }
    }

    /// The column names this kind of table is written with
    pub const fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::PeakIntegration => PEAK_INTEGRATION_COLUMNS,
            Self::LibraryMatch => LIBRARY_MATCH_COLUMNS,
            Self::FidIntegration => FID_INTEGRATION_COLUMNS,
        }
    }
}

impl Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of column names that identifies a [`TableKind`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub kind: TableKind,
    columns: HashSet<String>,
}

impl TableSchema {
    pub fn new<I, S>(kind: TableKind, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `columns` is exactly this schema's column set, in any order
    pub fn matches(&self, columns: &HashSet<&str>) -> bool {
        self.columns.len() == columns.len()
            && columns.iter().all(|c| self.columns.contains(*c))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|s| s.as_str())
    }
}

impl From<TableKind> for TableSchema {
    fn from(kind: TableKind) -> Self {
        Self::new(kind, kind.columns().iter().copied())
    }
}

/**
The table layouts a report parser recognizes. The default registry knows the
peak integration, library match and FID integration tables. Callers may add
further column sets for a kind, e.g. when a method exports extra columns. The
typed rows only read the columns they know by name, so an added layout must
include those.
*/
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<TableSchema>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self {
            schemas: vec![
                TableKind::PeakIntegration.into(),
                TableKind::LibraryMatch.into(),
                TableKind::FidIntegration.into(),
            ],
        }
    }
}

impl SchemaRegistry {
    /// A registry that recognizes nothing
    pub fn empty() -> Self {
        Self {
            schemas: Vec::new(),
        }
    }

    pub fn register(&mut self, schema: TableSchema) -> &mut Self {
        self.schemas.push(schema);
        self
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Find the kind of table whose column set equals the given header. Empty
    /// column names are ignored.
    pub fn classify<S: AsRef<str>>(&self, header: &[S]) -> Option<TableKind> {
        let columns: HashSet<&str> = header
            .iter()
            .map(|s| s.as_ref())
            .filter(|s| !s.is_empty())
            .collect();
        self.schemas
            .iter()
            .find(|schema| schema.matches(&columns))
            .map(|schema| schema.kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify_unordered() {
        let registry = SchemaRegistry::default();
        let mut header: Vec<&str> = LIBRARY_MATCH_COLUMNS.to_vec();
        header.reverse();
        assert_eq!(registry.classify(&header), Some(TableKind::LibraryMatch));

        assert_eq!(
            registry.classify(PEAK_INTEGRATION_COLUMNS),
            Some(TableKind::PeakIntegration)
        );
        assert_eq!(
            registry.classify(FID_INTEGRATION_COLUMNS),
            Some(TableKind::FidIntegration)
        );

        // The peak type column differs only in its spacing
        let mut header = FID_INTEGRATION_COLUMNS.to_vec();
        header[5] = "PK  TY";
        assert_eq!(registry.classify(&header), None);

        let mut header = LIBRARY_MATCH_COLUMNS.to_vec();
        header.pop();
        assert_eq!(registry.classify(&header), None);
    }

    #[test]
    fn test_register_layout() {
        let mut columns = LIBRARY_MATCH_COLUMNS.to_vec();
        columns.push("Comment");
        let registry = SchemaRegistry::empty()
            .with_schema(TableSchema::new(TableKind::LibraryMatch, columns.clone()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.classify(&columns), Some(TableKind::LibraryMatch));
        assert_eq!(registry.classify(LIBRARY_MATCH_COLUMNS), None);
        assert_eq!(TableKind::from_name("fid"), Some(TableKind::FidIntegration));
        assert_eq!(TableKind::LibraryMatch.to_string(), "lib");
    }
}
