use super::reader::ReportTables;
use super::rows::{FidRow, LibraryRow, PeakRow, ReportRow};

/// A row tagged with the run it came from
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyed<T> {
    pub key: String,
    pub row: T,
}

impl<T> Keyed<T> {
    pub fn new(key: impl Into<String>, row: T) -> Self {
        Self {
            key: key.into(),
            row,
        }
    }
}

/// Stack the rows of type `T` from several runs' reports, in run order
pub fn stack_rows<'a, T, I>(runs: I) -> Vec<Keyed<T>>
where
    T: ReportRow + Clone + 'a,
    I: IntoIterator<Item = (&'a str, &'a ReportTables)>,
{
    runs.into_iter()
        .flat_map(|(key, tables)| {
            tables
                .rows::<T>()
                .iter()
                .cloned()
                .map(move |row| Keyed::new(key, row))
        })
        .collect()
}

/// The report tables of many runs, each row keyed by its run
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyedTables {
    pub peaks: Vec<Keyed<PeakRow>>,
    pub library: Vec<Keyed<LibraryRow>>,
    pub fid: Vec<Keyed<FidRow>>,
}

impl KeyedTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one run's report under `key`
    pub fn push(&mut self, key: &str, tables: &ReportTables) {
        let run = [(key, tables)];
        self.peaks.extend(stack_rows::<PeakRow, _>(run));
        self.library.extend(stack_rows::<LibraryRow, _>(run));
        self.fid.extend(stack_rows::<FidRow, _>(run));
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty() && self.library.is_empty() && self.fid.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a ReportTables)> for KeyedTables {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a ReportTables)>>(iter: T) -> Self {
        let mut this = Self::new();
        for (key, tables) in iter {
            this.push(key, tables);
        }
        this
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::report::{parse_report, SchemaRegistry};

    #[test]
    fn test_stack_runs() {
        let registry = SchemaRegistry::default();
        let a = parse_report(
            "Header=,PK,RT,Area Pct,Library/ID,Ref,CAS,Qual\n1=,1,1.0,100,A,1,,90\n".as_bytes(),
            &registry,
        )
        .unwrap();
        let b = parse_report(
            concat!(
                "Header=,PK,RT,Area Pct,Library/ID,Ref,CAS,Qual\n",
                "1=,1,1.1,50,A,1,,90\n",
                "2=,2,2.0,50,B,2,,80\n",
            )
            .as_bytes(),
            &registry,
        )
        .unwrap();
        let stacked: KeyedTables = [("FA01.D", &a), ("FA02.D", &b)].into_iter().collect();
        assert_eq!(stacked.library.len(), 3);
        assert!(stacked.peaks.is_empty());
        let keys: Vec<&str> = stacked.library.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["FA01.D", "FA02.D", "FA02.D"]);
        assert_eq!(stacked.library[2].row.library_id, "B");
        assert_eq!(stacked.library[0].row.cas, "");
    }
}
