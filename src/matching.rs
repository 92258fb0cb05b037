//! Assigning integrated peak areas to library search hits by retention time.
//!
//! Within each run, every pair of a library hit and an integrated peak whose
//! retention times lie within a threshold is a candidate. The pair with the
//! smallest difference is committed first, removing both rows from further
//! consideration, until no candidates remain.

mod pool;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::io::report::{FidRow, Keyed, LibraryRow, PeakRow};

pub use pool::{Candidate, CandidatePool};

/// The default largest accepted retention time difference, in minutes
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Anything with a retention time in minutes
pub trait RetentionTimed {
    fn retention_time(&self) -> f64;
}

/// A row that carries an integrated peak area
pub trait AreaSource: RetentionTimed {
    fn area(&self) -> f64;

    /// The peak number within its run
    fn peak_id(&self) -> i64;
}

impl RetentionTimed for LibraryRow {
    fn retention_time(&self) -> f64 {
        self.rt
    }
}

impl RetentionTimed for PeakRow {
    fn retention_time(&self) -> f64 {
        self.rt
    }
}

impl AreaSource for PeakRow {
    fn area(&self) -> f64 {
        self.area
    }

    fn peak_id(&self) -> i64 {
        self.peak
    }
}

impl RetentionTimed for FidRow {
    fn retention_time(&self) -> f64 {
        self.rt
    }
}

impl AreaSource for FidRow {
    fn area(&self) -> f64 {
        self.area
    }

    fn peak_id(&self) -> i64 {
        self.peak
    }
}

/// A peak area row built by hand
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaPoint {
    pub peak: i64,
    pub rt: f64,
    pub area: f64,
}

impl RetentionTimed for AreaPoint {
    fn retention_time(&self) -> f64 {
        self.rt
    }
}

impl AreaSource for AreaPoint {
    fn area(&self) -> f64 {
        self.area
    }

    fn peak_id(&self) -> i64 {
        self.peak
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchParameters {
    /// The largest accepted retention time difference, in minutes
    pub threshold: f64,
    /// Record which peak was assigned and how far away it was
    pub include_metrics: bool,
}

impl Default for MatchParameters {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            include_metrics: true,
        }
    }
}

impl MatchParameters {
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_metrics(mut self, include_metrics: bool) -> Self {
        self.include_metrics = include_metrics;
        self
    }
}

/// How an area was matched to a library hit
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchMetrics {
    /// The peak number of the assigned area row
    pub area_peak: i64,
    /// The retention time of the assigned area row
    pub area_rt: f64,
    pub delta_rt: f64,
}

/// A library hit and the area assigned to it, if any
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchRecord {
    pub key: String,
    pub library: LibraryRow,
    pub area: Option<f64>,
    pub metrics: Option<MatchMetrics>,
}

impl MatchRecord {
    pub fn new(key: impl Into<String>, library: LibraryRow, area: Option<f64>) -> Self {
        Self {
            key: key.into(),
            library,
            area,
            metrics: None,
        }
    }

    pub fn library_id(&self) -> &str {
        &self.library.library_id
    }

    pub fn rt(&self) -> f64 {
        self.library.rt
    }

    pub fn is_matched(&self) -> bool {
        self.area.is_some()
    }
}

/// Matched rows grouped by run, runs in order of first appearance
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchedTable {
    groups: IndexMap<String, Vec<MatchRecord>>,
}

impl MatchedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: MatchRecord) {
        self.groups
            .entry(record.key.clone())
            .or_default()
            .push(record);
    }

    /// The total number of rows over all runs
    pub fn len(&self) -> usize {
        self.groups.values().map(|g| g.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(|k| k.as_str())
    }

    pub fn group(&self, key: &str) -> Option<&[MatchRecord]> {
        self.groups.get(key).map(|g| g.as_slice())
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[MatchRecord])> {
        self.groups.iter().map(|(k, g)| (k.as_str(), g.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchRecord> {
        self.groups.values().flatten()
    }
}

impl FromIterator<MatchRecord> for MatchedTable {
    fn from_iter<T: IntoIterator<Item = MatchRecord>>(iter: T) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.push(record);
        }
        table
    }
}

fn group_rows<T>(rows: &[Keyed<T>]) -> IndexMap<&str, Vec<&T>> {
    let mut groups: IndexMap<&str, Vec<&T>> = IndexMap::new();
    for row in rows {
        groups.entry(row.key.as_str()).or_default().push(&row.row);
    }
    groups
}

/// Assigns areas to library hits within each run
#[derive(Debug, Clone, Default)]
pub struct RetentionTimeMatcher {
    pub parameters: MatchParameters,
}

impl RetentionTimeMatcher {
    pub fn new(parameters: MatchParameters) -> Self {
        Self { parameters }
    }

    /// Match one run's library hits against its area rows, returning one
    /// record per library hit in the original order
    pub fn match_group<A: AreaSource>(
        &self,
        key: &str,
        library: &[&LibraryRow],
        areas: &[&A],
    ) -> Vec<MatchRecord> {
        let library_times: Vec<f64> = library.iter().map(|r| r.retention_time()).collect();
        let area_times: Vec<f64> = areas.iter().map(|r| r.retention_time()).collect();
        let mut assigned: Vec<Option<Candidate>> = vec![None; library.len()];
        for candidate in CandidatePool::new(&library_times, &area_times, self.parameters.threshold)
        {
            assigned[candidate.library] = Some(candidate);
        }

        let n_matched = assigned.iter().flatten().count();
        debug!(
            "Run {key}: matched {n_matched} of {} library hits against {} areas",
            library.len(),
            areas.len()
        );

        library
            .iter()
            .zip(assigned)
            .map(|(row, candidate)| {
                let mut record = MatchRecord::new(key, (*row).clone(), None);
                if let Some(candidate) = candidate {
                    let area = areas[candidate.area];
                    record.area = Some(area.area());
                    if self.parameters.include_metrics {
                        record.metrics = Some(MatchMetrics {
                            area_peak: area.peak_id(),
                            area_rt: area.retention_time(),
                            delta_rt: candidate.delta,
                        });
                    }
                }
                record
            })
            .collect()
    }

    /// Match every run of the library table against the same run of the area
    /// table. Runs are emitted in order of first appearance in `library`.
    pub fn match_tables<A: AreaSource>(
        &self,
        library: &[Keyed<LibraryRow>],
        areas: &[Keyed<A>],
    ) -> MatchedTable {
        let library_groups = group_rows(library);
        let area_groups = group_rows(areas);
        let mut table = MatchedTable::new();
        for (key, library_rows) in library_groups {
            let area_rows = match area_groups.get(key) {
                Some(rows) => rows.as_slice(),
                None => {
                    warn!("Run {key} has library hits but no areas");
                    &[]
                }
            };
            for record in self.match_group(key, &library_rows, area_rows) {
                table.push(record);
            }
        }
        for key in area_groups.keys() {
            if table.group(key).is_none() {
                warn!("Run {key} has areas but no library hits");
            }
        }
        table
    }
}

/// Match library hits to areas run by run with the default parameters and the
/// given `threshold`
pub fn match_retention_times<A: AreaSource>(
    library: &[Keyed<LibraryRow>],
    areas: &[Keyed<A>],
    threshold: f64,
) -> MatchedTable {
    RetentionTimeMatcher::new(MatchParameters::default().with_threshold(threshold))
        .match_tables(library, areas)
}
