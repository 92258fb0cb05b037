use super::curves::CalibrationCurves;
use crate::io::standards::StandardsTable;
use crate::matching::{MatchRecord, MatchedTable};

/// A matched row with its back-calculated concentration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConcentrationRecord {
    pub record: MatchRecord,
    /// The response factor of the species' curve
    pub response_factor: Option<f64>,
    pub intercept: Option<f64>,
    pub concentration: Option<f64>,
    /// This row's fraction of its run's total concentration
    pub concentration_share: Option<f64>,
    /// This row's fraction of its run's total area
    pub area_share: Option<f64>,
    /// Whether the area lies inside the area range of the species' standards
    pub within_calibrated_range: Option<bool>,
}

impl ConcentrationRecord {
    pub fn key(&self) -> &str {
        &self.record.key
    }

    pub fn library_id(&self) -> &str {
        self.record.library_id()
    }

    pub fn area(&self) -> Option<f64> {
        self.record.area
    }
}

/// Concentration rows, runs in the order of the matched table
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConcentrationTable {
    pub rows: Vec<ConcentrationRecord>,
}

impl ConcentrationTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConcentrationRecord> {
        self.rows.iter()
    }

    /// The rows of one run
    pub fn group<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ConcentrationRecord> {
        self.rows.iter().filter(move |r| r.key() == key)
    }

    /// Split into the rows of standard runs and the rows of all other runs
    pub fn partition(
        &self,
        standards: &StandardsTable,
    ) -> (ConcentrationTable, ConcentrationTable) {
        let (standard, experimental): (Vec<_>, Vec<_>) = self
            .rows
            .iter()
            .cloned()
            .partition(|r| standards.is_standard_sample(r.key()));
        (
            ConcentrationTable { rows: standard },
            ConcentrationTable { rows: experimental },
        )
    }
}

impl FromIterator<ConcentrationRecord> for ConcentrationTable {
    fn from_iter<T: IntoIterator<Item = ConcentrationRecord>>(iter: T) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

/// `value / total`, or `None` when either is missing or the total is zero
fn share(value: Option<f64>, total: f64) -> Option<f64> {
    let value = value?;
    (total != 0.0).then(|| value / total)
}

/// Apply each species' calibration curve to its matched areas, then compute
/// each row's share of its run's total concentration and area. Missing values
/// count as zero in the totals.
pub fn compute_concentrations(
    matched: &MatchedTable,
    curves: &CalibrationCurves,
) -> ConcentrationTable {
    let mut rows = Vec::with_capacity(matched.len());
    for (_, group) in matched.groups() {
        let start = rows.len();
        for record in group {
            let curve = curves.get(record.library_id());
            let concentration = curve.zip(record.area).and_then(|(c, a)| c.concentration(a));
            rows.push(ConcentrationRecord {
                record: record.clone(),
                response_factor: curve.map(|c| c.slope),
                intercept: curve.map(|c| c.intercept),
                concentration,
                concentration_share: None,
                area_share: None,
                within_calibrated_range: curve.zip(record.area).map(|(c, a)| c.covers(a)),
            });
        }

        let group_rows = &mut rows[start..];
        let total_concentration: f64 = group_rows.iter().filter_map(|r| r.concentration).sum();
        let total_area: f64 = group_rows.iter().filter_map(|r| r.area()).sum();
        for row in group_rows.iter_mut() {
            row.concentration_share = share(row.concentration, total_concentration);
            row.area_share = share(row.area(), total_area);
        }
    }
    ConcentrationTable { rows }
}
