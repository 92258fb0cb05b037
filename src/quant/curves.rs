use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, warn};

use super::regression::linear_regression;
use crate::io::standards::StandardsTable;
use crate::matching::MatchedTable;

/// A matched area in a standard run paired with the known concentration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationPoint {
    pub library_id: String,
    /// The standard run the area was measured in
    pub key: String,
    pub area: f64,
    pub concentration: f64,
}

/// A per-species linear response, concentration = area × slope + intercept
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationCurve {
    pub library_id: String,
    /// The response factor
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub p_value: f64,
    pub stderr: f64,
    pub intercept_stderr: f64,
    pub points: usize,
    /// The smallest and largest standard areas the curve was fit on
    pub min_area: f64,
    pub max_area: f64,
}

impl CalibrationCurve {
    /// Back-calculate a concentration. Non-physical results are `None`.
    pub fn concentration(&self, area: f64) -> Option<f64> {
        let value = area * self.slope + self.intercept;
        (value > 0.0).then_some(value)
    }

    /// Whether `area` lies within the range of the standards
    pub fn covers(&self, area: f64) -> bool {
        self.min_area <= area && area <= self.max_area
    }
}

/// A species with known concentrations that could not be given a curve
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InsufficientStandards {
    pub library_id: String,
    pub points: usize,
    pub distinct_areas: usize,
}

/// Calibration curves keyed by species, in standards table order
pub type CalibrationCurves = IndexMap<String, CalibrationCurve>;

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalibrationFit {
    pub curves: CalibrationCurves,
    pub insufficient: Vec<InsufficientStandards>,
}

impl CalibrationFit {
    pub fn curve(&self, library_id: &str) -> Option<&CalibrationCurve> {
        self.curves.get(library_id)
    }
}

/// Pair every matched area measured in a standard run with that species'
/// known concentration in that run. Rows without an area or without a known
/// concentration are dropped.
pub fn calibration_points(
    matched: &MatchedTable,
    standards: &StandardsTable,
) -> Vec<CalibrationPoint> {
    let mut known: HashMap<(String, String), Vec<f64>> = HashMap::new();
    for point in standards.melt() {
        known
            .entry((point.library_id, point.sample))
            .or_default()
            .push(point.concentration);
    }

    let mut points = Vec::new();
    for record in matched.iter() {
        let Some(area) = record.area else {
            continue;
        };
        let id = (record.library_id().to_string(), record.key.clone());
        if let Some(concentrations) = known.get(&id) {
            for concentration in concentrations {
                points.push(CalibrationPoint {
                    library_id: id.0.clone(),
                    key: id.1.clone(),
                    area,
                    concentration: *concentration,
                });
            }
        }
    }
    points
}

fn count_distinct(values: &[f64]) -> usize {
    let mut values = values.to_vec();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    values.len()
}

/// Fit a calibration curve for every species in the standards table.
///
/// A species needs at least two points spanning at least two distinct areas,
/// otherwise it is listed in [`CalibrationFit::insufficient`].
pub fn fit_calibration(matched: &MatchedTable, standards: &StandardsTable) -> CalibrationFit {
    let mut groups: IndexMap<String, Vec<CalibrationPoint>> = IndexMap::new();
    for point in standards.melt() {
        groups.entry(point.library_id).or_default();
    }
    for point in calibration_points(matched, standards) {
        groups
            .entry(point.library_id.clone())
            .or_default()
            .push(point);
    }

    let mut fit = CalibrationFit::default();
    for (library_id, points) in groups {
        let areas: Vec<f64> = points.iter().map(|p| p.area).collect();
        let concentrations: Vec<f64> = points.iter().map(|p| p.concentration).collect();
        let distinct_areas = count_distinct(&areas);
        let line = if points.len() >= 2 && distinct_areas >= 2 {
            linear_regression(&areas, &concentrations)
        } else {
            None
        };
        match line {
            Some(line) => {
                let min_area = areas.iter().copied().fold(f64::INFINITY, f64::min);
                let max_area = areas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                debug!(
                    "{library_id}: response factor {} over {} points, r = {}",
                    line.slope,
                    points.len(),
                    line.r_value
                );
                fit.curves.insert(
                    library_id.clone(),
                    CalibrationCurve {
                        library_id,
                        slope: line.slope,
                        intercept: line.intercept,
                        r_value: line.r_value,
                        p_value: line.p_value,
                        stderr: line.stderr,
                        intercept_stderr: line.intercept_stderr,
                        points: points.len(),
                        min_area,
                        max_area,
                    },
                );
            }
            None => {
                warn!(
                    "{library_id}: {} standard points with {distinct_areas} distinct areas, \
                     no curve fit",
                    points.len()
                );
                fit.insufficient.push(InsufficientStandards {
                    library_id,
                    points: points.len(),
                    distinct_areas,
                });
            }
        }
    }
    fit
}
