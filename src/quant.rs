//! Turning matched peak areas into concentrations.
//!
//! The runs named as columns of a [`StandardsTable`] hold known amounts of
//! each species. Their matched areas are regressed against those amounts to
//! give one linear response per species, which is then applied to every run.

mod concentration;
mod curves;
mod regression;

use log::info;

pub use concentration::{compute_concentrations, ConcentrationRecord, ConcentrationTable};
pub use curves::{
    calibration_points, fit_calibration, CalibrationCurve, CalibrationCurves, CalibrationFit,
    CalibrationPoint, InsufficientStandards,
};
pub use regression::{linear_regression, LinearFit};

use crate::io::standards::StandardsTable;
use crate::matching::MatchedTable;

/// Everything produced by quantifying a matched table
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantification {
    pub curves: CalibrationCurves,
    pub insufficient: Vec<InsufficientStandards>,
    /// Every run
    pub all: ConcentrationTable,
    /// Only the standard runs
    pub standards: ConcentrationTable,
    /// Every run that is not a standard
    pub experimental: ConcentrationTable,
}

/// Fit the calibration curves and apply them to every matched run
pub fn quantify(matched: &MatchedTable, standards: &StandardsTable) -> Quantification {
    let CalibrationFit {
        curves,
        insufficient,
    } = fit_calibration(matched, standards);
    let all = compute_concentrations(matched, &curves);
    let (standard_rows, experimental) = all.partition(standards);
    info!(
        "Fit {} calibration curves, {} species lacked standards, \
         {} standard and {} experimental rows",
        curves.len(),
        insufficient.len(),
        standard_rows.len(),
        experimental.len()
    );
    Quantification {
        curves,
        insufficient,
        all,
        standards: standard_rows,
        experimental,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::io::report::LibraryRow;
    use crate::matching::MatchRecord;

    fn record(key: &str, library_id: &str, area: Option<f64>) -> MatchRecord {
        MatchRecord::new(key, LibraryRow::new(1, 1.0, library_id), area)
    }

    fn standards() -> StandardsTable {
        StandardsTable::new(vec!["S1".to_string(), "S2".to_string(), "S3".to_string()])
            .with_row("A", vec![Some(1.0), Some(2.0), None])
            .with_row("B", vec![Some(1.0), None, None])
            .with_row("C", vec![Some(1.0), Some(1.0), Some(1.0)])
            .with_row("D", vec![None, None, None])
    }

    fn matched() -> MatchedTable {
        vec![
            record("S1", "A", Some(100.0)),
            record("S1", "B", Some(50.0)),
            record("S1", "C", Some(10.0)),
            record("S2", "A", Some(200.0)),
            record("S2", "C", Some(10.0)),
            record("S3", "A", Some(999.0)),
            record("S3", "C", None),
            record("X1", "A", Some(150.0)),
            record("X1", "B", Some(30.0)),
            record("X1", "C", None),
            record("X1", "E", Some(20.0)),
            record("X2", "A", Some(10.0)),
        ]
        .into_iter()
        .collect()
    }

    #[test_log::test]
    fn test_two_points_make_a_line() {
        let fit = fit_calibration(&matched(), &standards());
        let curve = fit.curve("A").unwrap();
        assert_eq!(curve.points, 2);
        assert!((curve.slope - 0.01).abs() < 1e-12);
        assert!(curve.intercept.abs() < 1e-12);
        assert_eq!(curve.p_value, 0.0);
        assert_eq!(curve.stderr, 0.0);
        assert_eq!((curve.min_area, curve.max_area), (100.0, 200.0));
        // the line passes through both standards
        assert!((curve.concentration(100.0).unwrap() - 1.0).abs() < 1e-12);
        assert!((curve.concentration(200.0).unwrap() - 2.0).abs() < 1e-12);
    }

    #[test_log::test]
    fn test_insufficient_standards() {
        let fit = fit_calibration(&matched(), &standards());
        assert_eq!(fit.curves.len(), 1);
        assert_eq!(
            fit.insufficient,
            vec![
                InsufficientStandards {
                    library_id: "B".to_string(),
                    points: 1,
                    distinct_areas: 1
                },
                InsufficientStandards {
                    library_id: "C".to_string(),
                    points: 2,
                    distinct_areas: 1
                },
            ]
        );
    }

    #[test_log::test]
    fn test_concentrations_and_shares() {
        let matched = matched();
        let fit = fit_calibration(&matched, &standards());
        let table = compute_concentrations(&matched, &fit.curves);
        assert_eq!(table.len(), matched.len());

        let x1: Vec<&ConcentrationRecord> = table.group("X1").collect();
        assert_eq!(x1.len(), 4);
        assert!((x1[0].concentration.unwrap() - 1.5).abs() < 1e-12);
        assert_eq!(x1[0].concentration_share, Some(1.0));
        assert_eq!(x1[0].within_calibrated_range, Some(true));
        assert_eq!(x1[1].concentration, None);
        assert_eq!(x1[1].response_factor, None);
        assert_eq!(x1[1].concentration_share, None);
        assert_eq!(x1[2].area_share, None);
        assert_eq!(x1[3].within_calibrated_range, None);
        assert!((x1[0].area_share.unwrap() - 0.75).abs() < 1e-12);
        assert!((x1[1].area_share.unwrap() - 0.15).abs() < 1e-12);

        let s3: Vec<&ConcentrationRecord> = table.group("S3").collect();
        assert_eq!(s3[0].within_calibrated_range, Some(false));
        assert_eq!(s3[1].concentration, None);
    }

    #[test_log::test]
    fn test_non_physical_concentration() {
        let curve = CalibrationCurve {
            library_id: "A".to_string(),
            slope: 0.01,
            intercept: -1.0,
            r_value: 1.0,
            p_value: 0.0,
            stderr: 0.0,
            intercept_stderr: 0.0,
            points: 2,
            min_area: 200.0,
            max_area: 300.0,
        };
        assert_eq!(curve.concentration(100.0), None);
        assert_eq!(curve.concentration(50.0), None);
        assert!((curve.concentration(250.0).unwrap() - 1.5).abs() < 1e-12);

        let mut curves = CalibrationCurves::new();
        curves.insert("A".to_string(), curve);
        let matched: MatchedTable = vec![
            record("X", "A", Some(50.0)),
            record("X", "A", Some(300.0)),
        ]
        .into_iter()
        .collect();
        let table = compute_concentrations(&matched, &curves);
        assert_eq!(table.rows[0].concentration, None);
        assert_eq!(table.rows[1].concentration_share, Some(1.0));
    }

    #[test_log::test]
    fn test_quantify_partitions() {
        let q = quantify(&matched(), &standards());
        assert_eq!(q.all.len(), 12);
        assert_eq!(q.standards.len(), 7);
        assert_eq!(q.experimental.len(), 5);
        assert!(q.standards.iter().all(|r| r.key().starts_with('S')));
        assert!(q.experimental.iter().all(|r| r.key().starts_with('X')));
        assert_eq!(q.curves.len(), 1);
        assert_eq!(q.insufficient.len(), 2);
    }

    #[test_log::test]
    fn test_concentration_shares_sum_to_one() {
        let standards =
            StandardsTable::new(vec!["S1".to_string(), "S2".to_string(), "S3".to_string()])
                .with_row("A", vec![Some(1.0), Some(2.0), Some(4.0)])
                .with_row("B", vec![Some(0.5), Some(1.5), Some(3.0)]);
        let matched: MatchedTable = vec![
            record("S1", "A", Some(103.0)),
            record("S1", "B", Some(40.0)),
            record("S2", "A", Some(197.0)),
            record("S2", "B", Some(125.0)),
            record("S3", "A", Some(401.0)),
            record("S3", "B", Some(238.0)),
            record("X1", "A", Some(250.0)),
            record("X1", "B", Some(90.0)),
            record("X1", "E", Some(12.0)),
        ]
        .into_iter()
        .collect();
        let fit = fit_calibration(&matched, &standards);
        assert_eq!(fit.curves.len(), 2);

        let table = compute_concentrations(&matched, &fit.curves);
        let x1: Vec<&ConcentrationRecord> = table.group("X1").collect();
        assert!(x1[0].concentration.is_some());
        assert!(x1[1].concentration.is_some());
        assert_eq!(x1[2].concentration_share, None);
        let total: f64 = x1.iter().filter_map(|r| r.concentration_share).sum();
        assert!((total - 1.0).abs() < 1e-12, "shares sum to {total}");
    }

    #[test_log::test]
    fn test_empty_run_has_no_shares() {
        let matched: MatchedTable = vec![
            record("X1", "A", None),
            record("X1", "B", Some(0.0)),
            record("X1", "C", None),
        ]
        .into_iter()
        .collect();
        let table = compute_concentrations(&matched, &CalibrationCurves::new());
        assert_eq!(table.len(), 3);
        for row in table.iter() {
            assert_eq!(row.concentration, None);
            assert_eq!(row.concentration_share, None);
            assert_eq!(row.area_share, None);
        }
    }
}
