use statrs::distribution::{ContinuousCDF, StudentsT};

/// Guards the t statistic against division by zero when |r| is 1
const TINY: f64 = 1.0e-20;

/// An ordinary least squares fit of `y` on `x`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub r_value: f64,
    /// Two-sided p-value for a null hypothesis of zero slope
    pub p_value: f64,
    /// Standard error of the slope
    pub stderr: f64,
    pub intercept_stderr: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        x * self.slope + self.intercept
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Fit `y = slope * x + intercept` by least squares.
///
/// Returns `None` with fewer than two points, when the lengths differ, or when
/// every `x` is the same. The p-value uses Student's t distribution with
/// `n - 2` degrees of freedom. With exactly two points the fit is exact, the
/// standard errors are zero and the p-value is zero, or one if both `y` are
/// equal.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let xmean = mean(x);
    let ymean = mean(y);
    let mut ssxm = 0.0;
    let mut ssym = 0.0;
    let mut ssxym = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - xmean;
        let dy = yi - ymean;
        ssxm += dx * dx;
        ssym += dy * dy;
        ssxym += dx * dy;
    }
    let nf = n as f64;
    ssxm /= nf;
    ssym /= nf;
    ssxym /= nf;
    if ssxm == 0.0 {
        return None;
    }

    let r_value = if ssym == 0.0 {
        0.0
    } else {
        (ssxym / (ssxm * ssym).sqrt()).clamp(-1.0, 1.0)
    };
    let slope = ssxym / ssxm;
    let intercept = ymean - slope * xmean;

    let (p_value, stderr, intercept_stderr) = if n == 2 {
        let p = if y[0] == y[1] { 1.0 } else { 0.0 };
        (p, 0.0, 0.0)
    } else {
        let df = (n - 2) as f64;
        let t = r_value * (df / ((1.0 - r_value + TINY) * (1.0 + r_value + TINY))).sqrt();
        let p = StudentsT::new(0.0, 1.0, df)
            .map(|dist| 2.0 * dist.sf(t.abs()))
            .unwrap_or(f64::NAN);
        let stderr = ((1.0 - r_value * r_value) * ssym / ssxm / df).sqrt();
        (p, stderr, stderr * (ssxm + xmean * xmean).sqrt())
    };

    Some(LinearFit {
        slope,
        intercept,
        r_value,
        p_value,
        stderr,
        intercept_stderr,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_two_points() {
        let fit = linear_regression(&[100.0, 200.0], &[1.0, 2.0]).unwrap();
        assert!((fit.slope - 0.01).abs() < 1e-12);
        assert!(fit.intercept.abs() < 1e-12);
        assert_eq!(fit.r_value, 1.0);
        assert_eq!(fit.p_value, 0.0);
        assert_eq!(fit.stderr, 0.0);
        assert!((fit.predict(150.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_noisy_line() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.1, 3.9, 6.2, 7.8, 10.1];
        let fit = linear_regression(&x, &y).unwrap();
        assert!((fit.slope - 1.99).abs() < 1e-9);
        assert!((fit.intercept - 0.05).abs() < 1e-9);
        assert!((fit.r_value - 0.998_651_8).abs() < 1e-6);
        assert!((fit.stderr - 0.059_721_6).abs() < 1e-6);
        assert!(fit.p_value > 0.0 && fit.p_value < 1e-3);
    }

    #[test]
    fn test_degenerate() {
        assert!(linear_regression(&[1.0], &[1.0]).is_none());
        assert!(linear_regression(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).is_none());
        let fit = linear_regression(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_value, 0.0);
        assert_eq!(fit.stderr, 0.0);
    }
}
