//! Regression Module
//! Closed-form least squares: a simple linear fit and a polynomial trend
//! model with extrapolation support. No iterative solvers, no randomness.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::cmp::Ordering;
use thiserror::Error;

/// Pivot magnitude below which the normal equations count as singular.
const SINGULAR_EPS: f64 = 1e-12;

#[derive(Error, Debug)]
pub enum RegressionError {
    #[error("Degenerate input: {0}")]
    DegenerateInput(&'static str),
    #[error("Input lengths differ ({0} xs vs {1} ys)")]
    MismatchedLengths(usize, usize),
}

/// Ordinary least squares of one response on one predictor.
#[derive(Debug, Clone, Serialize)]
pub struct LinearModel {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-tailed significance of the slope against zero (Student's t,
    /// n - 2 degrees of freedom). `None` when n <= 2 or the fit is exact.
    pub p_value: Option<f64>,
}

impl LinearModel {
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self, RegressionError> {
        if xs.len() != ys.len() {
            return Err(RegressionError::MismatchedLengths(xs.len(), ys.len()));
        }
        let n = xs.len();
        if n < 2 {
            return Err(RegressionError::DegenerateInput("need at least two points"));
        }

        let n_f = n as f64;
        let x_mean = xs.iter().sum::<f64>() / n_f;
        let y_mean = ys.iter().sum::<f64>() / n_f;

        let sxx: f64 = xs.iter().map(|x| (x - x_mean).powi(2)).sum();
        if sxx == 0.0 {
            return Err(RegressionError::DegenerateInput(
                "predictor has zero variance",
            ));
        }
        let sxy: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (x - x_mean) * (y - y_mean))
            .sum();

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let ss_res: f64 = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum();
        let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
        let r_squared = if ss_tot == 0.0 {
            1.0
        } else {
            1.0 - ss_res / ss_tot
        };

        let p_value = Self::slope_p_value(slope, ss_res, sxx, n);

        Ok(Self {
            slope,
            intercept,
            r_squared,
            p_value,
        })
    }

    fn slope_p_value(slope: f64, ss_res: f64, sxx: f64, n: usize) -> Option<f64> {
        if n <= 2 {
            return None;
        }
        let se = (ss_res / (n as f64 - 2.0) / sxx).sqrt();
        if se == 0.0 {
            return None;
        }
        let t = slope / se;
        let dist = StudentsT::new(0.0, 1.0, n as f64 - 2.0).ok()?;
        Some(2.0 * (1.0 - dist.cdf(t.abs())))
    }

    /// Valid for any x, including values outside the training range.
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }

    pub fn predict_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.predict(x)).collect()
    }
}

/// Degree-d polynomial trend fitted by ordinary least squares.
///
/// The predictor is centered and scaled before monomial expansion; the
/// transform is stored in the model, so fitting on raw calendar years keeps
/// the normal equations well-conditioned while predictions stay identical to
/// an uncentered fit.
#[derive(Debug, Clone, Serialize)]
pub struct PolynomialModel {
    pub degree: usize,
    pub x_offset: f64,
    pub x_scale: f64,
    /// Coefficients of the transformed predictor, constant term first.
    pub coefficients: Vec<f64>,
}

impl PolynomialModel {
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self, RegressionError> {
        if xs.len() != ys.len() {
            return Err(RegressionError::MismatchedLengths(xs.len(), ys.len()));
        }
        if distinct_count(xs) < degree + 1 {
            return Err(RegressionError::DegenerateInput(
                "fewer distinct x values than degree + 1",
            ));
        }

        let x_offset = xs.iter().sum::<f64>() / xs.len() as f64;
        let spread = xs
            .iter()
            .map(|x| (x - x_offset).abs())
            .fold(0.0f64, f64::max);
        let x_scale = if spread > 0.0 { spread } else { 1.0 };

        // Normal equations A^T A c = A^T y on the transformed predictor.
        let m = degree + 1;
        let mut ata = vec![vec![0.0f64; m]; m];
        let mut aty = vec![0.0f64; m];
        for (&x, &y) in xs.iter().zip(ys) {
            let t = (x - x_offset) / x_scale;
            let mut powers = vec![1.0f64; m];
            for k in 1..m {
                powers[k] = powers[k - 1] * t;
            }
            for r in 0..m {
                aty[r] += powers[r] * y;
                for c in 0..m {
                    ata[r][c] += powers[r] * powers[c];
                }
            }
        }

        let coefficients = solve(ata, aty)?;
        Ok(Self {
            degree,
            x_offset,
            x_scale,
            coefficients,
        })
    }

    /// Valid for any x, including extrapolation beyond the training range.
    pub fn predict(&self, x: f64) -> f64 {
        let t = (x - self.x_offset) / self.x_scale;
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    }

    pub fn predict_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.predict(x)).collect()
    }
}

fn distinct_count(xs: &[f64]) -> usize {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted.dedup();
    sorted.len()
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, RegressionError> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r1, &r2| {
                a[r1][col]
                    .abs()
                    .partial_cmp(&a[r2][col].abs())
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() < SINGULAR_EPS {
            return Err(RegressionError::DegenerateInput(
                "rank-deficient feature matrix",
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let pivot_row = a[col].clone();
        let b_col = b[col];
        for row in (col + 1)..n {
            let factor = a[row][col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * pivot_row[k];
            }
            b[row] -= factor * b_col;
        }
    }

    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let mut acc = b[row];
        for k in (row + 1)..n {
            acc -= a[row][k] * x[k];
        }
        x[row] = acc / a[row][row];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let tol = 1e-6 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn linear_fit_recovers_exact_line() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let model = LinearModel::fit(&xs, &ys).unwrap();

        assert_close(model.slope, 2.0);
        assert_close(model.intercept, 1.0);
        assert_close(model.r_squared, 1.0);
        // Extrapolation well outside the training range.
        assert_close(model.predict(-50.0), -99.0);
        assert_close(model.predict(1000.0), 2001.0);
    }

    #[test]
    fn linear_fit_reports_significance_on_noisy_data() {
        let xs: Vec<f64> = (0..20).map(|i| i as f64).collect();
        // Strong trend plus a small deterministic wobble.
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x + (x * 1.3).sin()).collect();
        let model = LinearModel::fit(&xs, &ys).unwrap();

        let p = model.p_value.unwrap();
        assert!(p < 0.001, "trend should be significant, got p = {p}");
        assert!(model.r_squared > 0.99);
    }

    #[test]
    fn zero_variance_predictor_is_degenerate() {
        let xs = vec![5.0; 4];
        let ys = vec![1.0, 2.0, 3.0, 4.0];
        let err = LinearModel::fit(&xs, &ys).unwrap_err();
        assert!(matches!(err, RegressionError::DegenerateInput(_)));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = LinearModel::fit(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, RegressionError::MismatchedLengths(2, 1)));
    }

    #[test]
    fn cubic_fit_recovers_held_out_predictions() {
        let cubic = |x: f64| 2.0 * x.powi(3) - 3.0 * x.powi(2) + 4.0 * x - 5.0;
        let xs: Vec<f64> = (-4..=4).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| cubic(x)).collect();

        let model = PolynomialModel::fit(&xs, &ys, 3).unwrap();
        for held_out in [-7.0, 6.5, 10.0] {
            assert_close(model.predict(held_out), cubic(held_out));
        }
    }

    #[test]
    fn cubic_fit_on_calendar_years_stays_solvable() {
        let curve = |x: f64| 0.002 * (x - 1980.0).powi(3) + 1.5 * (x - 1980.0) + 10.0;
        let xs: Vec<f64> = (1980..=2020).map(|y| y as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| curve(x)).collect();

        let model = PolynomialModel::fit(&xs, &ys, 3).unwrap();
        // Forecast a decade past the training range.
        assert_close(model.predict(2030.0), curve(2030.0));
    }

    #[test]
    fn too_few_distinct_points_is_degenerate() {
        let xs = vec![1.0, 1.0, 2.0, 2.0];
        let ys = vec![1.0, 1.0, 8.0, 8.0];
        let err = PolynomialModel::fit(&xs, &ys, 3).unwrap_err();
        assert!(matches!(err, RegressionError::DegenerateInput(_)));
    }
}
