// src/estimation/taylor.rs

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::utils::{solve_linear_system, weighted_cross_product, CombineError, Result};

// ============================================================================
// Point Estimates
// ============================================================================

/// Weighted mean over units with an observed outcome
pub fn point_estimate_mean(y: &[Option<f64>], weights: ArrayView1<f64>) -> Result<f64> {
    if y.len() != weights.len() {
        return Err(CombineError::DimensionMismatch {
            expected: weights.len(),
            got: y.len(),
        });
    }

    let (sum_wy, sum_w) = y
        .iter()
        .zip(weights.iter())
        .filter_map(|(&yi, &wi)| Some((yi? * wi, wi)))
        .fold((0.0, 0.0), |(swy, sw), (wy, w)| (swy + wy, sw + w));

    if sum_w == 0.0 {
        return Err(CombineError::InvalidInput("Sum of weights is zero".into()));
    }
    Ok(sum_wy / sum_w)
}

// ============================================================================
// Linearization Scores
// ============================================================================

/// Linearization scores of a calibrated weighted mean.
///
/// The mean's linear variable `e_i = y_i - ȳ` (zero for units without an
/// observed outcome) is regressed on the calibration constraints with the
/// initial weights over every row, and each unit's score is its calibrated
/// weight times the residual, scaled by the weight sum of observed units:
///
/// ```text
/// B = (Σ d z z')⁻¹ Σ d z e
/// u_i = w_i (e_i - z_i' B) / Σ_obs w
/// ```
///
/// The regression matrix is the calibration matrix itself, so it is
/// non-singular whenever calibration succeeded.
pub fn scores_calibrated_mean(
    y: &[Option<f64>],
    initial: ArrayView1<f64>,
    calibrated: ArrayView1<f64>,
    x_matrix: ArrayView2<f64>,
) -> Result<Array1<f64>> {
    let n = calibrated.len();
    if y.len() != n || initial.len() != n || x_matrix.nrows() != n {
        return Err(CombineError::DimensionMismatch {
            expected: n,
            got: y.len().max(initial.len()).max(x_matrix.nrows()),
        });
    }

    if y.iter().all(Option::is_none) {
        return Ok(Array1::zeros(n));
    }

    let est = point_estimate_mean(y, calibrated)?;
    let sum_w: f64 = y
        .iter()
        .zip(calibrated.iter())
        .filter_map(|(yi, &wi)| yi.map(|_| wi))
        .sum();

    let e: Array1<f64> = y.iter().map(|yi| yi.map_or(0.0, |v| v - est)).collect();

    // Weighted regression of e on the constraints
    let xtdx = weighted_cross_product(x_matrix, initial);
    let xtde = x_matrix.t().dot(&(&initial * &e));
    let beta = solve_linear_system(&xtdx, &xtde)?;

    let residuals = &e - &x_matrix.dot(&beta);
    Ok(&calibrated * &residuals / sum_w)
}

// ============================================================================
// Taylor Variance
// ============================================================================

/// Finite population correction for sampling `n` out of `population` without replacement
pub fn srs_fpc(n: f64, population: f64) -> f64 {
    if population <= 0.0 {
        return 1.0;
    }
    (1.0 - n / population).max(0.0)
}

/// Variance of a linearized estimator, every unit its own PSU
pub fn taylor_variance(scores: ArrayView1<f64>, fpc: f64) -> f64 {
    fpc * variance_unstratified(scores)
}

fn variance_unstratified(scores: ArrayView1<f64>) -> f64 {
    let n = scores.len();
    if n <= 1 { return 0.0; }
    let mean: f64 = scores.sum() / (n as f64);
    let sum_sq_diff: f64 = scores.iter().map(|&s| (s - mean).powi(2)).sum();
    (n as f64 / (n as f64 - 1.0)) * sum_sq_diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_point_estimate_mean_skips_missing() {
        let y = vec![Some(1.0), None, Some(4.0)];
        let w = array![1.0, 100.0, 2.0];
        assert_relative_eq!(point_estimate_mean(&y, w.view()).unwrap(), 3.0);
    }

    #[test]
    fn test_point_estimate_mean_zero_weights() {
        let y = vec![Some(1.0), Some(2.0)];
        let w = array![0.0, 0.0];
        assert!(point_estimate_mean(&y, w.view()).is_err());
    }

    #[test]
    fn test_variance_unstratified() {
        let scores = array![1.0, 2.0, 3.0, 4.0];
        // mean 2.5, ss = 5, n/(n-1) = 4/3
        assert_relative_eq!(taylor_variance(scores.view(), 1.0), 20.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(taylor_variance(scores.view(), 0.5), 10.0 / 3.0, epsilon = 1e-12);
        assert_eq!(taylor_variance(array![3.0].view(), 1.0), 0.0);
    }

    #[test]
    fn test_srs_fpc() {
        assert_relative_eq!(srs_fpc(3.0, 10.0), 0.7);
        assert_eq!(srs_fpc(20.0, 10.0), 0.0);
    }

    #[test]
    fn test_intercept_only_scores_match_srs_mean() {
        // With only an intercept the scores are w_i (y_i - ȳ) / Σw
        let y = vec![Some(2.0), Some(4.0), Some(9.0)];
        let d = array![1.0, 1.0, 1.0];
        let w = array![2.0, 2.0, 2.0];
        let x = array![[1.0], [1.0], [1.0]];

        let scores = scores_calibrated_mean(&y, d.view(), w.view(), x.view()).unwrap();
        assert_relative_eq!(scores[0], -3.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(scores[1], -1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(scores[2], 4.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scores_vanish_when_outcome_is_a_constraint() {
        // y lies in the span of the constraints: zero residual variance
        let y = vec![Some(1.0), Some(3.0), Some(5.0), Some(7.0)];
        let d = array![1.0, 2.0, 1.0, 1.0];
        let w = array![1.5, 1.0, 2.0, 1.0];
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];

        let scores = scores_calibrated_mean(&y, d.view(), w.view(), x.view()).unwrap();
        for s in scores.iter() {
            assert!(s.abs() < 1e-12);
        }
    }

    #[test]
    fn test_unobserved_units_keep_a_score_row() {
        let y = vec![Some(1.0), None, Some(5.0), Some(2.0)];
        let d = array![1.0, 1.0, 1.0, 1.0];
        let w = array![1.0, 1.0, 1.0, 1.0];
        let x = array![[1.0], [1.0], [1.0], [1.0]];

        let scores = scores_calibrated_mean(&y, d.view(), w.view(), x.view()).unwrap();
        assert_eq!(scores.len(), 4);
        // e sums to zero, so the intercept fit is zero and scores are e / 3
        assert_relative_eq!(scores[0], (1.0 - 8.0 / 3.0) / 3.0, epsilon = 1e-12);
        assert_relative_eq!(scores[1], 0.0, epsilon = 1e-12);
        assert_relative_eq!(scores.sum(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_constraint_without_observed_outcomes_is_not_singular() {
        // Second constraint is only non-zero on units lacking an outcome
        let y = vec![Some(2.0), Some(4.0), None, None];
        let d = array![1.0, 1.0, 1.0, 1.0];
        let w = array![1.5, 0.5, 1.0, 1.0];
        let x = array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]];

        let scores = scores_calibrated_mean(&y, d.view(), w.view(), x.view()).unwrap();
        assert_eq!(scores.len(), 4);
        assert!(scores.iter().all(|s| s.is_finite()));
    }
}
