// src/weighting/calibration.rs

use log::debug;
use ndarray::{Array1, ArrayView1, ArrayView2};

use super::constraints::ConstraintSet;
use super::totals::PopulationTotals;
use crate::records::Record;
use crate::utils::{solve_linear_system, weighted_cross_product, weighted_totals, CombineError, Result};

/// Result of a linear calibration
#[derive(Debug, Clone)]
pub struct CalibrationOutput {
    /// Calibrated weights w = d * g
    pub weights: Array1<f64>,
    /// Adjustment factors g = 1 + (X λ) / s
    pub g_factors: Array1<f64>,
    /// Lagrange multipliers λ
    pub lambda: Array1<f64>,
}

/// Linear calibration using Deville-Särndal method
///
/// Finds weights closest to `wgt` in chi-squared distance whose weighted
/// column totals of `x_matrix` equal `totals`.
///
/// # Arguments
/// * `wgt` - Initial weights (n_obs,)
/// * `x_matrix` - Constraint contributions (n_obs, n_constraints)
/// * `totals` - Target totals (n_constraints,)
/// * `scale` - Scale factors for distance function (n_obs,). Default is 1.0
///
/// # Algorithm
/// Solves the system: (X' diag(w/s) X) λ = (tx - X' w)
/// Then computes: g = 1 + (X λ) / s
/// Calibrated weights: w_cal = w * g
///
/// A singular system is an error; the weights are never regularized.
pub fn calibrate_linear(
    wgt: ArrayView1<f64>,
    x_matrix: ArrayView2<f64>,
    totals: ArrayView1<f64>,
    scale: Option<ArrayView1<f64>>,
) -> Result<CalibrationOutput> {
    let n_obs = wgt.len();
    let (n_obs_x, n_aux) = x_matrix.dim();

    if n_obs_x != n_obs {
        return Err(CombineError::DimensionMismatch {
            expected: n_obs,
            got: n_obs_x,
        });
    }

    if totals.len() != n_aux {
        return Err(CombineError::DimensionMismatch {
            expected: n_aux,
            got: totals.len(),
        });
    }

    let s = match scale {
        Some(s_arr) => {
            if s_arr.len() != n_obs {
                return Err(CombineError::DimensionMismatch {
                    expected: n_obs,
                    got: s_arr.len(),
                });
            }
            if s_arr.iter().any(|&v| !(v > 0.0)) {
                return Err(CombineError::InvalidInput(
                    "Scale factors must be positive".to_string(),
                ));
            }
            s_arr.to_owned()
        }
        None => Array1::ones(n_obs),
    };

    // 1. Current weighted totals: X' w
    let x_w = weighted_totals(x_matrix, wgt);

    // 2. System matrix: X' diag(w/s) X
    let w_over_s = &wgt / &s;
    let a_matrix = weighted_cross_product(x_matrix, w_over_s.view());

    // 3. RHS: totals - X' w
    let b = &totals - &x_w;

    // 4. Lagrange multipliers
    let lambda = solve_linear_system(&a_matrix, &b)?;
    debug!(
        "linear calibration: {} units, {} constraints, lambda = {}",
        n_obs, n_aux, lambda
    );

    // 5. g-factors
    let g_factors = x_matrix.dot(&lambda) / &s + 1.0;
    let weights = &wgt * &g_factors;

    Ok(CalibrationOutput {
        weights,
        g_factors,
        lambda,
    })
}

/// Calibrate sample A so its weighted constraint totals reproduce `totals`.
///
/// `a_idx` lists the A units (record positions) in the same order as
/// `initial_weights`; `b_outcome` holds each record's B-side outcome.
pub fn calibrate_sample(
    records: &[Record],
    a_idx: &[usize],
    initial_weights: &[f64],
    constraints: &ConstraintSet,
    b_outcome: &[Option<f64>],
    totals: &PopulationTotals,
) -> Result<CalibrationOutput> {
    if initial_weights.len() != a_idx.len() {
        return Err(CombineError::DimensionMismatch {
            expected: a_idx.len(),
            got: initial_weights.len(),
        });
    }
    if totals.names().iter().map(String::as_str).ne(constraints.iter().map(|c| c.name())) {
        return Err(CombineError::InvalidInput(
            "Totals do not line up with the constraint set".to_string(),
        ));
    }

    let x_matrix = constraints.design_matrix(records, a_idx, b_outcome)?;
    let wgt = ArrayView1::from(initial_weights);
    calibrate_linear(wgt, x_matrix.view(), totals.values().view(), None)
}
