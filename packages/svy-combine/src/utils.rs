// src/utils.rs

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CombineError {
    #[error("Missing column(s): {}", .0.join(", "))]
    MissingColumn(Vec<String>),

    #[error("Constraint cross-product matrix is singular ({constraints} constraints)")]
    SingularConstraintMatrix { constraints: usize },

    #[error("Need at least 2 units observed in both samples, found {found}")]
    InsufficientValidationData { found: usize },

    #[error("Correction model slope {slope} cannot be inverted")]
    DegenerateCorrectionModel { slope: f64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, CombineError>;

/// Weighted totals of each column: X' w
pub fn weighted_totals(x_matrix: ArrayView2<f64>, wgt: ArrayView1<f64>) -> Array1<f64> {
    let (n_obs, n_cols) = x_matrix.dim();
    let mut totals = Array1::zeros(n_cols);

    for i in 0..n_obs {
        for j in 0..n_cols {
            totals[j] += x_matrix[[i, j]] * wgt[i];
        }
    }

    totals
}

/// Weighted cross-product matrix: X' diag(w) X
pub fn weighted_cross_product(x_matrix: ArrayView2<f64>, wgt: ArrayView1<f64>) -> Array2<f64> {
    let (n_obs, n_cols) = x_matrix.dim();
    let mut cross = Array2::zeros((n_cols, n_cols));

    for i in 0..n_obs {
        for j1 in 0..n_cols {
            let left = x_matrix[[i, j1]] * wgt[i];
            for j2 in j1..n_cols {
                cross[[j1, j2]] += left * x_matrix[[i, j2]];
            }
        }
    }

    // Mirror the upper triangle
    for j1 in 0..n_cols {
        for j2 in 0..j1 {
            cross[[j1, j2]] = cross[[j2, j1]];
        }
    }

    cross
}

/// Solve A x = b for a weighted cross-product matrix A.
///
/// A is equilibrated as D^-1/2 A D^-1/2 with D = diag(A), so the singularity
/// test does not depend on the units of the columns. The scaled system is
/// solved by Gaussian elimination with partial pivoting and mapped back.
/// A non-positive diagonal entry (an all-zero column) or a scaled pivot below
/// `1e-10` is reported as singular.
pub fn solve_linear_system(a: &Array2<f64>, b: &Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();

    if a.ncols() != n {
        return Err(CombineError::DimensionMismatch {
            expected: n,
            got: a.ncols(),
        });
    }
    if b.len() != n {
        return Err(CombineError::DimensionMismatch {
            expected: n,
            got: b.len(),
        });
    }

    let diag = a.diag();
    if diag.iter().any(|&v| !(v > 0.0 && v.is_finite())) {
        return Err(CombineError::SingularConstraintMatrix { constraints: n });
    }
    let scale: Array1<f64> = diag.mapv(|v| 1.0 / v.sqrt());

    // Augmented matrix [D^-1/2 A D^-1/2 | D^-1/2 b]
    let mut aug = Array2::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = scale[i] * a[[i, j]] * scale[j];
        }
        aug[[i, n]] = scale[i] * b[i];
    }

    for k in 0..n {
        let mut max_val = aug[[k, k]].abs();
        let mut max_row = k;

        for i in (k + 1)..n {
            let val = aug[[i, k]].abs();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_val <= 1e-10 {
            return Err(CombineError::SingularConstraintMatrix { constraints: n });
        }

        if max_row != k {
            for j in 0..=n {
                aug.swap([k, j], [max_row, j]);
            }
        }

        for i in (k + 1)..n {
            let factor = aug[[i, k]] / aug[[k, k]];
            for j in k..=n {
                aug[[i, j]] -= factor * aug[[k, j]];
            }
        }
    }

    let mut y = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = aug[[i, n]];
        for j in (i + 1)..n {
            sum -= aug[[i, j]] * y[j];
        }
        y[i] = sum / aug[[i, i]];
    }

    Ok(&y * &scale)
}
