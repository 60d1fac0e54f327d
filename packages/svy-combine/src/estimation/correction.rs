// src/estimation/correction.rs

use log::debug;
use serde::{Deserialize, Serialize};

use crate::records::Record;
use crate::utils::{CombineError, Result};

/// Slopes closer to zero than this cannot be inverted
const SLOPE_EPS: f64 = 1e-12;

/// Linear measurement error model: outcome_a ≈ intercept + slope * outcome_b
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionModel {
    pub intercept: f64,
    pub slope: f64,
}

impl CorrectionModel {
    /// Ordinary least squares of `y` on `x`.
    ///
    /// A fitted slope that is not finite or within `1e-12` of zero is
    /// rejected, so every model returned here can be inverted.
    pub fn fit(x: &[f64], y: &[f64]) -> Result<Self> {
        let n = x.len();
        if y.len() != n {
            return Err(CombineError::DimensionMismatch { expected: n, got: y.len() });
        }
        if n < 2 {
            return Err(CombineError::InsufficientValidationData { found: n });
        }

        let nf = n as f64;
        let x_bar = x.iter().sum::<f64>() / nf;
        let y_bar = y.iter().sum::<f64>() / nf;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (&xi, &yi) in x.iter().zip(y.iter()) {
            sxx += (xi - x_bar).powi(2);
            sxy += (xi - x_bar) * (yi - y_bar);
        }

        // Constant reference values leave the slope undefined
        if sxx == 0.0 {
            return Err(CombineError::DegenerateCorrectionModel { slope: f64::NAN });
        }

        let slope = sxy / sxx;
        if !slope.is_finite() || slope.abs() < SLOPE_EPS {
            return Err(CombineError::DegenerateCorrectionModel { slope });
        }
        Ok(Self {
            intercept: y_bar - slope * x_bar,
            slope,
        })
    }

    /// Map an error-prone value back to the reference scale.
    pub fn invert(&self, y: f64) -> f64 {
        (y - self.intercept) / self.slope
    }
}

/// Fit the correction model on validation units and correct sample A.
///
/// Returns one value per record: the corrected A outcome for A units, the
/// B outcome for everyone else. Validation units need both outcomes observed.
pub fn fit_and_correct(records: &[Record]) -> Result<(Vec<Option<f64>>, CorrectionModel)> {
    let (x, y): (Vec<f64>, Vec<f64>) = records
        .iter()
        .filter(|r| r.is_validation())
        .filter_map(|r| Some((r.outcome_b?, r.outcome_a?)))
        .unzip();

    let model = CorrectionModel::fit(&x, &y)?;
    debug!(
        "correction model on {} validation units: intercept = {}, slope = {}",
        x.len(),
        model.intercept,
        model.slope
    );

    let corrected = records
        .iter()
        .map(|r| if r.in_a { r.outcome_a.map(|y| model.invert(y)) } else { r.outcome_b })
        .collect();

    Ok((corrected, model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_exact_line() {
        // y = 1 + 2x
        let model = CorrectionModel::fit(&[0.0, 1.0, 2.0, 3.0], &[1.0, 3.0, 5.0, 7.0]).unwrap();
        assert_relative_eq!(model.intercept, 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(model.invert(9.0), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_and_correct() {
        let records = vec![
            // A only: corrected through the model
            Record::new(true, false).with_outcome_a(11.0),
            // Validation units, outcome_a = 1 + 2 * outcome_b
            Record::new(true, true).with_outcome_a(3.0).with_outcome_b(1.0),
            Record::new(true, true).with_outcome_a(5.0).with_outcome_b(2.0),
            Record::new(true, true).with_outcome_a(9.0).with_outcome_b(4.0),
            // B only: kept as observed
            Record::new(false, true).with_outcome_b(6.5),
            Record::new(false, false),
        ];

        let (corrected, model) = fit_and_correct(&records).unwrap();

        assert_relative_eq!(model.intercept, 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(corrected[0].unwrap(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(corrected[1].unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(corrected[3].unwrap(), 4.0, epsilon = 1e-12);
        assert_eq!(corrected[4], Some(6.5));
        assert_eq!(corrected[5], None);
    }

    #[test]
    fn test_insufficient_validation_data() {
        let none_shared = vec![
            Record::new(true, false).with_outcome_a(1.0),
            Record::new(false, true).with_outcome_b(1.0),
        ];
        assert!(matches!(
            fit_and_correct(&none_shared),
            Err(CombineError::InsufficientValidationData { found: 0 })
        ));

        let one_shared = vec![
            Record::new(true, true).with_outcome_a(1.0).with_outcome_b(1.2),
            Record::new(false, true).with_outcome_b(1.0),
        ];
        assert!(matches!(
            fit_and_correct(&one_shared),
            Err(CombineError::InsufficientValidationData { found: 1 })
        ));
    }

    #[test]
    fn test_validation_units_need_both_outcomes() {
        let records = vec![
            Record::new(true, true).with_outcome_a(1.0).with_outcome_b(1.0),
            Record::new(true, true).with_outcome_a(2.0),
        ];
        assert!(matches!(
            fit_and_correct(&records),
            Err(CombineError::InsufficientValidationData { found: 1 })
        ));
    }

    #[test]
    fn test_zero_slope_is_degenerate() {
        // outcome_a does not move with outcome_b
        let records = vec![
            Record::new(true, true).with_outcome_a(4.0).with_outcome_b(1.0),
            Record::new(true, true).with_outcome_a(4.0).with_outcome_b(2.0),
            Record::new(true, true).with_outcome_a(4.0).with_outcome_b(3.0),
        ];
        assert!(matches!(
            fit_and_correct(&records),
            Err(CombineError::DegenerateCorrectionModel { .. })
        ));
    }

    #[test]
    fn test_fit_rejects_flat_line() {
        let result = CorrectionModel::fit(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]);
        assert!(matches!(
            result,
            Err(CombineError::DegenerateCorrectionModel { slope }) if slope == 0.0
        ));

        // Slope of 1e-13 is below the inversion threshold
        let tiny = CorrectionModel::fit(&[0.0, 1.0], &[2.0, 2.0 + 1e-13]);
        assert!(matches!(tiny, Err(CombineError::DegenerateCorrectionModel { .. })));
    }

    #[test]
    fn test_constant_reference_is_degenerate() {
        let records = vec![
            Record::new(true, true).with_outcome_a(1.0).with_outcome_b(2.0),
            Record::new(true, true).with_outcome_a(3.0).with_outcome_b(2.0),
        ];
        assert!(matches!(
            fit_and_correct(&records),
            Err(CombineError::DegenerateCorrectionModel { .. })
        ));
    }
}
