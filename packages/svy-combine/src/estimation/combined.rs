// src/estimation/combined.rs

use log::{debug, warn};
use ndarray::ArrayView1;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::correction::fit_and_correct;
use super::taylor::{point_estimate_mean, scores_calibrated_mean, srs_fpc, taylor_variance};
use crate::config::{CorrectionMode, EstimatorConfig};
use crate::frame::records_from_frame;
use crate::records::{count_sample_b, initial_weights, missing_auxiliaries, sample_a_indices, Record};
use crate::utils::{CombineError, Result};
use crate::weighting::calibration::calibrate_sample;
use crate::weighting::constraints::ConstraintSet;
use crate::weighting::totals::compute_totals_with_outcome;

/// Combined estimate of the population mean
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub mean: f64,
    pub variance: f64,
}

impl EstimateResult {
    pub fn std_err(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Estimate the population mean by calibrating sample A to totals from sample B.
///
/// All input checks run before any numeric work. In `CorrectA` mode the A
/// outcome is first mapped through a measurement error model fit on the
/// units observed in both samples, and the B outcome total is rebuilt from
/// the corrected values.
///
/// An auxiliary that no record carries is reported as `MissingColumn`.
pub fn estimate(records: &[Record], config: &EstimatorConfig) -> Result<EstimateResult> {
    let missing = missing_auxiliaries(records, &config.aux_names);
    if !missing.is_empty() {
        return Err(CombineError::MissingColumn(missing));
    }
    estimate_records(records, config)
}

/// Records whose auxiliary columns are known to exist; absent values contribute zero.
fn estimate_records(records: &[Record], config: &EstimatorConfig) -> Result<EstimateResult> {
    config.validate()?;
    let constraints = ConstraintSet::new(&config.aux_names)?;

    let a_idx = sample_a_indices(records);
    if a_idx.is_empty() {
        return Err(CombineError::InvalidInput("Sample A is empty".to_string()));
    }
    let n_b = count_sample_b(records);
    if n_b == 0 {
        return Err(CombineError::InvalidInput("Sample B is empty".to_string()));
    }
    if a_idx.len() as f64 != config.size_a || n_b as f64 != config.size_b {
        warn!(
            "declared sample sizes (A = {}, B = {}) differ from the records (A = {}, B = {})",
            config.size_a,
            config.size_b,
            a_idx.len(),
            n_b
        );
    }

    for name in &config.aux_names {
        let absent = a_idx.iter().filter(|&&i| records[i].aux(name).is_none()).count();
        if absent > 0 {
            warn!("auxiliary '{}' is missing on {} sample A units; they contribute 0", name, absent);
        }
    }

    let d = initial_weights(records, &a_idx, config.weights_a_name.as_deref(), config.size_a)?;

    let population_size = match config.population_size {
        Some(n) => n,
        None => {
            debug!("population size defaults to the record count {}", records.len());
            records.len() as f64
        }
    };

    // Outcome used for the B total and for the A estimate, one entry per record
    let (b_outcome, a_outcome): (Vec<Option<f64>>, Vec<Option<f64>>) = match config.correction_mode {
        CorrectionMode::None | CorrectionMode::CorrectB => (
            records.iter().map(|r| r.outcome_b).collect(),
            records.iter().map(|r| r.outcome_a).collect(),
        ),
        CorrectionMode::CorrectA => {
            let (corrected, _model) = fit_and_correct(records)?;
            (corrected.clone(), corrected)
        }
    };

    let totals = compute_totals_with_outcome(records, &b_outcome, &constraints)?
        .with_population_size(population_size);

    let calibration = calibrate_sample(records, &a_idx, &d, &constraints, &b_outcome, &totals)?;

    let y: Vec<Option<f64>> = a_idx.iter().map(|&i| a_outcome[i]).collect();
    let mean = point_estimate_mean(&y, calibration.weights.view())?;

    let x_matrix = constraints.design_matrix(records, &a_idx, &b_outcome)?;
    let scores = scores_calibrated_mean(
        &y,
        ArrayView1::from(d.as_slice()),
        calibration.weights.view(),
        x_matrix.view(),
    )?;
    let variance = taylor_variance(scores.view(), srs_fpc(config.size_a, population_size));

    debug!(
        "combined estimate ({:?}): mean = {}, variance = {}",
        config.correction_mode, mean, variance
    );

    Ok(EstimateResult { mean, variance })
}

/// Read `df` through the column names in `config`, then estimate.
pub fn estimate_frame(df: &DataFrame, config: &EstimatorConfig) -> Result<EstimateResult> {
    let records = records_from_frame(df, config)?;
    estimate_records(&records, config)
}

/// Independent estimates for several record sets, computed in parallel.
///
/// Results keep the input order; one failing set does not affect the others.
pub fn estimate_batch(datasets: &[Vec<Record>], config: &EstimatorConfig) -> Vec<Result<EstimateResult>> {
    datasets
        .par_iter()
        .map(|records| estimate(records, config))
        .collect()
}
