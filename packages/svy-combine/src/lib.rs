// src/lib.rs

//! Combined estimation of a population mean from a probability sample (A)
//! and a non-probability sample (B).
//!
//! Sample A is calibrated so its weighted totals of the intercept, the
//! B-membership indicator, the B outcome and any auxiliary variables match
//! the totals implied by sample B. An optional linear measurement error
//! model, fit on units observed in both samples, corrects A's outcome first.

pub mod config;
pub mod estimation;
pub mod frame;
pub mod records;
pub mod utils;
pub mod weighting;

pub use config::{CorrectionMode, EstimatorConfig};
pub use estimation::{estimate, estimate_batch, estimate_frame, CorrectionModel, EstimateResult};
pub use records::Record;
pub use utils::{CombineError, Result};
pub use weighting::{calibrate_linear, compute_totals, CalibrationOutput, ConstraintSet, PopulationTotals};
