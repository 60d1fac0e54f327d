// src/weighting/mod.rs

pub mod constraints;
pub mod totals;
pub mod calibration;

// Re-export main implementations for easier access
pub use constraints::{Constraint, ConstraintSet};
pub use totals::{compute_totals, compute_totals_with_outcome, PopulationTotals};
pub use calibration::{calibrate_linear, calibrate_sample, CalibrationOutput};
