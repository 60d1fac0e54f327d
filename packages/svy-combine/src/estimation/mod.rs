// src/estimation/mod.rs
pub mod taylor;
pub mod correction;
pub mod combined;

pub use taylor::{point_estimate_mean, scores_calibrated_mean, srs_fpc, taylor_variance};
pub use correction::{fit_and_correct, CorrectionModel};
pub use combined::{estimate, estimate_batch, estimate_frame, EstimateResult};
