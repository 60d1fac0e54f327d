// src/config.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::{CombineError, Result};

/// Which sample's outcome is treated as error-prone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// No measurement error model
    #[default]
    None,
    /// Errors in B; absorbed by the calibration totals, no extra transform
    CorrectB,
    /// Errors in A; A's outcome is corrected with a model fit on validation units
    CorrectA,
}

impl FromStr for CorrectionMode {
    type Err = CombineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(CorrectionMode::None),
            "b" | "correct_b" | "correctb" => Ok(CorrectionMode::CorrectB),
            "a" | "correct_a" | "correcta" => Ok(CorrectionMode::CorrectA),
            other => Err(CombineError::InvalidInput(format!(
                "Unknown correction mode '{}'",
                other
            ))),
        }
    }
}

fn default_membership_a() -> String {
    "in_a".to_string()
}

fn default_membership_b() -> String {
    "in_b".to_string()
}

/// Arguments of one estimation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub outcome_a_name: String,
    pub outcome_b_name: String,
    #[serde(default = "default_membership_a")]
    pub membership_a_name: String,
    #[serde(default = "default_membership_b")]
    pub membership_b_name: String,
    pub size_a: f64,
    pub size_b: f64,
    #[serde(default)]
    pub population_size: Option<f64>,
    #[serde(default)]
    pub correction_mode: CorrectionMode,
    #[serde(default)]
    pub aux_names: Vec<String>,
    #[serde(default)]
    pub weights_a_name: Option<String>,
}

impl EstimatorConfig {
    pub fn new(
        outcome_a_name: impl Into<String>,
        outcome_b_name: impl Into<String>,
        size_a: f64,
        size_b: f64,
    ) -> Self {
        Self {
            outcome_a_name: outcome_a_name.into(),
            outcome_b_name: outcome_b_name.into(),
            membership_a_name: default_membership_a(),
            membership_b_name: default_membership_b(),
            size_a,
            size_b,
            population_size: None,
            correction_mode: CorrectionMode::None,
            aux_names: Vec::new(),
            weights_a_name: None,
        }
    }

    pub fn with_population_size(mut self, n: f64) -> Self {
        self.population_size = Some(n);
        self
    }

    pub fn with_correction(mut self, mode: CorrectionMode) -> Self {
        self.correction_mode = mode;
        self
    }

    pub fn with_aux<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aux_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_weights(mut self, name: impl Into<String>) -> Self {
        self.weights_a_name = Some(name.into());
        self
    }

    pub fn with_membership(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.membership_a_name = a.into();
        self.membership_b_name = b.into();
        self
    }

    /// Checks that need no data.
    pub fn validate(&self) -> Result<()> {
        if !(self.size_a > 0.0 && self.size_a.is_finite()) {
            return Err(CombineError::InvalidInput(format!(
                "size_a must be positive, got {}",
                self.size_a
            )));
        }
        if !(self.size_b > 0.0 && self.size_b.is_finite()) {
            return Err(CombineError::InvalidInput(format!(
                "size_b must be positive, got {}",
                self.size_b
            )));
        }
        if let Some(n) = self.population_size {
            if !(n > 0.0 && n.is_finite()) {
                return Err(CombineError::InvalidInput(format!(
                    "population_size must be positive, got {}",
                    n
                )));
            }
        }
        Ok(())
    }
}
