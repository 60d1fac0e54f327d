// src/records.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utils::{CombineError, Result};

/// One population unit as delivered by the tabular data provider.
///
/// `design_weight` only carries meaning when `in_a` is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub in_a: bool,
    pub in_b: bool,
    pub outcome_a: Option<f64>,
    pub outcome_b: Option<f64>,
    #[serde(default)]
    pub auxiliaries: BTreeMap<String, f64>,
    pub design_weight: Option<f64>,
}

impl Record {
    pub fn new(in_a: bool, in_b: bool) -> Self {
        Self {
            in_a,
            in_b,
            ..Self::default()
        }
    }

    pub fn with_outcome_a(mut self, y: f64) -> Self {
        self.outcome_a = Some(y);
        self
    }

    pub fn with_outcome_b(mut self, y: f64) -> Self {
        self.outcome_b = Some(y);
        self
    }

    pub fn with_aux(mut self, name: impl Into<String>, value: f64) -> Self {
        self.auxiliaries.insert(name.into(), value);
        self
    }

    pub fn with_design_weight(mut self, w: f64) -> Self {
        self.design_weight = Some(w);
        self
    }

    /// Unit observed in both samples
    pub fn is_validation(&self) -> bool {
        self.in_a && self.in_b
    }

    pub fn aux(&self, name: &str) -> Option<f64> {
        self.auxiliaries.get(name).copied()
    }
}

/// Positions of the sample A units, in record order.
pub fn sample_a_indices(records: &[Record]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter_map(|(i, r)| if r.in_a { Some(i) } else { None })
        .collect()
}

pub fn count_sample_b(records: &[Record]) -> usize {
    records.iter().filter(|r| r.in_b).count()
}

/// Names from `names` that no record carries a value for.
pub fn missing_auxiliaries(records: &[Record], names: &[String]) -> Vec<String> {
    names
        .iter()
        .filter(|name| !records.iter().any(|r| r.auxiliaries.contains_key(name.as_str())))
        .cloned()
        .collect()
}

/// Initial weights for the units at `a_idx`.
///
/// With a weight column every A unit must carry a positive design weight;
/// otherwise each unit gets `1 / size_a`.
pub fn initial_weights(
    records: &[Record],
    a_idx: &[usize],
    weights_name: Option<&str>,
    size_a: f64,
) -> Result<Vec<f64>> {
    let Some(name) = weights_name else {
        return Ok(vec![1.0 / size_a; a_idx.len()]);
    };

    if a_idx.iter().all(|&i| records[i].design_weight.is_none()) {
        return Err(CombineError::MissingColumn(vec![name.to_string()]));
    }

    a_idx
        .iter()
        .map(|&i| match records[i].design_weight {
            Some(w) if w > 0.0 && w.is_finite() => Ok(w),
            Some(w) => Err(CombineError::InvalidInput(format!(
                "Design weight of unit {} must be positive, got {}",
                i, w
            ))),
            None => Err(CombineError::InvalidInput(format!(
                "Unit {} is in sample A but has no value in weight column '{}'",
                i, name
            ))),
        })
        .collect()
}
