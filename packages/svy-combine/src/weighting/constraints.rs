// src/weighting/constraints.rs

use ndarray::Array2;

use crate::records::Record;
use crate::utils::{CombineError, Result};

pub const INTERCEPT: &str = "intercept";
pub const B_MEMBERSHIP: &str = "b_membership";
pub const B_OUTCOME: &str = "b_outcome";

/// One calibration constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// 1 for every unit
    Intercept,
    /// 1 inside sample B, 0 outside
    BMembership,
    /// B-side outcome inside sample B, 0 outside
    BOutcome,
    /// Raw auxiliary value
    Auxiliary(String),
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::Intercept => INTERCEPT,
            Constraint::BMembership => B_MEMBERSHIP,
            Constraint::BOutcome => B_OUTCOME,
            Constraint::Auxiliary(name) => name.as_str(),
        }
    }

    /// Contribution of `record` given its B-side outcome value.
    ///
    /// Missing values contribute zero.
    pub fn contribution(&self, record: &Record, b_outcome: Option<f64>) -> f64 {
        match self {
            Constraint::Intercept => 1.0,
            Constraint::BMembership => {
                if record.in_b { 1.0 } else { 0.0 }
            }
            Constraint::BOutcome => {
                if record.in_b { b_outcome.unwrap_or(0.0) } else { 0.0 }
            }
            Constraint::Auxiliary(name) => record.aux(name).unwrap_or(0.0),
        }
    }
}

/// Ordered constraint list: the three builtins followed by one entry per auxiliary.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(aux_names: &[String]) -> Result<Self> {
        let mut constraints = vec![
            Constraint::Intercept,
            Constraint::BMembership,
            Constraint::BOutcome,
        ];

        for name in aux_names {
            if [INTERCEPT, B_MEMBERSHIP, B_OUTCOME].contains(&name.as_str()) {
                return Err(CombineError::InvalidInput(format!(
                    "Auxiliary name '{}' is reserved for a builtin constraint",
                    name
                )));
            }
            constraints.push(Constraint::Auxiliary(name.clone()));
        }

        Ok(Self { constraints })
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.constraints.iter().map(Constraint::name).collect()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.constraints.iter().position(|c| c.name() == name)
    }

    /// Constraint matrix (rows = `idx`, cols = constraints).
    ///
    /// `b_outcome` is indexed by record position, not by row.
    pub fn design_matrix(
        &self,
        records: &[Record],
        idx: &[usize],
        b_outcome: &[Option<f64>],
    ) -> Result<Array2<f64>> {
        if b_outcome.len() != records.len() {
            return Err(CombineError::DimensionMismatch {
                expected: records.len(),
                got: b_outcome.len(),
            });
        }

        let mut x_matrix = Array2::zeros((idx.len(), self.len()));
        for (row, &i) in idx.iter().enumerate() {
            for (col, constraint) in self.constraints.iter().enumerate() {
                x_matrix[[row, col]] = constraint.contribution(&records[i], b_outcome[i]);
            }
        }

        Ok(x_matrix)
    }
}
