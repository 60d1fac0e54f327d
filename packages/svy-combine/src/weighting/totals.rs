// src/weighting/totals.rs

use log::debug;
use ndarray::Array1;

use super::constraints::{Constraint, ConstraintSet};
use crate::records::Record;
use crate::utils::{CombineError, Result};

/// Calibration targets, one per constraint, in `ConstraintSet` order
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationTotals {
    names: Vec<String>,
    values: Array1<f64>,
}

impl PopulationTotals {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names.iter().position(|n| n == name).map(|j| self.values[j])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Replace the intercept target by a known population size.
    pub fn with_population_size(mut self, n: f64) -> Self {
        if let Some(j) = self.names.iter().position(|name| name == Constraint::Intercept.name()) {
            self.values[j] = n;
        }
        self
    }
}

/// Totals derived from sample B using each record's own B outcome.
pub fn compute_totals(records: &[Record], aux_names: &[String]) -> Result<PopulationTotals> {
    let constraints = ConstraintSet::new(aux_names)?;
    let b_outcome: Vec<Option<f64>> = records.iter().map(|r| r.outcome_b).collect();
    compute_totals_with_outcome(records, &b_outcome, &constraints)
}

/// Totals derived from sample B with an explicit B-side outcome per record.
///
/// The intercept target is the number of records (the population count);
/// every other target sums the constraint over `in_b` records only. Missing
/// values add nothing.
pub fn compute_totals_with_outcome(
    records: &[Record],
    b_outcome: &[Option<f64>],
    constraints: &ConstraintSet,
) -> Result<PopulationTotals> {
    if b_outcome.len() != records.len() {
        return Err(CombineError::DimensionMismatch {
            expected: records.len(),
            got: b_outcome.len(),
        });
    }

    let mut values = Array1::zeros(constraints.len());
    for (j, constraint) in constraints.iter().enumerate() {
        values[j] = match constraint {
            Constraint::Intercept => records.len() as f64,
            _ => records
                .iter()
                .zip(b_outcome.iter())
                .filter(|(r, _)| r.in_b)
                .map(|(r, &y)| constraint.contribution(r, y))
                .sum(),
        };
    }

    let names: Vec<String> = constraints.names().into_iter().map(String::from).collect();
    debug!("population totals {:?} = {}", names, values);

    Ok(PopulationTotals { names, values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn population() -> Vec<Record> {
        vec![
            Record::new(true, false).with_outcome_a(1.0).with_aux("x", 100.0),
            Record::new(true, true).with_outcome_a(2.0).with_outcome_b(2.5).with_aux("x", 1.0),
            Record::new(false, true).with_outcome_b(3.0).with_aux("x", 2.0),
            Record::new(false, true).with_aux("x", 4.0),
            Record::new(false, false).with_aux("x", 50.0),
        ]
    }

    #[test]
    fn test_compute_totals() {
        let totals = compute_totals(&population(), &["x".to_string()]).unwrap();

        assert_eq!(totals.names(), &["intercept", "b_membership", "b_outcome", "x"]);
        assert_relative_eq!(totals.get("intercept").unwrap(), 5.0);
        assert_relative_eq!(totals.get("b_membership").unwrap(), 3.0);
        // Missing outcome on the last B unit is skipped
        assert_relative_eq!(totals.get("b_outcome").unwrap(), 5.5);
        // Auxiliaries outside B are not counted
        assert_relative_eq!(totals.get("x").unwrap(), 7.0);
    }

    #[test]
    fn test_totals_with_population_size() {
        let totals = compute_totals(&population(), &[])
            .unwrap()
            .with_population_size(1000.0);

        assert_eq!(totals.len(), 3);
        assert_relative_eq!(totals.get("intercept").unwrap(), 1000.0);
        assert!(totals.get("x").is_none());
    }

    #[test]
    fn test_totals_with_replaced_outcome() {
        let records = population();
        let constraints = ConstraintSet::new(&[]).unwrap();
        let corrected = vec![Some(1.0), Some(10.0), Some(3.0), None, None];
        let totals = compute_totals_with_outcome(&records, &corrected, &constraints).unwrap();

        assert_relative_eq!(totals.get("b_outcome").unwrap(), 13.0);
    }
}
