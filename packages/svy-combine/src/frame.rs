// src/frame.rs

use std::collections::BTreeMap;

use polars::prelude::*;

use crate::config::EstimatorConfig;
use crate::records::Record;
use crate::utils::{CombineError, Result};

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Membership flags; numeric columns count non-zero as members, nulls as non-members
fn membership_column(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Boolean)?;
    Ok(series.bool()?.into_iter().map(|v| v.unwrap_or(false)).collect())
}

/// Every column `config` refers to that `df` lacks, in config order.
pub fn missing_columns(df: &DataFrame, config: &EstimatorConfig) -> Vec<String> {
    let mut required: Vec<&str> = vec![
        config.membership_a_name.as_str(),
        config.membership_b_name.as_str(),
        config.outcome_a_name.as_str(),
        config.outcome_b_name.as_str(),
    ];
    if let Some(w) = &config.weights_a_name {
        required.push(w.as_str());
    }
    required.extend(config.aux_names.iter().map(String::as_str));

    let mut missing: Vec<String> = Vec::new();
    for name in required {
        if df.get_column_index(name).is_none() && !missing.iter().any(|m| m == name) {
            missing.push(name.to_string());
        }
    }
    missing
}

/// Convert a data frame into records, checking all referenced columns up front.
pub fn records_from_frame(df: &DataFrame, config: &EstimatorConfig) -> Result<Vec<Record>> {
    let missing = missing_columns(df, config);
    if !missing.is_empty() {
        return Err(CombineError::MissingColumn(missing));
    }

    let in_a = membership_column(df, &config.membership_a_name)?;
    let in_b = membership_column(df, &config.membership_b_name)?;
    let outcome_a = float_column(df, &config.outcome_a_name)?;
    let outcome_b = float_column(df, &config.outcome_b_name)?;
    let weights = match &config.weights_a_name {
        Some(name) => Some(float_column(df, name)?),
        None => None,
    };
    let aux_columns: Vec<(&String, Vec<Option<f64>>)> = config
        .aux_names
        .iter()
        .map(|name| float_column(df, name).map(|values| (name, values)))
        .collect::<Result<_>>()?;

    let records = (0..df.height())
        .map(|i| {
            let mut auxiliaries = BTreeMap::new();
            for (name, values) in &aux_columns {
                if let Some(v) = values[i] {
                    auxiliaries.insert((*name).clone(), v);
                }
            }
            Record {
                in_a: in_a[i],
                in_b: in_b[i],
                outcome_a: outcome_a[i],
                outcome_b: outcome_b[i],
                auxiliaries,
                design_weight: if in_a[i] {
                    weights.as_ref().and_then(|w| w[i])
                } else {
                    None
                },
            }
        })
        .collect();

    Ok(records)
}
