// src/reference/lookup.rs

//! Scoring a subcounty straight from the reference table.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ReferenceTable, YearRecord};
use crate::error::{InferenceError, LookupError};
use crate::features::{
    FeatureRow, FeatureValue, RAW_FEATURES, SUBCOUNTY_FIELD, VALID_SUBCOUNTIES,
};
use crate::inference::score;
use crate::input::push_subcounty_one_hot;
use crate::model::ModelRegistry;
use crate::risk::{bucket, RiskCategory};

/// Administrative divisions folded into their parent subcounty.
const SUBCOUNTY_PARENT: &[(&str, &str)] = &[
    ("embakasi north", "embakasi"),
    ("embakasi south", "embakasi"),
    ("embakasi east", "embakasi"),
    ("embakasi west", "embakasi"),
    ("embakasi central", "embakasi"),
];

/// Trim, lowercase and fold divisions into their parent. Unknown names come
/// back lowercased for the caller to reject.
pub fn normalize_subcounty(name: &str) -> String {
    let n = name.trim().to_lowercase();
    if n.starts_with("embakasi") {
        return "embakasi".to_string();
    }
    if VALID_SUBCOUNTIES.contains(&n.as_str()) {
        return n;
    }
    SUBCOUNTY_PARENT
        .iter()
        .find(|(division, _)| *division == n)
        .map(|(_, parent)| parent.to_string())
        .unwrap_or(n)
}

/// The requested year if present, otherwise the latest one. Only integer
/// year keys count.
pub fn select_year(
    table: &ReferenceTable,
    subcounty: &str,
    year: Option<i32>,
) -> Result<i32, LookupError> {
    let years = table
        .years(subcounty)
        .ok_or_else(|| LookupError::NoReferenceData(subcounty.to_string()))?;
    let available: Vec<i32> = years.keys().filter_map(|k| k.trim().parse().ok()).collect();

    match year {
        None => available
            .iter()
            .copied()
            .max()
            .ok_or_else(|| LookupError::NoYearlyData(subcounty.to_string())),
        Some(y) if available.contains(&y) => Ok(y),
        Some(y) if available.is_empty() => {
            debug!(subcounty, year = y, "no integer year keys");
            Err(LookupError::NoYearlyData(subcounty.to_string()))
        }
        Some(y) => Err(LookupError::YearUnavailable {
            year: y,
            subcounty: subcounty.to_string(),
        }),
    }
}

fn year_record<'a>(
    table: &'a ReferenceTable,
    subcounty: &str,
    year: i32,
) -> Option<&'a YearRecord> {
    let years = table.years(subcounty)?;
    years
        .iter()
        .find(|(k, _)| k.trim().parse::<i32>().ok() == Some(year))
        .and_then(|(_, v)| v.as_object())
}

/// The raw request fields read off a reference record, absent fields as 0.
pub fn raw_features(record: &YearRecord, subcounty: &str) -> Map<String, Value> {
    RAW_FEATURES
        .iter()
        .map(|feat| {
            let v = if *feat == SUBCOUNTY_FIELD {
                Value::String(subcounty.to_string())
            } else {
                record.get(*feat).cloned().unwrap_or_else(|| Value::from(0))
            };
            (feat.to_string(), v)
        })
        .collect()
}

/// Model-ready row: raw fields in order, subcounty expanded to one-hot.
pub fn reference_row(raw: &Map<String, Value>, subcounty: &str) -> FeatureRow {
    let mut row = FeatureRow::new();
    for (name, value) in raw {
        if name == SUBCOUNTY_FIELD {
            continue;
        }
        row.insert(name.clone(), FeatureValue::from(value));
    }
    push_subcounty_one_hot(&mut row, subcounty);
    row
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPrediction {
    pub subcounty: String,
    pub year: i32,
    pub model: String,
    pub score: f64,
    pub risk_category: RiskCategory,
    pub features_used: Map<String, Value>,
}

/// Score `subcounty` for `year` (latest when `None`) with the model under
/// `model_key` (`rf`, `xgb`, `mlp` or a display name). The reported `model`
/// is the key lowercased.
pub fn map_prediction(
    registry: &ModelRegistry,
    table: &ReferenceTable,
    subcounty: &str,
    model_key: &str,
    year: Option<i32>,
) -> Result<MapPrediction> {
    let model = registry
        .get(model_key.trim())
        .ok_or_else(|| InferenceError::UnknownModel(model_key.trim().to_string()))?;
    let model_key = model_key.trim().to_lowercase();

    let sub = normalize_subcounty(subcounty);
    if !VALID_SUBCOUNTIES.contains(&sub.as_str()) {
        return Err(LookupError::UnsupportedSubcounty(subcounty.to_string()).into());
    }

    let chosen = select_year(table, &sub, year)?;
    let record = year_record(table, &sub, chosen)
        .ok_or_else(|| LookupError::NoYearlyData(sub.clone()))?;

    let features_used = raw_features(record, &sub);
    let row = reference_row(&features_used, &sub);
    let s = score(model.as_ref(), &row)?;
    debug!(subcounty = %sub, year = chosen, model = %model_key, score = s, "map prediction");

    Ok(MapPrediction {
        subcounty: sub,
        year: chosen,
        model: model_key,
        score: s,
        risk_category: bucket(s),
        features_used,
    })
}
