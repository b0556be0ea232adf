// src/input.rs

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::features::{subcounty_column, FeatureRow, FeatureValue, VALID_SUBCOUNTIES};

/// A prediction request as submitted by a form or API client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    #[serde(rename = "Rent")]
    pub rent: f64,
    #[serde(rename = "Food")]
    pub food: f64,
    #[serde(rename = "Transport")]
    pub transport: f64,
    #[serde(rename = "Utilities")]
    pub utilities: f64,
    #[serde(rename = "Misc")]
    pub misc: f64,
    pub pop_density: f64,
    pub employment_rate: f64,
    pub median_income: f64,
    pub household_size: f64,
    pub dist_to_cbd_km: f64,
    pub neighbors: i64,
    pub year: i64,
    pub month: i64,
    pub quarter: i64,
    #[serde(rename = "Subcounty_clean")]
    pub subcounty: String,
}

/// Trim + lowercase, then check against the supported subcounties.
pub fn validate_subcounty(raw: &str) -> Result<String, InputError> {
    let subcounty = raw.trim().to_lowercase();
    if VALID_SUBCOUNTIES.contains(&subcounty.as_str()) {
        Ok(subcounty)
    } else {
        Err(InputError::InvalidSubcounty {
            given: raw.to_string(),
            valid: VALID_SUBCOUNTIES,
        })
    }
}

/// Append `Subcounty_clean_<name>` indicators for every valid subcounty.
pub fn push_subcounty_one_hot(row: &mut FeatureRow, subcounty: &str) {
    for name in VALID_SUBCOUNTIES {
        let hot = i64::from(*name == subcounty);
        row.insert(subcounty_column(name), FeatureValue::Int(hot));
    }
}

impl ModelInput {
    /// Validate and expand into a model-ready row: the raw numeric fields in
    /// request order followed by the subcounty one-hot columns.
    pub fn to_feature_row(&self) -> Result<FeatureRow, InputError> {
        let subcounty = validate_subcounty(&self.subcounty)?;

        let floats: [(&'static str, f64); 10] = [
            ("Rent", self.rent),
            ("Food", self.food),
            ("Transport", self.transport),
            ("Utilities", self.utilities),
            ("Misc", self.misc),
            ("pop_density", self.pop_density),
            ("employment_rate", self.employment_rate),
            ("median_income", self.median_income),
            ("household_size", self.household_size),
            ("dist_to_cbd_km", self.dist_to_cbd_km),
        ];

        let mut row = FeatureRow::new();
        for (name, v) in floats {
            if !v.is_finite() {
                return Err(InputError::NonFinite(name));
            }
            row.insert(name, FeatureValue::Float(v));
        }
        row.insert("neighbors", FeatureValue::Int(self.neighbors));
        row.insert("year", FeatureValue::Int(self.year));
        row.insert("month", FeatureValue::Int(self.month));
        row.insert("quarter", FeatureValue::Int(self.quarter));
        push_subcounty_one_hot(&mut row, &subcounty);
        Ok(row)
    }
}
