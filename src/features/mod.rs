// src/features/mod.rs

pub mod align;
pub mod dates;
pub mod preprocess;

pub use align::{align, align_matrix};
pub use preprocess::{preprocess, preprocess_frame};

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Feature names the deployed models were fitted against, in column order.
pub const FEATURES: &[&str] = &[
    "Rent",
    "Food",
    "Transport",
    "Utilities",
    "Misc",
    "pop_density",
    "employment_rate",
    "median_income",
    "household_size",
    "dist_to_cbd_km",
    "neighbors",
    "year",
    "month",
    "quarter",
    // One-hot from Subcounty_clean
    "Subcounty_clean_embakasi",
    "Subcounty_clean_kasarani",
    "Subcounty_clean_langata",
    "Subcounty_clean_makadara",
    "Subcounty_clean_westlands",
];

/// Raw request fields, before the subcounty is one-hot encoded.
pub const RAW_FEATURES: &[&str] = &[
    "Rent",
    "Food",
    "Transport",
    "Utilities",
    "Misc",
    "pop_density",
    "employment_rate",
    "median_income",
    "household_size",
    "dist_to_cbd_km",
    "neighbors",
    "year",
    "month",
    "quarter",
    SUBCOUNTY_FIELD,
];

pub const SUBCOUNTY_FIELD: &str = "Subcounty_clean";

pub const VALID_SUBCOUNTIES: &[&str] =
    &["embakasi", "kasarani", "langata", "makadara", "westlands"];

/// Column name of the one-hot indicator for `subcounty`.
pub fn subcounty_column(subcounty: &str) -> String {
    format!("{}_{}", SUBCOUNTY_FIELD, subcounty)
}

/// One raw input value, as loosely typed as the caller sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Missing,
}

impl FeatureValue {
    /// Numeric view; only integers and floats qualify.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&Value> for FeatureValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => FeatureValue::Missing,
            Value::Bool(b) => FeatureValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FeatureValue::Int(i),
                None => FeatureValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FeatureValue::Text(s.clone()),
            // nested payloads are text as far as the models are concerned
            other => FeatureValue::Text(other.to_string()),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Int(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Text(v.to_string())
    }
}

/// Ordered mapping of feature name → raw value. Insertion order is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing in place if already present, appending otherwise.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<FeatureValue> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Build from a JSON object, keeping the document's key order.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        map.iter()
            .map(|(k, v)| (k.clone(), FeatureValue::from(v)))
            .collect()
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        let mut row = FeatureRow::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

/// A row reduced to numbers, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericRow {
    pub columns: Vec<String>,
    pub values: Vec<f64>,
}

impl NumericRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| self.values[idx])
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub(crate) fn push(&mut self, name: String, value: f64) {
        self.columns.push(name);
        self.values.push(value);
    }
}

/// Dense row-major matrix handed to a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    /// Stack numeric rows under the union of their columns (first-seen order).
    /// A row lacking a column gets 0 there.
    pub fn from_rows(rows: &[NumericRow]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for row in rows {
            for col in &row.columns {
                if !index.contains_key(col.as_str()) {
                    index.insert(col.as_str(), columns.len());
                    columns.push(col.clone());
                }
            }
        }

        let data = rows
            .iter()
            .map(|row| {
                let mut out = vec![0.0; columns.len()];
                for (col, v) in row.columns.iter().zip(&row.values) {
                    out[index[col.as_str()]] = *v;
                }
                out
            })
            .collect();

        Self {
            columns,
            rows: data,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }
}
