use tracing::{debug, trace};

use super::dates::{parse_datetime, year_month};
use super::{FeatureMatrix, FeatureRow, FeatureValue, NumericRow};
use crate::error::InferenceError;

/// Reduce a loosely typed row to the numeric features a model can use.
///
/// - dates and timestamps become `<field>_year` / `<field>_month`
/// - text that parses as a date is decomposed the same way
/// - any other text, booleans and missing values are dropped
/// - integers and floats are kept in their original order
///
/// Derived columns come after the surviving originals. A derived name that
/// collides with an existing numeric column overwrites it in place.
pub fn preprocess(row: &FeatureRow) -> NumericRow {
    let mut out = NumericRow::default();
    let mut derived: Vec<(String, f64)> = Vec::new();

    for (name, value) in row.iter() {
        match value {
            FeatureValue::Int(_) | FeatureValue::Float(_) => {
                if let Some(v) = value.as_number() {
                    out.push(name.to_string(), v);
                }
            }
            FeatureValue::Date(d) => {
                if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                    push_year_month(&mut derived, name, year_month(&dt));
                }
            }
            FeatureValue::DateTime(dt) => push_year_month(&mut derived, name, year_month(dt)),
            FeatureValue::Text(s) => match parse_datetime(s) {
                Some(dt) => {
                    trace!(field = name, "decomposing date-like text");
                    push_year_month(&mut derived, name, year_month(&dt));
                }
                None => debug!(field = name, "dropping text field"),
            },
            FeatureValue::Bool(_) | FeatureValue::Missing => {
                debug!(field = name, "dropping non-numeric field")
            }
        }
    }

    for (name, v) in derived {
        match out.columns.iter().position(|c| *c == name) {
            Some(idx) => out.values[idx] = v,
            None => out.push(name, v),
        }
    }
    out
}

fn push_year_month(derived: &mut Vec<(String, f64)>, field: &str, (year, month): (i32, u32)) {
    derived.push((format!("{}_year", field), year as f64));
    derived.push((format!("{}_month", field), month as f64));
}

/// Preprocess every row and stack the results.
///
/// Fails with [`InferenceError::EmptyFeatureSet`] when no rows were given or
/// no numeric column survived.
pub fn preprocess_frame(rows: &[FeatureRow]) -> Result<FeatureMatrix, InferenceError> {
    let numeric: Vec<NumericRow> = rows.iter().map(preprocess).collect();
    let matrix = FeatureMatrix::from_rows(&numeric);
    if matrix.is_empty() {
        return Err(InferenceError::EmptyFeatureSet);
    }
    Ok(matrix)
}
