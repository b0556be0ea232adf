// src/reference/mod.rs

//! Per-subcounty, per-year reference values used by the map view.
//!
//! The document shape is `subcounty → year → feature → value`, kept in the
//! key order it was read in.

pub mod generate;
pub mod lookup;

pub use generate::{generate, generate_file, generate_parallel, Generated, ReferenceGenerator};
pub use lookup::{map_prediction, normalize_subcounty, MapPrediction};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

/// Feature values for one subcounty in one year.
pub type YearRecord = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceTable(pub Map<String, Value>);

impl ReferenceTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading reference {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("parsing reference {:?}", path))
    }

    /// Write as two-space indented JSON, via a temp file renamed into place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {:?}", parent))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp_path)
                .with_context(|| format!("could not create `{}`", tmp_path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &self.0)
                .context("serializing reference table")?;
            writer.flush().context("flushing reference table")?;
        }
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                tmp_path.display(),
                path.display()
            )
        })
    }

    pub fn subcounties(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Year → record mapping for `subcounty`, if it is an object.
    pub fn years(&self, subcounty: &str) -> Option<&Map<String, Value>> {
        self.0.get(subcounty).and_then(Value::as_object)
    }

    pub fn record(&self, subcounty: &str, year: &str) -> Option<&YearRecord> {
        self.years(subcounty)?.get(year).and_then(Value::as_object)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.0).context("serializing reference table")
    }
}

/// Year keys in chronological order: numerically when every key is an
/// integer, lexicographically otherwise.
pub fn sorted_years<'a, I>(keys: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut years: Vec<&str> = keys.into_iter().map(String::as_str).collect();
    let numeric: Option<Vec<i64>> = years.iter().map(|y| y.trim().parse().ok()).collect();
    match numeric {
        Some(_) => years.sort_by_key(|y| y.trim().parse::<i64>().unwrap_or_default()),
        None => years.sort_unstable(),
    }
    years
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn years_sort_numerically_when_possible() {
        let keys: Vec<String> = ["2021", "999", "2020"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sorted_years(&keys), vec!["999", "2020", "2021"]);

        let mixed: Vec<String> = ["b", "2020", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sorted_years(&mixed), vec!["2020", "a", "b"]);
    }

    #[test]
    fn save_and_load_keep_key_order() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested/ref.json");
        let table: ReferenceTable = serde_json::from_value(json!({
            "westlands": {"2020": {"Rent": 1.5, "Food": 2}},
            "embakasi": {"2020": {"Food": 3, "Rent": 4}}
        }))?;
        table.save(&path)?;
        let back = ReferenceTable::load(&path)?;
        assert_eq!(back, table);
        assert_eq!(back.subcounties().collect::<Vec<_>>(), vec!["westlands", "embakasi"]);
        let rec = back.record("embakasi", "2020").unwrap();
        assert_eq!(rec.keys().collect::<Vec<_>>(), vec!["Food", "Rent"]);
        assert!(!dir.path().join("nested/ref.json.tmp").exists());
        Ok(())
    }
}
