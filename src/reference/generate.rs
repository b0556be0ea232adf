//! Synthetic reference data: compounding yearly drift on economic fields,
//! static fields untouched.
//!
//! Every random draw comes from an explicit seeded generator, so a given seed
//! and input always produce the same document. Draw order follows document
//! order: subcounties as read, years ascending, fields as read.

use anyhow::Result;
use once_cell::sync::Lazy;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde_json::{Map, Number, Value};
use std::{collections::BTreeMap, collections::HashSet, path::Path};
use tracing::{debug, info};

use super::{sorted_years, ReferenceTable};

/// Max relative movement per year.
pub const YEAR_VARIATION: f64 = 0.08;
/// Max relative cross-area divergence per year of distance from the base year.
pub const AREA_VARIATION: f64 = 0.15;
/// Range of the per-subcounty multiplier on economic fields.
pub const OFFSET_RANGE: (f64, f64) = (0.85, 1.25);
pub const DEFAULT_SEED: u64 = 42;

/// Fields that should vary significantly across years.
pub const ECON_FIELDS: &[&str] = &["Rent", "Food", "Transport", "Utilities", "Misc"];

/// Fields never altered across years.
pub const STATIC_FIELDS: &[&str] = &[
    "pop_density",
    "employment_rate",
    "median_income",
    "household_size",
    "dist_to_cbd_km",
    "neighbors",
    "Subcounty_clean_embakasi",
    "Subcounty_clean_kasarani",
    "Subcounty_clean_langata",
    "Subcounty_clean_makadara",
    "Subcounty_clean_westlands",
];

static ECON: Lazy<HashSet<&'static str>> = Lazy::new(|| ECON_FIELDS.iter().copied().collect());
static STATIC: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STATIC_FIELDS.iter().copied().collect());

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// `round(value * drift * area, 3)` with two fresh draws:
/// `drift = 1 + U(-0.08, 0.08)` then `area = 1 + year_index * U(-0.15, 0.15)`.
pub fn vary<R: Rng + ?Sized>(rng: &mut R, value: f64, year_index: usize) -> f64 {
    let drift_factor = 1.0 + rng.gen_range(-YEAR_VARIATION..=YEAR_VARIATION);
    let area_factor = 1.0 + year_index as f64 * rng.gen_range(-AREA_VARIATION..=AREA_VARIATION);
    round3(value * drift_factor * area_factor)
}

/// Multiplicative band `vary` can land in for `year_index`, before rounding.
pub fn drift_bounds(year_index: usize) -> (f64, f64) {
    let i = year_index as f64;
    (
        (1.0 - YEAR_VARIATION) * (1.0 - AREA_VARIATION * i),
        (1.0 + YEAR_VARIATION) * (1.0 + AREA_VARIATION * i),
    )
}

fn number(v: f64, original: &Value) -> Value {
    Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or_else(|| original.clone())
}

/// Output of one generator run.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub table: ReferenceTable,
    /// Multiplier drawn for each subcounty.
    pub offsets: BTreeMap<String, f64>,
}

/// Owns the random stream for one run.
pub struct ReferenceGenerator<R: Rng> {
    rng: R,
}

impl ReferenceGenerator<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ReferenceGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Drift one subcounty's `year → record` mapping.
    ///
    /// Returns the rewritten mapping and the subcounty offset, or the input
    /// unchanged (and no draws made) when it is not an object.
    pub fn subcounty(&mut self, name: &str, years: &Value) -> (Value, Option<f64>) {
        let Some(years) = years.as_object() else {
            debug!(subcounty = name, "not a year mapping; copied as-is");
            return (years.clone(), None);
        };

        let offset = self.rng.gen_range(OFFSET_RANGE.0..=OFFSET_RANGE.1);
        let mut out = Map::new();
        for (i, year) in sorted_years(years.keys()).into_iter().enumerate() {
            let record = &years[year];
            let new_record = match record.as_object() {
                Some(fields) => Value::Object(self.record(name, fields, offset, i)),
                None => record.clone(),
            };
            out.insert(year.to_string(), new_record);
        }
        (Value::Object(out), Some(offset))
    }

    fn record(
        &mut self,
        subcounty: &str,
        fields: &Map<String, Value>,
        offset: f64,
        year_index: usize,
    ) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in fields {
            let new_value = if STATIC.contains(key.as_str()) {
                value.clone()
            } else {
                match value.as_f64() {
                    Some(v) if ECON.contains(key.as_str()) => {
                        number(vary(&mut self.rng, v * offset, year_index), value)
                    }
                    Some(v) => {
                        debug!(subcounty, field = %key, "unclassified numeric field drifted");
                        number(vary(&mut self.rng, v, year_index), value)
                    }
                    None => value.clone(),
                }
            };
            out.insert(key.clone(), new_value);
        }
        out
    }

    /// Run over every subcounty in document order on this generator's stream.
    pub fn run(&mut self, table: &ReferenceTable) -> Generated {
        let mut out = Map::new();
        let mut offsets = BTreeMap::new();
        for (name, years) in &table.0 {
            let (value, offset) = self.subcounty(name, years);
            if let Some(o) = offset {
                offsets.insert(name.clone(), o);
            }
            out.insert(name.clone(), value);
        }
        Generated {
            table: ReferenceTable(out),
            offsets,
        }
    }
}

/// Sequential generation from a single stream seeded with `seed`.
pub fn generate(table: &ReferenceTable, seed: u64) -> Generated {
    ReferenceGenerator::seeded(seed).run(table)
}

/// Seed for one subcounty's independent stream: FNV-1a over the name,
/// folded with the run seed.
pub fn subcounty_seed(seed: u64, subcounty: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut h = FNV_OFFSET;
    for b in seed.to_le_bytes().iter().chain(subcounty.as_bytes()) {
        h ^= u64::from(*b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Parallel generation: one independently seeded stream per subcounty.
///
/// Deterministic for a seed, but not draw-compatible with [`generate`].
pub fn generate_parallel(table: &ReferenceTable, seed: u64) -> Generated {
    let entries: Vec<(&String, &Value)> = table.0.iter().collect();
    let results: Vec<(String, Value, Option<f64>)> = entries
        .par_iter()
        .map(|(name, years)| {
            let mut generator = ReferenceGenerator::seeded(subcounty_seed(seed, name));
            let (value, offset) = generator.subcounty(name, years);
            ((*name).clone(), value, offset)
        })
        .collect();

    let mut out = Map::new();
    let mut offsets = BTreeMap::new();
    for (name, value, offset) in results {
        if let Some(o) = offset {
            offsets.insert(name.clone(), o);
        }
        out.insert(name, value);
    }
    Generated {
        table: ReferenceTable(out),
        offsets,
    }
}

/// Read `input`, generate, write `output`.
#[tracing::instrument(
    level = "info",
    skip(input, output),
    fields(
        input = %input.as_ref().display(),
        output = %output.as_ref().display()
    )
)]
pub fn generate_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    seed: u64,
    parallel: bool,
) -> Result<Generated> {
    let table = ReferenceTable::load(&input)?;
    let generated = if parallel {
        generate_parallel(&table, seed)
    } else {
        generate(&table, seed)
    };
    generated.table.save(&output)?;
    info!(
        subcounties = generated.offsets.len(),
        seed, parallel, "wrote reference table"
    );
    Ok(generated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,gentrisk::reference=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn table(v: Value) -> ReferenceTable {
        serde_json::from_value(v).unwrap()
    }

    fn sample() -> ReferenceTable {
        table(json!({
            "embakasi": {
                "2021": {"Rent": 1000, "Food": 400.5, "pop_density": 500, "year": 2021,
                         "Subcounty_clean_embakasi": 1, "label": "east"},
                "2020": {"Rent": 1000, "Food": 400.5, "pop_density": 500, "year": 2020,
                         "Subcounty_clean_embakasi": 1, "label": "east"},
                "2022": {"Rent": 1000, "Food": 400.5, "pop_density": 500, "year": 2022,
                         "Subcounty_clean_embakasi": 1, "label": "east"}
            },
            "westlands": {
                "2020": {"Rent": 3000, "Transport": 900, "median_income": 90000, "neighbors": 3},
                "2021": {"Rent": 3100, "Transport": 950, "median_income": 91000, "neighbors": 3}
            }
        }))
    }

    #[test]
    fn same_seed_is_byte_identical() {
        let t = sample();
        let a = generate(&t, 42).table.to_json_string().unwrap();
        let b = generate(&t, 42).table.to_json_string().unwrap();
        assert_eq!(a, b);
        let c = generate(&t, 7).table.to_json_string().unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn keys_survive_and_static_fields_are_untouched() {
        let t = sample();
        let g = generate(&t, 42);
        for sub in t.subcounties() {
            let years_in = t.years(sub).unwrap();
            let years_out = g.table.years(sub).unwrap();
            assert_eq!(years_in.len(), years_out.len());
            for (year, rec_in) in years_in {
                let rec_in = rec_in.as_object().unwrap();
                let rec_out = g.table.record(sub, year).unwrap();
                assert_eq!(
                    rec_in.keys().collect::<Vec<_>>(),
                    rec_out.keys().collect::<Vec<_>>()
                );
                for f in STATIC_FIELDS {
                    if let Some(v) = rec_in.get(*f) {
                        assert_eq!(rec_out.get(*f), Some(v), "{sub}/{year}/{f}");
                    }
                }
                if let Some(label) = rec_in.get("label") {
                    assert_eq!(rec_out.get("label"), Some(label));
                }
            }
        }
    }

    #[test]
    fn years_are_written_in_ascending_order() {
        let g = generate(&sample(), 1);
        let years: Vec<&String> = g.table.years("embakasi").unwrap().keys().collect();
        assert_eq!(years, vec!["2020", "2021", "2022"]);
    }

    #[test]
    fn economic_fields_stay_inside_the_drift_band() {
        let t = sample();
        for seed in 0..20 {
            let g = generate(&t, seed);
            for sub in t.subcounties() {
                let offset = g.offsets[sub];
                assert!((OFFSET_RANGE.0..=OFFSET_RANGE.1).contains(&offset));
                let years = sorted_years(t.years(sub).unwrap().keys());
                for (i, year) in years.into_iter().enumerate() {
                    let (lo, hi) = drift_bounds(i);
                    let rec_in = t.record(sub, year).unwrap();
                    let rec_out = g.table.record(sub, year).unwrap();
                    for f in ECON_FIELDS {
                        let Some(v) = rec_in.get(*f).and_then(Value::as_f64) else {
                            continue;
                        };
                        let base = v * offset;
                        let out = rec_out[*f].as_f64().unwrap();
                        assert!(
                            out >= base * lo - 5e-4 && out <= base * hi + 5e-4,
                            "{sub}/{year}/{f}: {out} outside [{}, {}]",
                            base * lo,
                            base * hi
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn later_years_get_a_wider_band() {
        let t = table(json!({
            "embakasi": {
                "2020": {"Rent": 1000, "pop_density": 500},
                "2021": {"Rent": 1000, "pop_density": 500}
            }
        }));
        let g = generate(&t, DEFAULT_SEED);
        for year in ["2020", "2021"] {
            assert_eq!(g.table.record("embakasi", year).unwrap()["pop_density"], json!(500));
        }

        let (lo0, hi0) = drift_bounds(0);
        let (lo1, hi1) = drift_bounds(1);
        assert!(hi1 - lo1 > hi0 - lo0);

        let offset = g.offsets["embakasi"];
        let rent0 = g.table.record("embakasi", "2020").unwrap()["Rent"].as_f64().unwrap();
        let rent1 = g.table.record("embakasi", "2021").unwrap()["Rent"].as_f64().unwrap();
        let base = 1000.0 * offset;
        assert!(rent0 >= base * lo0 - 5e-4 && rent0 <= base * hi0 + 5e-4);
        assert!(rent1 >= base * lo1 - 5e-4 && rent1 <= base * hi1 + 5e-4);
    }

    #[test]
    fn unclassified_numbers_drift_without_offset() {
        init_test_logging();
        let t = table(json!({"langata": {"2020": {"quarter": 2}, "2021": {"quarter": 2}}}));
        let g = generate(&t, 3);
        let q0 = g.table.record("langata", "2020").unwrap()["quarter"].as_f64().unwrap();
        let (lo, hi) = drift_bounds(0);
        assert!(q0 >= 2.0 * lo - 5e-4 && q0 <= 2.0 * hi + 5e-4);
    }

    #[test]
    fn malformed_values_pass_through() {
        let t = table(json!({
            "makadara": {
                "2020": {"Rent": "n/a", "flag": true, "extra": null},
                "2021": "not a record"
            },
            "kasarani": [1, 2, 3]
        }));
        let g = generate(&t, 9);
        let rec = g.table.record("makadara", "2020").unwrap();
        assert_eq!(rec["Rent"], json!("n/a"));
        assert_eq!(rec["flag"], json!(true));
        assert_eq!(rec["extra"], Value::Null);
        assert_eq!(g.table.years("makadara").unwrap()["2021"], json!("not a record"));
        assert_eq!(g.table.0["kasarani"], json!([1, 2, 3]));
        assert!(!g.offsets.contains_key("kasarani"));
    }

    #[test]
    fn vary_uses_two_draws_per_call() {
        let mut a = StdRng::seed_from_u64(5);
        let mut b = StdRng::seed_from_u64(5);
        let _ = vary(&mut a, 10.0, 2);
        let _: f64 = b.gen_range(-YEAR_VARIATION..=YEAR_VARIATION);
        let _: f64 = b.gen_range(-AREA_VARIATION..=AREA_VARIATION);
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn parallel_is_deterministic_per_seed() {
        let t = sample();
        let a = generate_parallel(&t, 42);
        let b = generate_parallel(&t, 42);
        assert_eq!(a, b);
        assert_eq!(
            a.table.subcounties().collect::<Vec<_>>(),
            vec!["embakasi", "westlands"]
        );
        assert_ne!(subcounty_seed(42, "embakasi"), subcounty_seed(42, "westlands"));
        assert_ne!(subcounty_seed(42, "embakasi"), subcounty_seed(43, "embakasi"));

        // a subcounty's output does not depend on its neighbours
        let solo = table(json!({"westlands": t.0["westlands"].clone()}));
        let s = generate_parallel(&solo, 42);
        assert_eq!(s.table.0["westlands"], a.table.0["westlands"]);
    }

    #[test]
    fn file_round_trip() -> Result<()> {
        init_test_logging();
        let dir = tempdir()?;
        let input = dir.path().join("subcounty_reference.json");
        let output = dir.path().join("subcounty_reference_updated.json");
        sample().save(&input)?;

        let g = generate_file(&input, &output, DEFAULT_SEED, false)?;
        let written = std::fs::read_to_string(&output)?;
        assert_eq!(written, g.table.to_json_string()?);
        assert_eq!(g, generate(&sample(), DEFAULT_SEED));
        assert!(ReferenceTable::load(&output)?.years("westlands").is_some());
        Ok(())
    }
}
