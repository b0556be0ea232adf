// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use crate::model::ModelRegistry;
use crate::reference::generate::DEFAULT_SEED;

pub const ENV_MODELS_DIR: &str = "GENTRISK_MODELS_DIR";
pub const ENV_DATA_DIR: &str = "GENTRISK_DATA_DIR";
pub const ENV_REPORTS_DIR: &str = "GENTRISK_REPORTS_DIR";
pub const ENV_SEED: &str = "GENTRISK_SEED";
pub const ENV_DEFAULT_MODEL: &str = "GENTRISK_DEFAULT_MODEL";

/// Runtime layout and defaults. Built-in values, then an optional YAML
/// file, then `GENTRISK_*` environment variables; binaries apply their own
/// flags last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub models_dir: PathBuf,
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    /// Base reference table, relative to `data_dir`.
    pub reference_file: String,
    /// Generated reference table, relative to `data_dir`.
    pub reference_output_file: String,
    pub default_model: String,
    pub seed: u64,
    /// Display name → artifact file inside `models_dir`.
    pub model_files: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        let model_files = [
            ("Random Forest", "RandomForest_model.json"),
            ("XGBoost", "XGBoost_model.json"),
            ("MLP", "MLP_model.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            models_dir: PathBuf::from("models"),
            data_dir: PathBuf::from("data"),
            reports_dir: PathBuf::from("reports"),
            reference_file: "subcounty_reference.json".to_string(),
            reference_output_file: "subcounty_reference_updated.json".to_string(),
            default_model: "Random Forest".to_string(),
            seed: DEFAULT_SEED,
            model_files,
        }
    }
}

impl Settings {
    /// Defaults, overlaid by `path` when given, then by the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_yaml_file(p)?,
            None => Self::default(),
        };
        settings.apply_env(|key| env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {:?}", path))
    }

    /// Override fields from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_MODELS_DIR) {
            self.models_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_REPORTS_DIR) {
            self.reports_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_SEED) {
            self.seed = v
                .trim()
                .parse()
                .with_context(|| format!("{} must be an unsigned integer, got {:?}", ENV_SEED, v))?;
        }
        if let Some(v) = lookup(ENV_DEFAULT_MODEL) {
            self.default_model = v;
        }
        debug!(settings = ?self, "settings resolved");
        Ok(())
    }

    pub fn reference_path(&self) -> PathBuf {
        self.data_dir.join(&self.reference_file)
    }

    pub fn reference_output_path(&self) -> PathBuf {
        self.data_dir.join(&self.reference_output_file)
    }

    /// Load every configured model that is present and readable.
    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::load(&self.models_dir, &self.model_files)
    }
}

/// `RUST_LOG` when set, else `LOG_LEVEL`, else `info`.
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
    })
}
