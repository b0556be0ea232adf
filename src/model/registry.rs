use anyhow::{Context, Result};
use glob::glob;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info, warn};

use super::{Model, ModelArtifact};

/// Short names accepted by the map view.
const ALIASES: &[(&str, &str)] = &[("rf", "Random Forest"), ("xgb", "XGBoost"), ("mlp", "MLP")];

/// Read-only table of loaded models, built once at startup and handed to
/// inference explicitly.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<dyn Model>>,
}

impl ModelRegistry {
    /// Load every `name → file` entry from `models_dir`.
    ///
    /// A missing file is a warning and an unreadable one an error log; in both
    /// cases that model is simply absent from the registry.
    pub fn load(models_dir: impl AsRef<Path>, files: &BTreeMap<String, String>) -> Self {
        let dir = models_dir.as_ref();
        let mut models: BTreeMap<String, Arc<dyn Model>> = BTreeMap::new();

        for (name, fname) in files {
            let full_path = dir.join(fname);
            if !full_path.exists() {
                warn!(model = %name, path = %full_path.display(), "missing model file");
                continue;
            }
            match ModelArtifact::load(&full_path, name.as_str()) {
                Ok(artifact) => {
                    info!(model = %name, kind = artifact.kind(), "loaded model");
                    models.insert(name.clone(), Arc::new(artifact));
                }
                Err(e) => error!(model = %name, "error loading model: {:#}", e),
            }
        }

        Self { models }
    }

    /// Load every `*.json` artifact in `dir`, named by file stem.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self> {
        let pattern = format!("{}/*.json", dir.as_ref().display());
        let mut models: BTreeMap<String, Arc<dyn Model>> = BTreeMap::new();

        for entry in glob(&pattern).context("invalid glob pattern for model discovery")? {
            let path: PathBuf = match entry {
                Ok(p) => p,
                Err(e) => {
                    warn!("cannot read glob entry: {:?}", e);
                    continue;
                }
            };
            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(n) => n.to_string(),
                None => continue,
            };
            match ModelArtifact::load(&path, name.as_str()) {
                Ok(artifact) => {
                    models.insert(name, Arc::new(artifact));
                }
                Err(e) => error!(path = %path.display(), "skipping model: {:#}", e),
            }
        }

        Ok(Self { models })
    }

    /// Registry over already-constructed models.
    pub fn from_models<I>(models: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Model>>,
    {
        Self {
            models: models
                .into_iter()
                .map(|m| (m.name().to_string(), m))
                .collect(),
        }
    }

    /// Look up by display name, falling back to the short aliases.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Model>> {
        self.models.get(name).or_else(|| {
            let lowered = name.trim().to_lowercase();
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == lowered)
                .and_then(|(_, full)| self.models.get(*full))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
