// src/model/mod.rs

//! Pre-trained scoring models and the capabilities inference can query.
//!
//! Models are trained elsewhere and shipped as JSON artifacts. A loaded
//! model advertises what it can do through three optional capabilities:
//!
//! - [`ExpectedColumns`]: the ordered column list it was fitted against
//! - [`ProbabilityOutput`]: positive-class probability per row
//! - [`PlainPredict`]: a raw prediction per row (regression value or label)
//!
//! Inference asks for each capability explicitly and falls back in a fixed
//! order; see [`crate::inference`].

pub mod linear;
pub mod mlp;
pub mod registry;
pub mod tree;

pub use registry::ModelRegistry;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path};

use crate::error::ScoringError;
use crate::features::FeatureMatrix;

pub trait ExpectedColumns {
    fn columns(&self) -> &[String];
}

pub trait ProbabilityOutput {
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError>;
}

pub trait PlainPredict {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError>;
}

/// A loaded model. Every capability is optional.
pub trait Model: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> &str;

    fn expected_columns(&self) -> Option<&dyn ExpectedColumns> {
        None
    }

    fn probability_output(&self) -> Option<&dyn ProbabilityOutput> {
        None
    }

    fn plain_predict(&self) -> Option<&dyn PlainPredict> {
        None
    }
}

/// Maps the raw model output (margin) to the reported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Link {
    /// Regression output; no probabilities.
    #[default]
    Identity,
    /// Binary classifier; margin is log-odds.
    Logit,
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Linear(linear::LinearModel),
    TreeEnsemble(tree::TreeEnsemble),
    Mlp(mlp::Mlp),
}

impl Estimator {
    fn kind(&self) -> &'static str {
        match self {
            Estimator::Linear(_) => "linear",
            Estimator::TreeEnsemble(_) => "tree_ensemble",
            Estimator::Mlp(_) => "mlp",
        }
    }

    fn link(&self) -> Link {
        match self {
            Estimator::Linear(m) => m.link,
            Estimator::TreeEnsemble(m) => m.link,
            Estimator::Mlp(m) => m.link,
        }
    }

    fn has_parameters(&self) -> bool {
        match self {
            Estimator::Linear(m) => !m.coefficients.is_empty(),
            Estimator::TreeEnsemble(m) => !m.trees.is_empty(),
            Estimator::Mlp(m) => !m.layers.is_empty(),
        }
    }

    /// Minimum row width the estimator reads from.
    fn input_width(&self) -> usize {
        match self {
            Estimator::Linear(m) => m.coefficients.len(),
            Estimator::TreeEnsemble(m) => m.input_width(),
            Estimator::Mlp(m) => m.input_width(),
        }
    }

    fn margin(&self, row: &[f64]) -> Result<f64, ScoringError> {
        match self {
            Estimator::Linear(m) => Ok(m.margin(row)),
            Estimator::TreeEnsemble(m) => m.margin(row),
            Estimator::Mlp(m) => m.margin(row),
        }
    }
}

/// On-disk model: estimator parameters plus optional column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    #[serde(skip)]
    pub name: String,
    /// Columns the model was fitted against, in order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(default = "default_fitted")]
    pub fitted: bool,
    #[serde(flatten)]
    pub estimator: Estimator,
}

fn default_fitted() -> bool {
    true
}

impl ModelArtifact {
    /// Read a JSON artifact from `path` and register it under `name`.
    pub fn load(path: impl AsRef<Path>, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading model {:?}", path))?;
        let mut artifact: ModelArtifact =
            serde_json::from_str(&text).with_context(|| format!("parsing model {:?}", path))?;
        artifact.name = name.into();
        Ok(artifact)
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted && self.estimator.has_parameters()
    }

    fn margins(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError> {
        if !self.is_fitted() {
            return Err(ScoringError::NotFitted);
        }
        let width = match &self.feature_names {
            Some(names) => names.len(),
            None => self.estimator.input_width(),
        };
        if x.n_cols() < width || (self.feature_names.is_some() && x.n_cols() != width) {
            return Err(ScoringError::ShapeMismatch {
                expected: width,
                found: x.n_cols(),
            });
        }
        x.rows.iter().map(|r| self.estimator.margin(r)).collect()
    }
}

impl ExpectedColumns for ModelArtifact {
    fn columns(&self) -> &[String] {
        self.feature_names.as_deref().unwrap_or(&[])
    }
}

impl ProbabilityOutput for ModelArtifact {
    fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError> {
        Ok(self.margins(x)?.into_iter().map(sigmoid).collect())
    }
}

impl PlainPredict for ModelArtifact {
    fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError> {
        let margins = self.margins(x)?;
        Ok(match self.estimator.link() {
            Link::Identity => margins,
            // classifiers predict the label
            Link::Logit => margins
                .into_iter()
                .map(|m| if m >= 0.0 { 1.0 } else { 0.0 })
                .collect(),
        })
    }
}

impl Model for ModelArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        self.estimator.kind()
    }

    fn expected_columns(&self) -> Option<&dyn ExpectedColumns> {
        self.feature_names.as_ref().map(|_| self as &dyn ExpectedColumns)
    }

    fn probability_output(&self) -> Option<&dyn ProbabilityOutput> {
        match self.estimator.link() {
            Link::Logit => Some(self as &dyn ProbabilityOutput),
            Link::Identity => None,
        }
    }

    fn plain_predict(&self) -> Option<&dyn PlainPredict> {
        Some(self as &dyn PlainPredict)
    }
}
