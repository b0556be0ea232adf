// src/inference.rs

//! Preprocess → align → score, with the capability fallbacks:
//!
//! 1. expected columns present: align to them; absent: use the numeric
//!    columns as-is and report [`Alignment::Degraded`]
//! 2. scoring: the preferred capability first, the other one second,
//!    otherwise [`InferenceError::NoScoringCapability`]

use serde::{Serialize, Serializer};
use std::ops::Index;
use tracing::{debug, warn};

use crate::error::{InferenceError, ScoringError};
use crate::features::{align_matrix, preprocess_frame, FeatureMatrix, FeatureRow};
use crate::input::ModelInput;
use crate::model::{Model, ModelRegistry};
use crate::risk::{bucket, RiskCategory};

/// How the numeric columns were reconciled with the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Aligned to the model's declared columns.
    Exact,
    /// Model declared no columns; numeric columns passed through unaligned.
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedFeatures {
    pub matrix: FeatureMatrix,
    pub alignment: Alignment,
}

/// Which scoring capability to try first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    Probability,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scores {
    pub values: Vec<f64>,
    pub alignment: Alignment,
}

/// Turn raw rows into the matrix `model` should see.
pub fn prepare(model: &dyn Model, rows: &[FeatureRow]) -> Result<PreparedFeatures, InferenceError> {
    let numeric = preprocess_frame(rows)?;

    let (matrix, alignment) = match model.expected_columns() {
        Some(cap) => (align_matrix(&numeric, cap.columns()), Alignment::Exact),
        None => {
            warn!(
                model = model.name(),
                columns = numeric.n_cols(),
                "model exposes no expected columns; using numeric columns as-is"
            );
            (numeric, Alignment::Degraded)
        }
    };

    if matrix.is_empty() {
        return Err(InferenceError::EmptyFeatureSet);
    }
    debug!(
        model = model.name(),
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        "prepared features"
    );
    Ok(PreparedFeatures { matrix, alignment })
}

fn scoring_error(model: &dyn Model, err: ScoringError) -> InferenceError {
    match err {
        ScoringError::NotFitted => InferenceError::ModelNotFitted {
            model: model.name().to_string(),
        },
        other => InferenceError::Scoring {
            model: model.name().to_string(),
            reason: other.to_string(),
        },
    }
}

/// Score prepared features with the preferred capability, falling back to
/// the other one.
pub fn run(
    model: &dyn Model,
    prepared: &PreparedFeatures,
    preference: Preference,
) -> Result<Vec<f64>, InferenceError> {
    let x = &prepared.matrix;
    let proba = || model.probability_output().map(|c| c.predict_proba(x));
    let plain = || model.plain_predict().map(|c| c.predict(x));

    let outcome = match preference {
        Preference::Probability => proba().or_else(|| {
            debug!(model = model.name(), "no probability output; using plain prediction");
            plain()
        }),
        Preference::Plain => plain().or_else(proba),
    };

    match outcome {
        Some(result) => result.map_err(|e| scoring_error(model, e)),
        None => Err(InferenceError::NoScoringCapability {
            model: model.name().to_string(),
        }),
    }
}

/// Positive-class probability per row, or plain predictions when the model
/// has no probability output.
pub fn predict_gentrification(
    model: &dyn Model,
    rows: &[FeatureRow],
) -> Result<Scores, InferenceError> {
    let prepared = prepare(model, rows)?;
    let values = run(model, &prepared, Preference::Probability)?;
    Ok(Scores {
        values,
        alignment: prepared.alignment,
    })
}

/// Regression-style risk score for a single row.
pub fn score(model: &dyn Model, row: &FeatureRow) -> Result<f64, InferenceError> {
    let prepared = prepare(model, std::slice::from_ref(row))?;
    let values = run(model, &prepared, Preference::Plain)?;
    values
        .first()
        .copied()
        .ok_or(InferenceError::EmptyFeatureSet)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub score: f64,
    pub risk_category: RiskCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub model: String,
    pub score: f64,
    pub risk_category: RiskCategory,
}

/// Score a validated request with one named model.
pub fn predict(
    registry: &ModelRegistry,
    model_name: &str,
    row: &FeatureRow,
) -> Result<Prediction, InferenceError> {
    let model = registry
        .get(model_name)
        .ok_or_else(|| InferenceError::UnknownModel(model_name.to_string()))?;
    let s = score(model.as_ref(), row)?;
    Ok(Prediction {
        model: model_name.to_string(),
        score: s,
        risk_category: bucket(s),
    })
}

/// Per-model results keyed by the requested name, in request order.
/// Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    entries: Vec<(String, ScoreSummary)>,
}

impl Comparison {
    /// A repeated name keeps its first position and takes the new value.
    pub fn insert(&mut self, name: String, summary: ScoreSummary) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = summary,
            None => self.entries.push((name, summary)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScoreSummary> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for Comparison {
    type Output = ScoreSummary;

    fn index(&self, name: &str) -> &ScoreSummary {
        match self.get(name) {
            Some(s) => s,
            None => panic!("no comparison result for `{}`", name),
        }
    }
}

impl Serialize for Comparison {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(n, s)| (n, s)))
    }
}

/// Score one request with several models. Any unknown name fails the whole
/// comparison.
pub fn compare(
    registry: &ModelRegistry,
    model_names: &[String],
    input: &ModelInput,
) -> anyhow::Result<Comparison> {
    let row = input.to_feature_row()?;
    let mut results = Comparison::default();
    for name in model_names {
        let p = predict(registry, name, &row)?;
        results.insert(
            name.clone(),
            ScoreSummary {
                score: p.score,
                risk_category: p.risk_category,
            },
        );
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureValue, FEATURES};
    use crate::input::tests::sample_input;
    use crate::model::{ExpectedColumns, ModelArtifact, PlainPredict, ProbabilityOutput};
    use approx::assert_relative_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn artifact(name: &str, v: serde_json::Value) -> ModelArtifact {
        let mut a: ModelArtifact = serde_json::from_value(v).unwrap();
        a.name = name.to_string();
        a
    }

    /// Model with a hand-picked set of capabilities.
    #[derive(Debug)]
    struct Probe {
        columns: Option<Vec<String>>,
        proba: bool,
        plain: bool,
        fitted: bool,
    }

    impl ExpectedColumns for Probe {
        fn columns(&self) -> &[String] {
            self.columns.as_deref().unwrap_or(&[])
        }
    }

    impl ProbabilityOutput for Probe {
        fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError> {
            if !self.fitted {
                return Err(ScoringError::NotFitted);
            }
            Ok(vec![0.75; x.n_rows()])
        }
    }

    impl PlainPredict for Probe {
        fn predict(&self, x: &FeatureMatrix) -> Result<Vec<f64>, ScoringError> {
            Ok(x.rows.iter().map(|r| r.iter().sum()).collect())
        }
    }

    impl Model for Probe {
        fn name(&self) -> &str {
            "probe"
        }
        fn kind(&self) -> &str {
            "probe"
        }
        fn expected_columns(&self) -> Option<&dyn ExpectedColumns> {
            self.columns.as_ref().map(|_| self as &dyn ExpectedColumns)
        }
        fn probability_output(&self) -> Option<&dyn ProbabilityOutput> {
            self.proba.then_some(self as &dyn ProbabilityOutput)
        }
        fn plain_predict(&self) -> Option<&dyn PlainPredict> {
            self.plain.then_some(self as &dyn PlainPredict)
        }
    }

    fn row(pairs: &[(&str, FeatureValue)]) -> FeatureRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn aligns_to_declared_columns() {
        let probe = Probe {
            columns: Some(vec!["b".into(), "missing".into(), "a".into()]),
            proba: false,
            plain: true,
            fitted: true,
        };
        let r = row(&[
            ("a", FeatureValue::Float(1.0)),
            ("b", FeatureValue::Int(2)),
            ("junk", FeatureValue::Float(100.0)),
            ("note", FeatureValue::Text("x".into())),
        ]);
        let prepared = prepare(&probe, &[r]).unwrap();
        assert_eq!(prepared.alignment, Alignment::Exact);
        assert_eq!(prepared.matrix.columns, vec!["b", "missing", "a"]);
        assert_eq!(prepared.matrix.rows, vec![vec![2.0, 0.0, 1.0]]);
    }

    #[test]
    fn degrades_without_declared_columns() {
        let probe = Probe {
            columns: None,
            proba: false,
            plain: true,
            fitted: true,
        };
        let r = row(&[("a", FeatureValue::Float(1.0)), ("junk", FeatureValue::Int(9))]);
        let out = predict_gentrification(&probe, &[r]).unwrap();
        assert_eq!(out.alignment, Alignment::Degraded);
        assert_eq!(out.values, vec![10.0]);
    }

    #[test]
    fn empty_feature_set_is_reported() {
        let probe = Probe {
            columns: Some(vec!["a".into()]),
            proba: true,
            plain: true,
            fitted: true,
        };
        let r = row(&[("note", FeatureValue::Text("free text".into()))]);
        assert!(matches!(
            predict_gentrification(&probe, &[r]),
            Err(InferenceError::EmptyFeatureSet)
        ));
        assert!(matches!(
            predict_gentrification(&probe, &[]),
            Err(InferenceError::EmptyFeatureSet)
        ));
    }

    #[test]
    fn probability_preferred_then_plain() {
        let r = row(&[("a", FeatureValue::Float(2.0))]);
        let both = Probe {
            columns: None,
            proba: true,
            plain: true,
            fitted: true,
        };
        assert_eq!(
            predict_gentrification(&both, &[r.clone()]).unwrap().values,
            vec![0.75]
        );
        // the regression path prefers plain prediction
        assert_eq!(score(&both, &r).unwrap(), 2.0);

        let plain_only = Probe {
            proba: false,
            ..both
        };
        assert_eq!(
            predict_gentrification(&plain_only, &[r.clone()]).unwrap().values,
            vec![2.0]
        );

        let neither = Probe {
            columns: None,
            proba: false,
            plain: false,
            fitted: true,
        };
        assert!(matches!(
            predict_gentrification(&neither, &[r]),
            Err(InferenceError::NoScoringCapability { .. })
        ));
    }

    #[test]
    fn not_fitted_maps_to_model_not_fitted() {
        let probe = Probe {
            columns: None,
            proba: true,
            plain: true,
            fitted: false,
        };
        let r = row(&[("a", FeatureValue::Float(2.0))]);
        match predict_gentrification(&probe, &[r]) {
            Err(InferenceError::ModelNotFitted { model }) => assert_eq!(model, "probe"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn registry_predict_and_compare() {
        let mut weights = vec![0.0; FEATURES.len()];
        weights[0] = 0.00001; // Rent
        let rf = artifact(
            "Random Forest",
            json!({
                "kind": "linear",
                "feature_names": FEATURES,
                "coefficients": weights,
                "intercept": -0.2
            }),
        );
        let mlp = artifact(
            "MLP",
            json!({"kind": "linear", "feature_names": FEATURES, "fitted": false,
                   "coefficients": [1.0], "intercept": 0.0}),
        );
        let registry = ModelRegistry::from_models([
            Arc::new(rf) as Arc<dyn Model>,
            Arc::new(mlp) as Arc<dyn Model>,
        ]);

        let input = sample_input("embakasi");
        let row = input.to_feature_row().unwrap();
        let p = predict(&registry, "Random Forest", &row).unwrap();
        // -0.2 + 15000 * 1e-5
        assert_relative_eq!(p.score, -0.05, epsilon = 1e-12);
        assert_eq!(p.model, "Random Forest");

        let cmp = compare(&registry, &["rf".to_string()], &input).unwrap();
        assert_relative_eq!(cmp["rf"].score, p.score);

        assert!(matches!(
            predict(&registry, "XGBoost", &row),
            Err(InferenceError::UnknownModel(_))
        ));
        let err = compare(&registry, &["MLP".to_string()], &input).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<InferenceError>(),
            Some(InferenceError::ModelNotFitted { .. })
        ));
    }

    #[test]
    fn compare_keeps_request_order() {
        let linear = |name: &str, intercept: f64| {
            artifact(
                name,
                json!({
                    "kind": "linear",
                    "feature_names": FEATURES,
                    "coefficients": vec![0.0; FEATURES.len()],
                    "intercept": intercept
                }),
            )
        };
        let registry = ModelRegistry::from_models([
            Arc::new(linear("Random Forest", -0.2)) as Arc<dyn Model>,
            Arc::new(linear("XGBoost", 0.3)) as Arc<dyn Model>,
        ]);
        let names = vec!["xgb".to_string(), "Random Forest".to_string(), "xgb".to_string()];
        let cmp = compare(&registry, &names, &sample_input("kasarani")).unwrap();

        assert_eq!(cmp.len(), 2);
        assert_eq!(cmp.names().collect::<Vec<_>>(), vec!["xgb", "Random Forest"]);
        assert_eq!(cmp["xgb"].risk_category, RiskCategory::High);
        assert_eq!(cmp["Random Forest"].risk_category, RiskCategory::Low);

        let body = serde_json::to_value(&cmp).unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["xgb", "Random Forest"]);
        assert_relative_eq!(body["xgb"]["score"].as_f64().unwrap(), 0.3);
        assert_eq!(body["Random Forest"]["risk_category"], json!("Low"));
    }
}
