// src/report.rs

//! Plain-text gentrification risk report.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::info;

use crate::inference::predict;
use crate::input::{validate_subcounty, ModelInput};
use crate::model::ModelRegistry;
use crate::risk::RiskCategory;

const WRAP_WIDTH: usize = 90;
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Features each deployed model leans on most.
pub fn top_features(model_name: &str) -> &'static [&'static str] {
    match model_name {
        "Random Forest" => &["Rent", "Food", "Misc"],
        "XGBoost" => &["median_income", "employment_rate", "pop_density"],
        "MLP" => &["Rent", "employment_rate", "dist_to_cbd_km"],
        _ => &[],
    }
}

const REASONING: &[(&str, &str)] = &[
    (
        "Rent",
        "Higher rent indicates increasing economic pressure, which can push out lower income \
         groups.",
    ),
    (
        "Food",
        "Higher food expenditure reflects overall household cost burdens that relate to \
         affordability constraints.",
    ),
    (
        "Misc",
        "Miscellaneous expenditures capture other financial pressures that may influence \
         displacement vulnerability.",
    ),
    (
        "median_income",
        "Higher median income typically reduces displacement risk by indicating improved \
         financial stability.",
    ),
    (
        "employment_rate",
        "Higher employment rates often lower vulnerability to gentrification forces by \
         improving household resilience.",
    ),
    (
        "pop_density",
        "High density areas tend to face stronger housing competition, which can magnify \
         gentrification pressures.",
    ),
    (
        "dist_to_cbd_km",
        "Areas closer to the CBD tend to have higher demand, increasing potential \
         gentrification pressure.",
    ),
];

/// One-sentence reading of how a feature moves risk.
pub fn reasoning(feature: &str) -> Option<&'static str> {
    REASONING
        .iter()
        .find(|(name, _)| *name == feature)
        .map(|(_, text)| *text)
}

/// Greedy word wrap; words longer than `width` get a line of their own.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub score: f64,
    pub risk_category: RiskCategory,
    pub subcounty: Option<String>,
    pub year: Option<i32>,
}

impl Report {
    pub fn timestamp(&self) -> String {
        self.generated_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `report_<Model_Name>_<timestamp>.txt`
    pub fn file_name(&self) -> String {
        format!("report_{}_{}.txt", self.model.replace(' ', "_"), self.timestamp())
    }

    pub fn summary(&self) -> String {
        format!(
            "The predicted gentrification risk score using {} is {:.4}, \
             which corresponds to a '{}' risk category. \
             This prediction reflects the combined influence of socio-economic, expenditure, \
             and spatial features for the given subcounty and time context.",
            self.model, self.score, self.risk_category
        )
    }

    fn explanation(&self) -> Vec<String> {
        let top = top_features(&self.model);
        if top.is_empty() {
            return vec![format!(
                "No feature breakdown is available for {}.",
                self.model
            )];
        }
        let mut out = vec![format!(
            "The top {} features used by {} are: {}. \
             The following is a breakdown of how each contributes to the model:",
            top.len(),
            self.model,
            top.join(", ")
        )];
        out.extend(
            top.iter()
                .filter_map(|f| reasoning(f).map(|r| format!("{}: {}", f, r))),
        );
        out
    }

    pub fn render(&self) -> String {
        let mut lines = vec![
            "Gentrification Risk Report".to_string(),
            String::new(),
            format!("Model: {}", self.model),
            format!("Generated: {} (UTC)", self.timestamp()),
            String::new(),
            "Prediction".to_string(),
            format!("Score: {:.4}", self.score),
            format!("Risk Category: {}", self.risk_category),
            String::new(),
        ];
        lines.extend(wrap(&self.summary(), WRAP_WIDTH));

        if self.subcounty.is_some() || self.year.is_some() {
            lines.push(String::new());
            lines.push("Context".to_string());
            if let Some(s) = &self.subcounty {
                lines.push(format!("Subcounty: {}", s));
            }
            if let Some(y) = self.year {
                lines.push(format!("Year: {}", y));
            }
        }

        lines.push(String::new());
        lines.push(format!("{} Feature Importance", self.model));
        for paragraph in self.explanation() {
            lines.extend(wrap(&paragraph, WRAP_WIDTH));
        }

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }

    /// Write under `dir`, returning the file path.
    pub fn write(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).with_context(|| format!("creating reports dir {:?}", dir))?;
        let path = dir.join(self.file_name());
        let file =
            File::create(&path).with_context(|| format!("could not create `{}`", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(self.render().as_bytes())
            .with_context(|| format!("writing report {:?}", path))?;
        writer.flush().context("flushing report")?;
        info!(path = %path.display(), model = %self.model, "wrote report");
        Ok(path)
    }
}

/// Score `input` with `model_name` and write the report into `reports_dir`.
///
/// A given `subcounty` is validated and replaces the one on the request.
pub fn generate_report(
    registry: &ModelRegistry,
    model_name: &str,
    mut input: ModelInput,
    subcounty: Option<&str>,
    year: Option<i32>,
    reports_dir: impl AsRef<Path>,
) -> Result<(Report, PathBuf)> {
    let subcounty = subcounty.map(validate_subcounty).transpose()?;
    if let Some(s) = &subcounty {
        input.subcounty = s.clone();
    }
    let row = input.to_feature_row()?;
    let prediction = predict(registry, model_name, &row)?;

    let report = Report {
        model: prediction.model,
        generated_at: Utc::now(),
        score: prediction.score,
        risk_category: prediction.risk_category,
        subcounty,
        year,
    };
    let path = report.write(reports_dir)?;
    Ok((report, path))
}
