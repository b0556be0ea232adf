use serde::{Deserialize, Serialize};

use super::Link;
use crate::error::ScoringError;

/// Fully connected layer; `weights[j]` holds the input weights of unit `j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Result<Vec<f64>, ScoringError> {
        if self.weights.len() != self.bias.len() {
            return Err(ScoringError::Malformed(format!(
                "layer has {} weight rows but {} biases",
                self.weights.len(),
                self.bias.len()
            )));
        }
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(w, b)| {
                if w.len() != input.len() {
                    return Err(ScoringError::ShapeMismatch {
                        expected: w.len(),
                        found: input.len(),
                    });
                }
                Ok(b + w.iter().zip(input).map(|(a, x)| a * x).sum::<f64>())
            })
            .collect()
    }
}

/// Multi-layer perceptron: ReLU hidden layers, one linear output unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    #[serde(default)]
    pub layers: Vec<DenseLayer>,
    #[serde(default)]
    pub link: Link,
}

impl Mlp {
    pub fn input_width(&self) -> usize {
        self.layers
            .first()
            .and_then(|l| l.weights.first())
            .map_or(0, Vec::len)
    }

    pub fn margin(&self, row: &[f64]) -> Result<f64, ScoringError> {
        let width = self.input_width();
        let mut activations = row[..width.min(row.len())].to_vec();
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.forward(&activations)?;
            if i < last {
                for a in activations.iter_mut() {
                    *a = a.max(0.0);
                }
            }
        }
        match activations.as_slice() {
            [out] => Ok(*out),
            other => Err(ScoringError::Malformed(format!(
                "output layer has {} units, expected 1",
                other.len()
            ))),
        }
    }
}
