//! Regression-tree ensembles: bagged forests (`mean`) and boosted
//! ensembles (`sum` on top of a base score).

use serde::{Deserialize, Serialize};

use super::Link;
use crate::error::ScoringError;

/// One node of a flattened tree. Index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn predict(&self, row: &[f64]) -> Result<f64, ScoringError> {
        let mut idx = 0usize;
        // a well-formed tree reaches a leaf in fewer hops than it has nodes
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return Ok(*value),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).ok_or(ScoringError::ShapeMismatch {
                        expected: feature + 1,
                        found: row.len(),
                    })?;
                    idx = if *x <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(ScoringError::Malformed(format!(
                        "tree node {} out of range ({} nodes)",
                        idx,
                        self.nodes.len()
                    )))
                }
            }
        }
        Err(ScoringError::Malformed("tree contains a cycle".into()))
    }

    fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Random forest: average of tree outputs.
    #[default]
    Mean,
    /// Gradient boosting: base score plus sum of tree outputs.
    Sum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub link: Link,
}

impl TreeEnsemble {
    pub fn input_width(&self) -> usize {
        self.trees
            .iter()
            .filter_map(Tree::max_feature)
            .max()
            .map_or(0, |m| m + 1)
    }

    pub fn margin(&self, row: &[f64]) -> Result<f64, ScoringError> {
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.predict(row)?;
        }
        Ok(match self.aggregation {
            Aggregation::Mean if !self.trees.is_empty() => {
                self.base_score + total / self.trees.len() as f64
            }
            _ => self.base_score + total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn stump(feature: usize, threshold: f64, lo: f64, hi: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature,
                    threshold,
                    left: 1,
                    right: 2,
                },
                Node::Leaf { value: lo },
                Node::Leaf { value: hi },
            ],
        }
    }

    #[test]
    fn forest_averages_and_boosting_sums() {
        let trees = vec![stump(0, 10.0, -1.0, 1.0), stump(1, 0.5, 0.0, 2.0)];
        let forest = TreeEnsemble {
            trees: trees.clone(),
            aggregation: Aggregation::Mean,
            base_score: 0.0,
            link: Link::Identity,
        };
        let boosted = TreeEnsemble {
            trees,
            aggregation: Aggregation::Sum,
            base_score: 0.5,
            link: Link::Identity,
        };
        let row = [11.0, 0.0];
        assert_relative_eq!(forest.margin(&row).unwrap(), 0.5);
        assert_relative_eq!(boosted.margin(&row).unwrap(), 1.5);
        assert_eq!(forest.input_width(), 2);
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let t = stump(0, 1.0, -1.0, 1.0);
        assert_eq!(t.predict(&[1.0]).unwrap(), -1.0);
        assert_eq!(t.predict(&[1.0001]).unwrap(), 1.0);
    }

    #[test]
    fn malformed_trees_error_instead_of_looping() {
        let cyclic = Tree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 0.0,
                left: 0,
                right: 0,
            }],
        };
        assert!(matches!(
            cyclic.predict(&[1.0]),
            Err(ScoringError::Malformed(_))
        ));

        let mut dangling = stump(0, 0.0, 1.0, 1.0);
        dangling.nodes.truncate(1);
        assert!(matches!(
            dangling.predict(&[1.0]),
            Err(ScoringError::Malformed(_))
        ));
    }

    #[test]
    fn deserializes_node_tags() {
        let t: Tree = serde_json::from_value(json!({
            "nodes": [
                {"type": "split", "feature": 0, "threshold": 2.5, "left": 1, "right": 2},
                {"type": "leaf", "value": 0.1},
                {"type": "leaf", "value": 0.9}
            ]
        }))
        .unwrap();
        assert_eq!(t, stump(0, 2.5, 0.1, 0.9));
    }
}
