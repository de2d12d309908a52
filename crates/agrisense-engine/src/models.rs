use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// What a tabular model hands back for one feature row.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Label(String),
    Value(f64),
}

/// A pre-trained model consumed as a black box.
pub trait TabularModel: Send + Sync {
    fn name(&self) -> &str;
    fn n_features(&self) -> usize;
    fn predict(&self, features: &[f64]) -> Result<ModelOutput>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        value: f64,
    },
}

impl TreeNode {
    /// Walks to a leaf; `feature <= threshold` goes left.
    pub fn evaluate(&self, features: &[f64]) -> Result<f64> {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let Some(observed) = features.get(*feature) else {
                        bail!(
                            "tree split references feature {feature} but only {} were given",
                            features.len()
                        );
                    };
                    node = if *observed <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// On-disk form of an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    ForestClassifier {
        name: String,
        n_features: usize,
        classes: Vec<String>,
        trees: Vec<TreeNode>,
    },
    ForestRegressor {
        name: String,
        n_features: usize,
        trees: Vec<TreeNode>,
    },
    LinearRegressor {
        name: String,
        coefficients: Vec<f64>,
        intercept: f64,
    },
}

impl ModelArtifact {
    pub fn validate(&self) -> Result<()> {
        match self {
            ModelArtifact::ForestClassifier {
                name,
                classes,
                trees,
                ..
            } => {
                if classes.is_empty() {
                    bail!("classifier '{name}' declares no classes");
                }
                if trees.is_empty() {
                    bail!("classifier '{name}' has no trees");
                }
            }
            ModelArtifact::ForestRegressor { name, trees, .. } => {
                if trees.is_empty() {
                    bail!("regressor '{name}' has no trees");
                }
            }
            ModelArtifact::LinearRegressor {
                name, coefficients, ..
            } => {
                if coefficients.is_empty() {
                    bail!("linear model '{name}' has no coefficients");
                }
            }
        }
        Ok(())
    }
}

impl TabularModel for ModelArtifact {
    fn name(&self) -> &str {
        match self {
            ModelArtifact::ForestClassifier { name, .. }
            | ModelArtifact::ForestRegressor { name, .. }
            | ModelArtifact::LinearRegressor { name, .. } => name,
        }
    }

    fn n_features(&self) -> usize {
        match self {
            ModelArtifact::ForestClassifier { n_features, .. }
            | ModelArtifact::ForestRegressor { n_features, .. } => *n_features,
            ModelArtifact::LinearRegressor { coefficients, .. } => coefficients.len(),
        }
    }

    fn predict(&self, features: &[f64]) -> Result<ModelOutput> {
        if features.len() != self.n_features() {
            bail!(
                "model '{}' expects {} features, got {}",
                self.name(),
                self.n_features(),
                features.len()
            );
        }
        match self {
            ModelArtifact::ForestClassifier { classes, trees, .. } => {
                let mut votes = vec![0usize; classes.len()];
                for tree in trees {
                    let leaf = tree.evaluate(features)?;
                    let idx = leaf.round();
                    if !leaf.is_finite() || leaf < 0.0 || idx as usize >= classes.len() {
                        bail!("tree voted for class index {leaf} outside 0..{}", classes.len());
                    }
                    votes[idx as usize] += 1;
                }
                // Ties go to the lowest class index.
                let winner = votes
                    .iter()
                    .enumerate()
                    .max_by(|(left_idx, left), (right_idx, right)| {
                        left.cmp(right).then(right_idx.cmp(left_idx))
                    })
                    .map(|(idx, _)| idx)
                    .unwrap_or_default();
                Ok(ModelOutput::Label(classes[winner].clone()))
            }
            ModelArtifact::ForestRegressor { trees, .. } => {
                let mut total = 0.0;
                for tree in trees {
                    total += tree.evaluate(features)?;
                }
                Ok(ModelOutput::Value(total / trees.len() as f64))
            }
            ModelArtifact::LinearRegressor {
                coefficients,
                intercept,
                ..
            } => {
                let dot: f64 = coefficients
                    .iter()
                    .zip(features)
                    .map(|(weight, value)| weight * value)
                    .sum();
                Ok(ModelOutput::Value(intercept + dot))
            }
        }
    }
}

pub fn load_model_artifact(path: &Path) -> Result<Arc<dyn TabularModel>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading model artifact {}", path.display()))?;
    let artifact: ModelArtifact = serde_json::from_str(&raw)
        .with_context(|| format!("invalid model artifact {}", path.display()))?;
    artifact
        .validate()
        .with_context(|| format!("unusable model artifact {}", path.display()))?;
    Ok(Arc::new(artifact))
}
