//! Tree-ensemble model artifacts.
//!
//! An artifact is the JSON dump of a trained gradient-boosted (or bagged)
//! tree ensemble: split nodes carry the feature index, threshold, children,
//! default direction for missing values and the training cover reaching
//! them; leaves carry their output value. Predictions are computed in margin
//! space (`base_score + Σ leaf`) and mapped through the objective's link.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use xai_models::{Result, XaiError};

const COVER_TOLERANCE: f64 = 1e-6;

fn default_true() -> bool {
    true
}

fn default_version() -> String {
    "unversioned".to_string()
}

/// A decision tree node (internal or leaf)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_true")]
        default_left: bool,
        #[serde(default)]
        cover: Option<f64>,
        #[serde(default)]
        gain: Option<f64>,
    },
    Leaf {
        value: f64,
        #[serde(default)]
        cover: Option<f64>,
    },
}

impl Node {
    pub fn cover(&self) -> Option<f64> {
        match self {
            Self::Split { cover, .. } | Self::Leaf { cover, .. } => *cover,
        }
    }
}

/// A single decision tree; node 0 is the root and children always come after
/// their parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `features`.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split { feature, threshold, left, right, default_left, .. } => {
                    idx = if goes_left(features[*feature], *threshold, *default_left) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(tree: &Tree, idx: usize) -> usize {
            match &tree.nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(tree, *left).max(walk(tree, *right)),
            }
        }
        walk(self, 0)
    }

    /// Cover-weighted mean leaf value, i.e. the tree's output with no
    /// feature known. Requires covers.
    pub fn expected_value(&self) -> Option<f64> {
        fn walk(tree: &Tree, idx: usize) -> Option<f64> {
            match &tree.nodes[idx] {
                Node::Leaf { value, .. } => Some(*value),
                Node::Split { left, right, cover, .. } => {
                    let cover = (*cover)?;
                    let left_cover = tree.nodes[*left].cover()?;
                    let right_cover = tree.nodes[*right].cover()?;
                    Some(
                        (left_cover * walk(tree, *left)? + right_cover * walk(tree, *right)?)
                            / cover,
                    )
                }
            }
        }
        walk(self, 0)
    }
}

/// Split rule shared by prediction and attribution.
pub(crate) fn goes_left(value: f64, threshold: f64, default_left: bool) -> bool {
    if value.is_nan() {
        default_left
    } else {
        value < threshold
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Objective {
    #[serde(rename = "reg:squarederror")]
    SquaredError,
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
}

impl Objective {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SquaredError => "reg:squarederror",
            Self::BinaryLogistic => "binary:logistic",
        }
    }
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Complete tree-ensemble model as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeEnsemble {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub algorithm: Option<String>,
    pub objective: Objective,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl TreeEnsemble {
    /// Parses an artifact without validating it; call [`TreeEnsemble::validate`]
    /// once `feature_names` is settled.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| XaiError::InvalidModel(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            XaiError::InvalidModel(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// Whether every node records its training cover, which TreeSHAP needs.
    pub fn has_covers(&self) -> bool {
        self.trees
            .iter()
            .flat_map(|t| t.nodes.iter())
            .all(|n| n.cover().is_some())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(XaiError::InvalidModel(format!("{}: {}", self.name, msg)));

        if self.trees.is_empty() {
            return invalid("ensemble has no trees".to_string());
        }
        if self.feature_names.is_empty() {
            return invalid("no feature names".to_string());
        }
        if !self.base_score.is_finite() {
            return invalid("base_score is not finite".to_string());
        }

        let n_features = self.n_features();
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return invalid(format!("tree {t} is empty"));
            }
            for (idx, node) in tree.nodes.iter().enumerate() {
                if let Some(cover) = node.cover() {
                    if !cover.is_finite() || cover < 0.0 {
                        return invalid(format!("tree {t} node {idx} has invalid cover {cover}"));
                    }
                }
                match node {
                    Node::Leaf { value, .. } => {
                        if !value.is_finite() {
                            return invalid(format!("tree {t} leaf {idx} is not finite"));
                        }
                    }
                    Node::Split { feature, threshold, left, right, cover, .. } => {
                        if *feature >= n_features {
                            return invalid(format!(
                                "tree {t} node {idx} splits on feature {feature}, only {n_features} known"
                            ));
                        }
                        if threshold.is_nan() {
                            return invalid(format!("tree {t} node {idx} has NaN threshold"));
                        }
                        for child in [*left, *right] {
                            if child <= idx || child >= tree.nodes.len() {
                                return invalid(format!(
                                    "tree {t} node {idx} has out-of-order child {child}"
                                ));
                            }
                        }
                        if left == right {
                            return invalid(format!("tree {t} node {idx} has identical children"));
                        }
                        if let (Some(cover), Some(lc), Some(rc)) =
                            (cover, tree.nodes[*left].cover(), tree.nodes[*right].cover())
                        {
                            if *cover <= 0.0 {
                                return invalid(format!("tree {t} split {idx} has zero cover"));
                            }
                            if (cover - (lc + rc)).abs() > COVER_TOLERANCE * cover.max(1.0) {
                                return invalid(format!(
                                    "tree {t} split {idx} cover {cover} != children {}",
                                    lc + rc
                                ));
                            }
                        }
                    }
                }
            }
        }

        if let Some(importances) = &self.feature_importances {
            if importances.len() != n_features {
                return invalid(format!(
                    "{} feature importances for {n_features} features",
                    importances.len()
                ));
            }
            if importances.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return invalid("feature importances must be finite and non-negative".to_string());
            }
        }

        Ok(())
    }

    fn check_width(&self, features: &[f64]) -> Result<()> {
        if features.len() == self.n_features() {
            Ok(())
        } else {
            Err(XaiError::PredictionFailed {
                reason: format!(
                    "{} expects {} features, got {}",
                    self.name,
                    self.n_features(),
                    features.len()
                ),
            })
        }
    }

    /// Raw ensemble output before the objective's link function.
    pub fn predict_margin(&self, features: &[f64]) -> Result<f64> {
        self.check_width(features)?;
        Ok(self.base_score + self.trees.iter().map(|t| t.evaluate(features)).sum::<f64>())
    }

    /// Prediction on the objective's scale (value or probability).
    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        let margin = self.predict_margin(features)?;
        Ok(match self.objective {
            Objective::SquaredError => margin,
            Objective::BinaryLogistic => sigmoid(margin),
        })
    }

    /// Expected margin over the training distribution encoded in the covers.
    pub fn expected_margin(&self) -> Option<f64> {
        self.trees
            .iter()
            .map(Tree::expected_value)
            .sum::<Option<f64>>()
            .map(|sum| self.base_score + sum)
    }

    /// Built-in global importances, normalized to sum to 1: the artifact's
    /// own list when present, else total split gain, else split counts.
    pub fn importances(&self) -> Vec<f64> {
        let raw = if let Some(stored) = &self.feature_importances {
            stored.clone()
        } else {
            let mut gains = vec![0.0; self.n_features()];
            let mut counts = vec![0.0; self.n_features()];
            let mut any_gain = false;
            for node in self.trees.iter().flat_map(|t| t.nodes.iter()) {
                if let Node::Split { feature, gain, .. } = node {
                    counts[*feature] += 1.0;
                    if let Some(gain) = gain {
                        gains[*feature] += gain.max(0.0);
                        any_gain = true;
                    }
                }
            }
            if any_gain {
                gains
            } else {
                counts
            }
        };

        let total: f64 = raw.iter().sum();
        if total > 0.0 {
            raw.iter().map(|v| v / total).collect()
        } else {
            raw
        }
    }
}
