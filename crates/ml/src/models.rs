// Machine learning models

use std::sync::Arc;
use xai_models::{FeatureVector, Result, XaiError};
use crate::ensemble::{Objective, TreeEnsemble};

/// Raw model output: a scalar for regressors, `[p0, p1]` for classifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Score(f64),
    Probabilities(Vec<f64>),
}

impl ModelOutput {
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::Score(value) => Some(*value),
            Self::Probabilities(_) => None,
        }
    }

    /// Probability of the positive class (index 1).
    pub fn positive_probability(&self) -> Option<f64> {
        match self {
            Self::Score(_) => None,
            Self::Probabilities(probs) => probs.get(1).copied(),
        }
    }
}

pub trait PredictionModel: Send + Sync {
    fn model_name(&self) -> &str;
    fn model_version(&self) -> &str;
    fn feature_names(&self) -> &[String];
    fn predict(&self, row: &[f64]) -> Result<ModelOutput>;

    /// Lays out a named feature vector in the order the model was trained on.
    fn feature_row(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        self.feature_names()
            .iter()
            .map(|name| {
                features.get(name).ok_or_else(|| XaiError::MissingFeature {
                    feature: name.clone(),
                })
            })
            .collect()
    }
}

fn require_objective(ensemble: &TreeEnsemble, expected: Objective) -> Result<()> {
    if ensemble.objective == expected {
        Ok(())
    } else {
        Err(XaiError::InvalidModel(format!(
            "{} has objective {}, expected {}",
            ensemble.name,
            ensemble.objective.as_str(),
            expected.as_str()
        )))
    }
}

pub struct TreeRegressor {
    ensemble: Arc<TreeEnsemble>,
}

impl TreeRegressor {
    pub fn new(ensemble: Arc<TreeEnsemble>) -> Result<Self> {
        require_objective(&ensemble, Objective::SquaredError)?;
        Ok(Self { ensemble })
    }
}

impl PredictionModel for TreeRegressor {
    fn model_name(&self) -> &str {
        &self.ensemble.name
    }

    fn model_version(&self) -> &str {
        &self.ensemble.version
    }

    fn feature_names(&self) -> &[String] {
        &self.ensemble.feature_names
    }

    fn predict(&self, row: &[f64]) -> Result<ModelOutput> {
        self.ensemble.predict(row).map(ModelOutput::Score)
    }
}

pub struct TreeClassifier {
    ensemble: Arc<TreeEnsemble>,
}

impl TreeClassifier {
    pub fn new(ensemble: Arc<TreeEnsemble>) -> Result<Self> {
        require_objective(&ensemble, Objective::BinaryLogistic)?;
        Ok(Self { ensemble })
    }
}

impl PredictionModel for TreeClassifier {
    fn model_name(&self) -> &str {
        &self.ensemble.name
    }

    fn model_version(&self) -> &str {
        &self.ensemble.version
    }

    fn feature_names(&self) -> &[String] {
        &self.ensemble.feature_names
    }

    fn predict(&self, row: &[f64]) -> Result<ModelOutput> {
        let p = self.ensemble.predict(row)?;
        Ok(ModelOutput::Probabilities(vec![1.0 - p, p]))
    }
}
