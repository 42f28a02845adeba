// Loaded models and their explainers

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use serde::Serialize;
use tracing::{info, warn};
use xai_ml::{
    build_explainer, feature_set, ExplainerChoice, Explainer, FeatureEngineer, PredictionModel,
    TreeClassifier, TreeEnsemble, TreeRegressor, FEATURE_SET_V1, FEATURE_SET_V2,
};
use xai_models::{ExplanationMethod, PredictionKind, Result, XaiError};

/// Metadata surfaced by `GET /api/models`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelInfo {
    pub kind: PredictionKind,
    pub name: String,
    pub version: String,
    pub algorithm: Option<String>,
    pub objective: String,
    pub artifact: String,
    pub feature_set_version: String,
    pub feature_names: Vec<String>,
    pub num_trees: usize,
    pub max_depth: usize,
    pub explainer: Option<ExplanationMethod>,
    pub metrics: BTreeMap<String, f64>,
}

pub struct ModelSlot {
    pub model: Arc<dyn PredictionModel>,
    pub explainer: Option<Arc<dyn Explainer>>,
    pub info: ModelInfo,
}

/// One model per prediction kind, loaded once at startup.
pub struct ModelRegistry {
    feature_set_version: String,
    slots: HashMap<PredictionKind, ModelSlot>,
}

fn artifact_stem(kind: PredictionKind) -> &'static str {
    match kind {
        PredictionKind::Performance => "performance_model",
        PredictionKind::Injury => "injury_risk_model",
        PredictionKind::Match => "match_outcome_model",
    }
}

impl ModelRegistry {
    /// `performance_model.json` for v1, `performance_model_v2.json` for v2.
    pub fn artifact_file(kind: PredictionKind, version: &str) -> String {
        let stem = artifact_stem(kind);
        if version == FEATURE_SET_V1 {
            format!("{stem}.json")
        } else {
            format!("{stem}_{version}.json")
        }
    }

    pub fn load(dir: &Path, version: &str, choice: ExplainerChoice) -> Result<Self> {
        check_version(version)?;

        let mut ensembles = Vec::with_capacity(PredictionKind::ALL.len());
        for kind in PredictionKind::ALL {
            let file = Self::artifact_file(kind, version);
            let path = dir.join(&file);
            if !path.exists() {
                return Err(XaiError::InvalidModel(format!(
                    "{} model not found at {}",
                    kind,
                    path.display()
                )));
            }
            let ensemble = TreeEnsemble::from_path(&path)?;
            ensembles.push((kind, file, ensemble));
        }

        Self::from_ensembles(version, ensembles, choice)
    }

    /// Binds already-parsed artifacts; `load` funnels through here.
    pub fn from_ensembles(
        version: &str,
        ensembles: Vec<(PredictionKind, String, TreeEnsemble)>,
        choice: ExplainerChoice,
    ) -> Result<Self> {
        check_version(version)?;

        let mut slots = HashMap::new();
        for (kind, artifact, ensemble) in ensembles {
            let ensemble = Arc::new(prepare(kind, version, ensemble)?);
            let model: Arc<dyn PredictionModel> = match kind {
                PredictionKind::Performance | PredictionKind::Injury => {
                    Arc::new(TreeRegressor::new(Arc::clone(&ensemble))?)
                }
                PredictionKind::Match => Arc::new(TreeClassifier::new(Arc::clone(&ensemble))?),
            };

            let explainer = build_explainer(&ensemble, choice);
            if explainer.is_none() {
                warn!("⚠️ No explainer for {} model, explanations will be unavailable", kind);
            }

            let info = ModelInfo {
                kind,
                name: ensemble.name.clone(),
                version: ensemble.version.clone(),
                algorithm: ensemble.algorithm.clone(),
                objective: ensemble.objective.as_str().to_string(),
                artifact,
                feature_set_version: version.to_string(),
                feature_names: ensemble.feature_names.clone(),
                num_trees: ensemble.num_trees(),
                max_depth: ensemble.max_depth(),
                explainer: explainer.as_ref().map(|e| e.method()),
                metrics: ensemble.metrics.clone(),
            };
            info!(
                "🧠 Loaded {} model {} ({} trees, {} features)",
                kind,
                info.name,
                info.num_trees,
                info.feature_names.len()
            );

            slots.insert(kind, ModelSlot { model, explainer, info });
        }

        if let Some(kind) = PredictionKind::ALL.iter().find(|k| !slots.contains_key(*k)) {
            return Err(XaiError::InvalidModel(format!("no {kind} model loaded")));
        }

        Ok(Self {
            feature_set_version: version.to_string(),
            slots,
        })
    }

    pub fn feature_set_version(&self) -> &str {
        &self.feature_set_version
    }

    pub fn slot(&self, kind: PredictionKind) -> Result<&ModelSlot> {
        self.slots
            .get(&kind)
            .ok_or_else(|| XaiError::InvalidModel(format!("no {kind} model loaded")))
    }

    /// Model metadata in a stable order.
    pub fn models(&self) -> Vec<&ModelInfo> {
        PredictionKind::ALL
            .iter()
            .filter_map(|kind| self.slots.get(kind).map(|slot| &slot.info))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn check_version(version: &str) -> Result<()> {
    if version == FEATURE_SET_V1 || version == FEATURE_SET_V2 {
        Ok(())
    } else {
        Err(XaiError::Config(format!("unknown feature-set version '{version}'")))
    }
}

/// Fills default feature names, validates the artifact and makes sure the
/// feature engineer can produce every input it asks for.
fn prepare(kind: PredictionKind, version: &str, mut ensemble: TreeEnsemble) -> Result<TreeEnsemble> {
    if ensemble.name.is_empty() {
        ensemble.name = artifact_stem(kind).to_string();
    }
    if ensemble.feature_names.is_empty() {
        if let Some(names) = feature_set(kind, version) {
            ensemble.feature_names = names.iter().map(|s| s.to_string()).collect();
        }
    }

    ensemble.validate()?;

    if let Some(unknown) = ensemble
        .feature_names
        .iter()
        .find(|name| !FeatureEngineer::is_known(kind, name))
    {
        return Err(XaiError::InvalidModel(format!(
            "{} asks for unknown feature '{}'",
            ensemble.name, unknown
        )));
    }

    Ok(ensemble)
}
