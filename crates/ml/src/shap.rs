//! Feature attribution for tree ensembles.
//!
//! [`TreeExplainer`] implements exact path-dependent TreeSHAP (Lundberg et
//! al., "Consistent Individualized Feature Attribution for Tree Ensembles").
//! For every leaf it tracks the unique features on the root-to-leaf path
//! together with the fraction of "feature unknown" (cover-weighted) and
//! "feature known" flow through them, and the permutation weights of every
//! subset size. Attributions are in margin space, so
//! `Σ φ + expected_margin == margin(x)`.

use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use xai_models::{ExplanationMethod, Result, XaiError};
use crate::ensemble::{goes_left, Node, Tree, TreeEnsemble};

/// Per-sample attribution vector, aligned with the model's feature names.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    pub values: Vec<f64>,
    /// Expected model output the values are measured against, when known.
    pub base_value: Option<f64>,
}

pub trait Explainer: Send + Sync {
    fn method(&self) -> ExplanationMethod;
    fn attributions(&self, row: &[f64]) -> Result<Attribution>;
}

/// Which explainer to bind to a loaded model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainerChoice {
    /// TreeSHAP when the artifact records covers, importances otherwise.
    #[default]
    Auto,
    TreeShap,
    Importance,
}

/// Binds an explainer to `ensemble`, or `None` when the requested method
/// cannot run on it.
pub fn build_explainer(
    ensemble: &Arc<TreeEnsemble>,
    choice: ExplainerChoice,
) -> Option<Arc<dyn Explainer>> {
    let tree_shap = || match TreeExplainer::new(Arc::clone(ensemble)) {
        Ok(explainer) => Some(Arc::new(explainer) as Arc<dyn Explainer>),
        Err(e) => {
            warn!("⚠️ TreeSHAP unavailable for {}: {}", ensemble.name, e);
            None
        }
    };
    let importance =
        || Some(Arc::new(ImportanceExplainer::new(Arc::clone(ensemble))) as Arc<dyn Explainer>);

    let explainer = match choice {
        ExplainerChoice::TreeShap => tree_shap(),
        ExplainerChoice::Importance => importance(),
        ExplainerChoice::Auto if ensemble.has_covers() => tree_shap(),
        ExplainerChoice::Auto => importance(),
    };

    if let Some(explainer) = &explainer {
        info!("🔍 {} explained with {:?}", ensemble.name, explainer.method());
    }
    explainer
}

fn check_width(ensemble: &TreeEnsemble, row: &[f64]) -> Result<()> {
    if row.len() == ensemble.n_features() {
        Ok(())
    } else {
        Err(XaiError::AttributionShape {
            expected: ensemble.n_features(),
            actual: row.len(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let scale = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / scale;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / scale;
    }
}

/// Undoes the extension that added `path[index]`.
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one * scale / ((i + 1) as f64 * one_fraction);
            next_one = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / scale;
        } else {
            path[i].weight = path[i].weight * scale / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight the path would have without `path[index]`.
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let scale = (depth + 1) as f64;
    let mut next_one = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one * scale / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one = path[i].weight - tmp * zero_fraction * (depth - i) as f64 / scale;
        } else if zero_fraction != 0.0 {
            total += path[i].weight / zero_fraction / ((depth - i) as f64 / scale);
        }
    }
    total
}

struct TreeWalk<'a> {
    tree: &'a Tree,
    row: &'a [f64],
    phi: &'a mut [f64],
}

impl TreeWalk<'_> {
    fn recurse(
        &mut self,
        idx: usize,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path.to_vec();
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        let tree = self.tree;
        match &tree.nodes[idx] {
            Node::Leaf { value, .. } => {
                for i in 1..path.len() {
                    let element = path[i];
                    if let Some(f) = element.feature {
                        let weight = unwound_path_sum(&path, i);
                        self.phi[f] +=
                            weight * (element.one_fraction - element.zero_fraction) * value;
                    }
                }
            }
            Node::Split { feature: split, threshold, left, right, default_left, cover, .. } => {
                let (hot, cold) = if goes_left(self.row[*split], *threshold, *default_left) {
                    (*left, *right)
                } else {
                    (*right, *left)
                };
                // covers are checked by TreeExplainer::new
                let cover = cover.unwrap_or(0.0);
                let hot_zero = tree.nodes[hot].cover().unwrap_or(0.0) / cover;
                let cold_zero = tree.nodes[cold].cover().unwrap_or(0.0) / cover;

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                // a branch with no flow either way contributes nothing
                if hot_zero * incoming_zero != 0.0 || incoming_one != 0.0 {
                    self.recurse(hot, &path, hot_zero * incoming_zero, incoming_one, Some(*split));
                }
                if cold_zero * incoming_zero != 0.0 {
                    self.recurse(cold, &path, cold_zero * incoming_zero, 0.0, Some(*split));
                }
            }
        }
    }
}

/// Exact path-dependent TreeSHAP over a tree ensemble with covers.
pub struct TreeExplainer {
    ensemble: Arc<TreeEnsemble>,
    expected_value: f64,
}

impl TreeExplainer {
    pub fn new(ensemble: Arc<TreeEnsemble>) -> Result<Self> {
        let expected_value = ensemble.expected_margin().ok_or_else(|| {
            XaiError::InvalidModel(format!("{} does not record node covers", ensemble.name))
        })?;
        Ok(Self { ensemble, expected_value })
    }

    /// Mean margin over the training data.
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    pub fn shap_values(&self, row: &[f64]) -> Result<Vec<f64>> {
        check_width(&self.ensemble, row)?;
        let mut phi = vec![0.0; self.ensemble.n_features()];
        for tree in &self.ensemble.trees {
            TreeWalk { tree, row, phi: &mut phi }.recurse(0, &[], 1.0, 1.0, None);
        }
        Ok(phi)
    }
}

impl Explainer for TreeExplainer {
    fn method(&self) -> ExplanationMethod {
        ExplanationMethod::TreeShap
    }

    fn attributions(&self, row: &[f64]) -> Result<Attribution> {
        Ok(Attribution {
            values: self.shap_values(row)?,
            base_value: Some(self.expected_value),
        })
    }
}

/// Falls back to the model's global importances; the same for every sample.
pub struct ImportanceExplainer {
    ensemble: Arc<TreeEnsemble>,
    importances: Vec<f64>,
}

impl ImportanceExplainer {
    pub fn new(ensemble: Arc<TreeEnsemble>) -> Self {
        let importances = ensemble.importances();
        Self { ensemble, importances }
    }
}

impl Explainer for ImportanceExplainer {
    fn method(&self) -> ExplanationMethod {
        ExplanationMethod::FeatureImportance
    }

    fn attributions(&self, row: &[f64]) -> Result<Attribution> {
        check_width(&self.ensemble, row)?;
        Ok(Attribution {
            values: self.importances.clone(),
            base_value: None,
        })
    }
}
