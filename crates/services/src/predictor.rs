// Prediction service

use std::sync::Arc;
use tracing::{debug, info, warn};
use xai_data::Dataset;
use xai_ml::{
    explain, narrative, EngineeredFeatures, FeatureContext, FeatureEngineer, ModelOutput,
};
use xai_models::{
    Explanation, InjuryPrediction, MatchPrediction, MatchRequest, PerformancePrediction,
    PerformanceTier, PlayerRecord, PlayerRequest, PredictionKind, PredictionMeta, Result,
    SquadSelector, XaiError, round_to,
};
use crate::metrics::MetricsCollector;
use crate::registry::{ModelRegistry, ModelSlot};

const EXPLAINER_NOT_LOADED: &str = "SHAP explainer not loaded";
const EXPLANATION_UNAVAILABLE: &str = "SHAP explanation unavailable";

/// Composes dataset lookup, feature engineering, model inference and
/// explanation for each prediction kind.
pub struct PredictorService {
    dataset: Arc<Dataset>,
    registry: Arc<ModelRegistry>,
    engineer: FeatureEngineer,
    top_k: usize,
    metrics: Arc<MetricsCollector>,
}

impl PredictorService {
    pub fn new(
        dataset: Arc<Dataset>,
        registry: Arc<ModelRegistry>,
        top_k: usize,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let context = FeatureContext::from_dataset(&dataset);
        info!(
            "⚙️ Feature set {} (high workload above {:.0} minutes)",
            registry.feature_set_version(),
            context.high_workload_minutes
        );
        let engineer = FeatureEngineer::new(context, registry.feature_set_version());

        Self {
            dataset,
            registry,
            engineer,
            top_k,
            metrics,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Full engineered catalogue for one player.
    pub fn player_features(&self, player_name: &str) -> Result<EngineeredFeatures> {
        let record = self.dataset.require_player(player_name)?;
        Ok(self.engineer.engineer(record))
    }

    pub fn predict_performance(&self, request: &PlayerRequest) -> Result<PerformancePrediction> {
        self.instrumented(PredictionKind::Performance, || {
            let record = self.dataset.require_player(&request.player_name)?;
            let slot = self.registry.slot(PredictionKind::Performance)?;

            let vector = self.engineer.player_vector(record, slot.model.feature_names())?;
            let row = slot.model.feature_row(&vector)?;
            let score = expect_score(slot.model.predict(&row)?)?;
            let score = round_to(score, 2);
            let tier = PerformanceTier::from_score(score);

            Ok(PerformancePrediction {
                meta: self.meta(slot),
                player: record.player_name.clone(),
                team: record.team.clone(),
                predicted_performance: score,
                tier,
                insight: narrative::performance_insight(tier).to_string(),
                explanation: self.explanation(PredictionKind::Performance, slot, &row),
            })
        })
    }

    pub fn predict_injury(&self, request: &PlayerRequest) -> Result<InjuryPrediction> {
        self.instrumented(PredictionKind::Injury, || {
            let record = self.dataset.require_player(&request.player_name)?;
            let slot = self.registry.slot(PredictionKind::Injury)?;

            let vector = self.engineer.player_vector(record, slot.model.feature_names())?;
            let row = slot.model.feature_row(&vector)?;
            let probability = expect_score(slot.model.predict(&row)?)?.clamp(0.0, 1.0);

            let mut prediction = InjuryPrediction::new(
                self.meta(slot),
                record.player_name.clone(),
                record.team.clone(),
                probability,
                self.explanation(PredictionKind::Injury, slot, &row),
            )?;
            prediction.insight = narrative::injury_insight(prediction.risk_level).to_string();
            Ok(prediction)
        })
    }

    pub fn predict_match(&self, request: &MatchRequest) -> Result<MatchPrediction> {
        self.instrumented(PredictionKind::Match, || {
            let rows_a = self.squad_rows(&request.team_a)?;
            let rows_b = self.squad_rows(&request.team_b)?;
            if !rows_a.is_empty() && same_rows(&rows_a, &rows_b) {
                return Err(XaiError::InvalidRequest(
                    "team_a and team_b must differ".to_string(),
                ));
            }

            let team_a = self.engineer.aggregate(&request.team_a.label(), &rows_a)?;
            let team_b = self.engineer.aggregate(&request.team_b.label(), &rows_b)?;
            let slot = self.registry.slot(PredictionKind::Match)?;

            let vector = self
                .engineer
                .match_vector(&team_a, &team_b, slot.model.feature_names())?;
            let row = slot.model.feature_row(&vector)?;
            let output = slot.model.predict(&row)?;
            let win_probability =
                output
                    .positive_probability()
                    .ok_or_else(|| XaiError::PredictionFailed {
                        reason: "match model did not return class probabilities".to_string(),
                    })?;

            let mut prediction = MatchPrediction::new(
                self.meta(slot),
                team_a.summary(),
                team_b.summary(),
                win_probability,
                self.explanation(PredictionKind::Match, slot, &row),
            )?;
            prediction.insight = narrative::match_insight(prediction.verdict).to_string();
            Ok(prediction)
        })
    }

    fn instrumented<T>(&self, kind: PredictionKind, run: impl FnOnce() -> Result<T>) -> Result<T> {
        let tracker = self.metrics.start_latency_tracking(kind);
        let result = run();
        tracker.finish(&self.metrics);
        self.metrics.record_prediction(kind, result.is_ok());
        if let Err(e) = &result {
            debug!("{} prediction failed: {}", kind, e);
        }
        result
    }

    fn meta(&self, slot: &ModelSlot) -> PredictionMeta {
        PredictionMeta::new(
            slot.model.model_name(),
            slot.model.model_version(),
            self.engineer.version(),
        )
    }

    /// Never fails: a missing explainer or a bad attribution degrades to an
    /// unavailable explanation.
    fn explanation(&self, kind: PredictionKind, slot: &ModelSlot, row: &[f64]) -> Explanation {
        let Some(explainer) = &slot.explainer else {
            self.metrics.record_explanation_unavailable(kind);
            return Explanation::unavailable(EXPLAINER_NOT_LOADED);
        };

        match explain(kind, explainer.as_ref(), row, slot.model.feature_names(), self.top_k) {
            Ok(explanation) => explanation,
            Err(e) => {
                warn!("⚠️ {} explanation failed: {}", kind, e);
                self.metrics.record_explanation_unavailable(kind);
                Explanation::unavailable(EXPLANATION_UNAVAILABLE)
            }
        }
    }

    fn squad_rows(&self, selector: &SquadSelector) -> Result<Vec<&PlayerRecord>> {
        let records = match selector {
            SquadSelector::Team(team) => {
                if !self.dataset.has_team(team) {
                    return Err(XaiError::TeamNotFound { team: team.clone() });
                }
                self.dataset.team_players(team)
            }
            SquadSelector::Players(names) => {
                let missing = self.dataset.missing_players(names);
                if !missing.is_empty() {
                    return Err(XaiError::PlayersNotFound { names: missing });
                }
                self.dataset.players_by_names(names)
            }
        };

        Ok(records)
    }
}

/// Whether two squads resolve to the same dataset rows, ignoring order.
fn same_rows(a: &[&PlayerRecord], b: &[&PlayerRecord]) -> bool {
    let rows = |squad: &[&PlayerRecord]| {
        let mut ptrs: Vec<*const PlayerRecord> = squad.iter().map(|r| *r as *const _).collect();
        ptrs.sort_unstable();
        ptrs.dedup();
        ptrs
    };
    rows(a) == rows(b)
}

fn expect_score(output: ModelOutput) -> Result<f64> {
    output.score().ok_or_else(|| XaiError::PredictionFailed {
        reason: "regression model returned class probabilities".to_string(),
    })
}
