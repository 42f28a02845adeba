use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;
use crate::error::{Result, XaiError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    Performance,
    Injury,
    Match,
}

impl PredictionKind {
    pub const ALL: [Self; 3] = [Self::Performance, Self::Injury, Self::Match];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Injury => "injury",
            Self::Match => "match",
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationMethod {
    TreeShap,
    FeatureImportance,
}

/// A raw attribution as produced by the explainer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawContribution {
    pub feature: String,
    pub shap_value: f64,
}

/// A ranked attribution rescaled so the absolute values of a set sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// Ranked `feature -> contribution` mapping. Serialized as a JSON object whose
/// key order follows the ranking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedImportance(pub Vec<FeatureContribution>);

impl NormalizedImportance {
    pub fn get(&self, feature: &str) -> Option<f64> {
        self.0
            .iter()
            .find(|c| c.feature == feature)
            .map(|c| c.contribution)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureContribution> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for NormalizedImportance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.feature, &entry.contribution)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Explanation {
    pub available: bool,
    pub method: Option<ExplanationMethod>,
    pub base_value: Option<f64>,
    pub top_features: NormalizedImportance,
    pub key_factors: Vec<String>,
    pub shap_values: Vec<RawContribution>,
    pub narrative: Option<String>,
}

impl Explanation {
    /// Placeholder returned when no attribution could be computed. The
    /// prediction itself is still served.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            method: None,
            base_value: None,
            top_features: NormalizedImportance::default(),
            key_factors: vec![reason.into()],
            shap_values: Vec::new(),
            narrative: None,
        }
    }
}

/// Identity and provenance shared by every prediction response.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionMeta {
    pub prediction_id: Uuid,
    pub model_name: String,
    pub model_version: String,
    pub feature_set_version: String,
    pub generated_at: DateTime<Utc>,
}

impl PredictionMeta {
    pub fn new(
        model_name: impl Into<String>,
        model_version: impl Into<String>,
        feature_set_version: impl Into<String>,
    ) -> Self {
        Self {
            prediction_id: Uuid::new_v4(),
            model_name: model_name.into(),
            model_version: model_version.into(),
            feature_set_version: feature_set_version.into(),
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Excellent,
    Good,
    Moderate,
}

impl PerformanceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Self::Excellent
        } else if score >= 70.0 {
            Self::Good
        } else {
            Self::Moderate
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Moderate,
    Low,
}

impl RiskLevel {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 70.0 {
            Self::High
        } else if percentage >= 40.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchVerdict {
    TeamAFavored,
    Competitive,
    TeamBFavored,
}

impl MatchVerdict {
    /// `team_a_percentage` is team A's win probability in percent.
    pub fn from_team_a_percentage(team_a_percentage: f64) -> Self {
        if team_a_percentage > 60.0 {
            Self::TeamAFavored
        } else if team_a_percentage > 40.0 {
            Self::Competitive
        } else {
            Self::TeamBFavored
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformancePrediction {
    #[serde(flatten)]
    pub meta: PredictionMeta,
    pub player: String,
    pub team: String,
    pub predicted_performance: f64,
    pub tier: PerformanceTier,
    pub insight: String,
    pub explanation: Explanation,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InjuryPrediction {
    #[serde(flatten)]
    pub meta: PredictionMeta,
    pub player: String,
    pub team: String,
    pub injury_risk_probability: f64,
    pub injury_risk_percentage: f64,
    pub risk_level: RiskLevel,
    pub insight: String,
    pub explanation: Explanation,
}

impl InjuryPrediction {
    pub fn new(
        meta: PredictionMeta,
        player: String,
        team: String,
        probability: f64,
        explanation: Explanation,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(XaiError::PredictionFailed {
                reason: format!("injury probability {probability} outside [0, 1]"),
            });
        }
        let percentage = round_to(probability * 100.0, 1);

        Ok(Self {
            meta,
            player,
            team,
            injury_risk_probability: round_to(probability, 4),
            injury_risk_percentage: percentage,
            risk_level: RiskLevel::from_percentage(percentage),
            insight: String::new(),
            explanation,
        })
    }
}

/// Aggregate view of one side of a match-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SquadSummary {
    pub label: String,
    pub players: usize,
    pub avg_performance: f64,
    pub avg_injury_risk: f64,
    pub total_goals: f64,
    pub starters: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchSide {
    TeamA,
    TeamB,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MatchPrediction {
    #[serde(flatten)]
    pub meta: PredictionMeta,
    pub team_a: SquadSummary,
    pub team_b: SquadSummary,
    pub team_a_win_probability: f64,
    pub team_b_win_probability: f64,
    pub predicted_winner: MatchSide,
    pub verdict: MatchVerdict,
    pub insight: String,
    pub explanation: Explanation,
}

impl MatchPrediction {
    pub fn new(
        meta: PredictionMeta,
        team_a: SquadSummary,
        team_b: SquadSummary,
        team_a_win_prob: f64,
        explanation: Explanation,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&team_a_win_prob) {
            return Err(XaiError::PredictionFailed {
                reason: format!("win probability {team_a_win_prob} outside [0, 1]"),
            });
        }

        let team_a_pct = round_to(team_a_win_prob * 100.0, 1);
        let team_b_pct = round_to((1.0 - team_a_win_prob) * 100.0, 1);
        let predicted_winner = if team_a_win_prob >= 0.5 {
            MatchSide::TeamA
        } else {
            MatchSide::TeamB
        };

        Ok(Self {
            meta,
            team_a,
            team_b,
            team_a_win_probability: team_a_pct,
            team_b_win_probability: team_b_pct,
            predicted_winner,
            verdict: MatchVerdict::from_team_a_percentage(team_a_pct),
            insight: String::new(),
            explanation,
        })
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
