use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the player dataset. Numeric stats are optional because the
/// source CSV leaves gaps; consumers decide how to fill them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerRecord {
    pub player_name: String,
    pub team: String,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub age: Option<f64>,
    pub minutes_played: Option<f64>,
    pub matches_played: Option<f64>,
    pub goals: Option<f64>,
    pub assists: Option<f64>,
    pub passes: Option<f64>,
    pub shots: Option<f64>,
    pub tackles: Option<f64>,
    pub injuries_last_season: Option<f64>,
    pub is_starting_xi: Option<bool>,
    pub performance_score: Option<f64>,
    pub injury_risk: Option<f64>,
}

impl PlayerRecord {
    pub fn new(player_name: impl Into<String>, team: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            team: team.into(),
            ..Self::default()
        }
    }

    pub fn is_starter(&self) -> bool {
        self.is_starting_xi.unwrap_or(false)
    }
}

/// Named model inputs for one subject (a player or a match-up), tagged with
/// the feature-set version that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub subject: String,
    pub feature_set_version: String,
    pub features: HashMap<String, f64>,
}

impl FeatureVector {
    pub fn new(subject: impl Into<String>, feature_set_version: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            feature_set_version: feature_set_version.into(),
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, name: impl Into<String>, value: f64) -> Self {
        self.features.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.features.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
