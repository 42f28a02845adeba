// Feature engineering

use serde::Serialize;
use tracing::debug;
use xai_data::Dataset;
use xai_models::{FeatureVector, PlayerRecord, PredictionKind, Result, SquadSummary, XaiError};

pub const FEATURE_SET_V1: &str = "v1";
pub const FEATURE_SET_V2: &str = "v2";

const PERFORMANCE_V1: &[&str] = &[
    "minutes_played", "goals", "assists", "passes", "shots", "tackles", "matches_played", "age",
];

const PERFORMANCE_V2: &[&str] = &[
    "minutes_played", "matches_played", "goals", "assists", "passes", "shots", "tackles",
    "goals_per_match", "assists_per_match", "actions_per_90", "shot_accuracy",
    "pass_success_rate", "age", "is_young", "is_veteran", "is_starter", "full_season",
];

const INJURY_V1: &[&str] = &["age", "minutes_played", "matches_played", "injuries_last_season"];

const INJURY_V2: &[&str] = &[
    "age", "minutes_played", "matches_played", "injuries_last_season",
    "injury_frequency", "is_injury_prone", "is_young", "is_veteran",
    "high_workload", "full_season",
];

const MATCH_V1: &[&str] = &[
    "team_a_avg_performance", "team_a_avg_injury_risk", "team_a_total_goals",
    "team_a_total_assists", "team_a_total_passes",
    "team_b_avg_performance", "team_b_avg_injury_risk", "team_b_total_goals",
    "team_b_total_assists", "team_b_total_passes",
];

const MATCH_V2: &[&str] = &[
    "team_a_performance", "team_a_injury_risk", "team_a_goals", "team_a_starters",
    "team_a_goals_per_match",
    "team_b_performance", "team_b_injury_risk", "team_b_goals", "team_b_starters",
    "team_b_goals_per_match",
];

/// The default input columns for a model kind under a feature-set version.
pub fn feature_set(kind: PredictionKind, version: &str) -> Option<&'static [&'static str]> {
    match (kind, version) {
        (PredictionKind::Performance, FEATURE_SET_V1) => Some(PERFORMANCE_V1),
        (PredictionKind::Performance, FEATURE_SET_V2) => Some(PERFORMANCE_V2),
        (PredictionKind::Injury, FEATURE_SET_V1) => Some(INJURY_V1),
        (PredictionKind::Injury, FEATURE_SET_V2) => Some(INJURY_V2),
        (PredictionKind::Match, FEATURE_SET_V1) => Some(MATCH_V1),
        (PredictionKind::Match, FEATURE_SET_V2) => Some(MATCH_V2),
        _ => None,
    }
}

/// Dataset-wide statistics some features are defined against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureContext {
    /// 75th percentile of `minutes_played`; above it a player has a high workload.
    pub high_workload_minutes: f64,
}

impl FeatureContext {
    pub fn new(high_workload_minutes: f64) -> Self {
        Self { high_workload_minutes }
    }

    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self::new(dataset.minutes_quantile(0.75))
    }
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Every per-player feature the models can ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EngineeredFeatures {
    pub minutes_played: f64,
    pub matches_played: f64,
    pub goals: f64,
    pub assists: f64,
    pub passes: f64,
    pub shots: f64,
    pub tackles: f64,
    pub age: f64,
    pub injuries_last_season: f64,
    pub goals_per_match: f64,
    pub assists_per_match: f64,
    pub passes_per_match: f64,
    pub total_actions: f64,
    pub actions_per_90: f64,
    pub shot_accuracy: f64,
    pub pass_success_rate: f64,
    pub injury_frequency: f64,
    pub is_injury_prone: f64,
    pub is_young: f64,
    pub is_veteran: f64,
    pub high_workload: f64,
    pub full_season: f64,
    pub is_starter: f64,
}

impl EngineeredFeatures {
    pub const NAMES: &'static [&'static str] = &[
        "minutes_played", "matches_played", "goals", "assists", "passes", "shots", "tackles",
        "age", "injuries_last_season", "goals_per_match", "assists_per_match",
        "passes_per_match", "total_actions", "actions_per_90", "shot_accuracy",
        "pass_success_rate", "injury_frequency", "is_injury_prone", "is_young", "is_veteran",
        "high_workload", "full_season", "is_starter",
    ];

    /// Derives the catalogue from a raw record. Missing stats read as zero.
    pub fn derive(record: &PlayerRecord, context: &FeatureContext) -> Self {
        let minutes = record.minutes_played.unwrap_or(0.0);
        let matches = record.matches_played.unwrap_or(0.0);
        let goals = record.goals.unwrap_or(0.0);
        let assists = record.assists.unwrap_or(0.0);
        let passes = record.passes.unwrap_or(0.0);
        let shots = record.shots.unwrap_or(0.0);
        let tackles = record.tackles.unwrap_or(0.0);
        let age = record.age.unwrap_or(0.0);
        let injuries = record.injuries_last_season.unwrap_or(0.0);

        let total_actions = goals + assists + tackles;

        Self {
            minutes_played: minutes,
            matches_played: matches,
            goals,
            assists,
            passes,
            shots,
            tackles,
            age,
            injuries_last_season: injuries,
            goals_per_match: goals / (matches + 1.0),
            assists_per_match: assists / (matches + 1.0),
            passes_per_match: passes / (matches + 1.0),
            total_actions,
            actions_per_90: total_actions * 90.0 / (minutes + 1.0),
            shot_accuracy: goals / (shots + 1.0),
            pass_success_rate: passes / (passes + shots + 1.0),
            injury_frequency: injuries / (matches + 1.0),
            is_injury_prone: flag(injuries > 1.0),
            is_young: flag(age < 25.0),
            is_veteran: flag(age > 32.0),
            high_workload: flag(minutes > context.high_workload_minutes),
            full_season: flag(matches > 30.0),
            is_starter: flag(record.is_starter()),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "minutes_played" => self.minutes_played,
            "matches_played" => self.matches_played,
            "goals" => self.goals,
            "assists" => self.assists,
            "passes" => self.passes,
            "shots" => self.shots,
            "tackles" => self.tackles,
            "age" => self.age,
            "injuries_last_season" => self.injuries_last_season,
            "goals_per_match" => self.goals_per_match,
            "assists_per_match" => self.assists_per_match,
            "passes_per_match" => self.passes_per_match,
            "total_actions" => self.total_actions,
            "actions_per_90" => self.actions_per_90,
            "shot_accuracy" => self.shot_accuracy,
            "pass_success_rate" => self.pass_success_rate,
            "injury_frequency" => self.injury_frequency,
            "is_injury_prone" => self.is_injury_prone,
            "is_young" => self.is_young,
            "is_veteran" => self.is_veteran,
            "high_workload" => self.high_workload,
            "full_season" => self.full_season,
            "is_starter" => self.is_starter,
            _ => return None,
        };
        Some(value)
    }
}

/// Squad-level aggregate feeding the match model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamAggregate {
    pub label: String,
    pub players: usize,
    pub performance: f64,
    pub injury_risk: f64,
    pub goals: f64,
    pub starters: usize,
    pub goals_per_match: f64,
    pub assists: f64,
    pub passes: f64,
    pub age: f64,
    pub injury_prone: usize,
}

fn mean_present(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl TeamAggregate {
    /// Value for a match feature suffix such as `goals` or `avg_performance`.
    pub fn get(&self, suffix: &str) -> Option<f64> {
        let value = match suffix {
            "performance" | "avg_performance" => self.performance,
            "injury_risk" | "avg_injury_risk" => self.injury_risk,
            "goals" | "total_goals" => self.goals,
            "starters" | "num_starters" => self.starters as f64,
            "goals_per_match" | "avg_goals_per_match" => self.goals_per_match,
            "assists" | "total_assists" => self.assists,
            "passes" | "total_passes" => self.passes,
            "age" | "avg_age" => self.age,
            "injury_prone_count" => self.injury_prone as f64,
            _ => return None,
        };
        Some(value)
    }

    pub fn summary(&self) -> SquadSummary {
        SquadSummary {
            label: self.label.clone(),
            players: self.players,
            avg_performance: self.performance,
            avg_injury_risk: self.injury_risk,
            total_goals: self.goals,
            starters: self.starters,
        }
    }
}

/// Turns dataset rows into model inputs. One engineer serves every endpoint
/// so training-time and request-time derivations cannot drift apart.
#[derive(Debug, Clone)]
pub struct FeatureEngineer {
    context: FeatureContext,
    version: String,
}

impl FeatureEngineer {
    pub fn new(context: FeatureContext, version: impl Into<String>) -> Self {
        Self {
            context,
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether a model of `kind` may ask for `name`.
    pub fn is_known(kind: PredictionKind, name: &str) -> bool {
        match kind {
            PredictionKind::Performance | PredictionKind::Injury => {
                EngineeredFeatures::NAMES.contains(&name)
            }
            PredictionKind::Match => split_side(name)
                .is_some_and(|(_, suffix)| TeamAggregate::default().get(suffix).is_some()),
        }
    }

    pub fn engineer(&self, record: &PlayerRecord) -> EngineeredFeatures {
        EngineeredFeatures::derive(record, &self.context)
    }

    pub fn player_vector(&self, record: &PlayerRecord, names: &[String]) -> Result<FeatureVector> {
        let features = self.engineer(record);
        let mut vector = FeatureVector::new(record.player_name.clone(), self.version.clone());
        for name in names {
            let value = features.get(name).ok_or_else(|| XaiError::UnknownFeature {
                feature: name.clone(),
            })?;
            vector.insert(name.clone(), value);
        }
        debug!("engineered {} features for {}", vector.len(), record.player_name);
        Ok(vector)
    }

    pub fn aggregate(&self, label: &str, records: &[&PlayerRecord]) -> Result<TeamAggregate> {
        if records.is_empty() {
            return Err(XaiError::EmptySquad {
                label: label.to_string(),
            });
        }

        let engineered: Vec<EngineeredFeatures> =
            records.iter().map(|r| self.engineer(r)).collect();

        Ok(TeamAggregate {
            label: label.to_string(),
            players: records.len(),
            performance: mean_present(records.iter().map(|r| r.performance_score)),
            injury_risk: mean_present(records.iter().map(|r| r.injury_risk)),
            goals: engineered.iter().map(|f| f.goals).sum(),
            starters: records.iter().filter(|r| r.is_starter()).count(),
            goals_per_match: mean_present(engineered.iter().map(|f| Some(f.goals_per_match))),
            assists: engineered.iter().map(|f| f.assists).sum(),
            passes: engineered.iter().map(|f| f.passes).sum(),
            age: mean_present(records.iter().map(|r| r.age)),
            injury_prone: engineered.iter().filter(|f| f.is_injury_prone > 0.0).count(),
        })
    }

    pub fn match_vector(
        &self,
        team_a: &TeamAggregate,
        team_b: &TeamAggregate,
        names: &[String],
    ) -> Result<FeatureVector> {
        let subject = format!("{} vs {}", team_a.label, team_b.label);
        let mut vector = FeatureVector::new(subject, self.version.clone());

        for name in names {
            let value = split_side(name)
                .and_then(|(side, suffix)| match side {
                    Side::A => team_a.get(suffix),
                    Side::B => team_b.get(suffix),
                })
                .ok_or_else(|| XaiError::UnknownFeature {
                    feature: name.clone(),
                })?;
            vector.insert(name.clone(), value);
        }
        Ok(vector)
    }
}

enum Side {
    A,
    B,
}

fn split_side(name: &str) -> Option<(Side, &str)> {
    if let Some(suffix) = name.strip_prefix("team_a_") {
        Some((Side::A, suffix))
    } else {
        name.strip_prefix("team_b_").map(|suffix| (Side::B, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saka() -> PlayerRecord {
        PlayerRecord {
            age: Some(22.0),
            minutes_played: Some(2900.0),
            matches_played: Some(35.0),
            goals: Some(14.0),
            assists: Some(11.0),
            passes: Some(1200.0),
            shots: Some(80.0),
            tackles: Some(30.0),
            injuries_last_season: Some(1.0),
            is_starting_xi: Some(true),
            performance_score: Some(86.5),
            injury_risk: Some(0.21),
            ..PlayerRecord::new("Bukayo Saka", "Arsenal")
        }
    }

    fn james() -> PlayerRecord {
        PlayerRecord {
            age: Some(33.0),
            minutes_played: Some(900.0),
            matches_played: Some(12.0),
            goals: Some(1.0),
            assists: Some(2.0),
            passes: Some(500.0),
            shots: Some(10.0),
            tackles: Some(20.0),
            injuries_last_season: Some(4.0),
            is_starting_xi: Some(false),
            performance_score: Some(65.0),
            injury_risk: None,
            ..PlayerRecord::new("Reece James", "Chelsea")
        }
    }

    fn engineer() -> FeatureEngineer {
        FeatureEngineer::new(FeatureContext::new(2500.0), FEATURE_SET_V2)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_ratio_features() {
        let f = engineer().engineer(&saka());

        assert!(close(f.goals_per_match, 14.0 / 36.0));
        assert!(close(f.assists_per_match, 11.0 / 36.0));
        assert!(close(f.passes_per_match, 1200.0 / 36.0));
        assert!(close(f.total_actions, 55.0));
        assert!(close(f.actions_per_90, 55.0 * 90.0 / 2901.0));
        assert!(close(f.shot_accuracy, 14.0 / 81.0));
        assert!(close(f.pass_success_rate, 1200.0 / 1281.0));
        assert!(close(f.injury_frequency, 1.0 / 36.0));
    }

    #[test]
    fn test_indicator_features() {
        let e = engineer();
        let young = e.engineer(&saka());
        assert_eq!(young.is_young, 1.0);
        assert_eq!(young.is_veteran, 0.0);
        assert_eq!(young.is_injury_prone, 0.0);
        assert_eq!(young.high_workload, 1.0);
        assert_eq!(young.full_season, 1.0);
        assert_eq!(young.is_starter, 1.0);

        let veteran = e.engineer(&james());
        assert_eq!(veteran.is_young, 0.0);
        assert_eq!(veteran.is_veteran, 1.0);
        assert_eq!(veteran.is_injury_prone, 1.0);
        assert_eq!(veteran.high_workload, 0.0);
        assert_eq!(veteran.full_season, 0.0);
        assert_eq!(veteran.is_starter, 0.0);
    }

    #[test]
    fn test_missing_stats_read_as_zero() {
        let f = engineer().engineer(&PlayerRecord::new("Unknown", "Nowhere"));
        assert_eq!(f.goals_per_match, 0.0);
        assert_eq!(f.actions_per_90, 0.0);
        // a missing age reads as 0 and so counts as young
        assert_eq!(f.is_young, 1.0);
        assert!(f.pass_success_rate.is_finite());
    }

    #[test]
    fn test_every_catalogue_name_resolves() {
        let f = engineer().engineer(&saka());
        for name in EngineeredFeatures::NAMES {
            assert!(f.get(name).is_some(), "{name} missing");
        }
        assert!(f.get("dribbles").is_none());
    }

    #[test]
    fn test_player_vector_follows_requested_names() {
        let names: Vec<String> = feature_set(PredictionKind::Injury, FEATURE_SET_V2)
            .unwrap()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let vector = engineer().player_vector(&james(), &names).unwrap();

        assert_eq!(vector.len(), names.len());
        assert_eq!(vector.feature_set_version, "v2");
        assert_eq!(vector.get("injuries_last_season"), Some(4.0));

        let err = engineer()
            .player_vector(&james(), &["dribbles".to_string()])
            .unwrap_err();
        assert!(matches!(err, XaiError::UnknownFeature { .. }));
    }

    #[test]
    fn test_team_aggregate() {
        let (a, b) = (saka(), james());
        let aggregate = engineer().aggregate("Mixed", &[&a, &b]).unwrap();

        assert_eq!(aggregate.players, 2);
        assert!(close(aggregate.performance, (86.5 + 65.0) / 2.0));
        // James has no injury_risk, so only Saka counts
        assert!(close(aggregate.injury_risk, 0.21));
        assert!(close(aggregate.goals, 15.0));
        assert_eq!(aggregate.starters, 1);
        assert!(close(aggregate.goals_per_match, (14.0 / 36.0 + 1.0 / 13.0) / 2.0));
        assert_eq!(aggregate.injury_prone, 1);

        let err = engineer().aggregate("Ghosts", &[]).unwrap_err();
        assert!(matches!(err, XaiError::EmptySquad { .. }));
    }

    #[test]
    fn test_match_vector_supports_both_versions() {
        let e = engineer();
        let (a, b) = (saka(), james());
        let team_a = e.aggregate("Arsenal", &[&a]).unwrap();
        let team_b = e.aggregate("Chelsea", &[&b]).unwrap();

        for version in [FEATURE_SET_V1, FEATURE_SET_V2] {
            let names: Vec<String> = feature_set(PredictionKind::Match, version)
                .unwrap()
                .iter()
                .map(|s| s.to_string())
                .collect();
            let vector = e.match_vector(&team_a, &team_b, &names).unwrap();
            assert_eq!(vector.len(), 10);
            assert_eq!(vector.subject, "Arsenal vs Chelsea");
        }

        let v2 = e
            .match_vector(&team_a, &team_b, &["team_b_goals".to_string()])
            .unwrap();
        assert_eq!(v2.get("team_b_goals"), Some(1.0));
    }

    #[test]
    fn test_known_feature_names() {
        assert!(FeatureEngineer::is_known(PredictionKind::Performance, "shot_accuracy"));
        assert!(!FeatureEngineer::is_known(PredictionKind::Performance, "team_a_goals"));
        assert!(FeatureEngineer::is_known(PredictionKind::Match, "team_a_total_passes"));
        assert!(!FeatureEngineer::is_known(PredictionKind::Match, "team_c_goals"));
        assert!(!FeatureEngineer::is_known(PredictionKind::Match, "team_a_dribbles"));
    }

    #[test]
    fn test_context_from_dataset() {
        let dataset = Dataset::from_records(vec![saka(), james()]);
        let context = FeatureContext::from_dataset(&dataset);
        assert!(close(context.high_workload_minutes, 900.0 + 2000.0 * 0.75));
    }
}
