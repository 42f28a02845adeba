//! Human-facing texts: feature descriptions, explanation narratives and the
//! one-line insight shown next to each prediction.

use xai_models::{MatchVerdict, NormalizedImportance, PerformanceTier, PredictionKind, RiskLevel};
use crate::explanation::title_case;

const NARRATIVE_FEATURES: usize = 3;

pub fn feature_description(feature: &str) -> Option<&'static str> {
    let description = match feature {
        "full_season" => "Played more than 30 matches",
        "is_starter" => "Regular in the starting XI",
        "matches_played" => "Number of matches played",
        "minutes_played" => "Total minutes on the pitch",
        "shot_accuracy" => "Goals per shot taken",
        "goals_per_match" => "Average goals per match",
        "assists_per_match" => "Average assists per match",
        "passes_per_match" => "Average passes per match",
        "actions_per_90" => "Goals, assists and tackles per 90 minutes",
        "pass_success_rate" => "Share of passes among attempts",
        "total_actions" => "Total on-pitch actions",
        "injury_frequency" => "Injuries per match played",
        "is_injury_prone" => "More than one injury last season",
        "is_young" => "Under 25 years old",
        "is_veteran" => "Over 32 years old",
        "high_workload" => "Minutes in the top quarter of the league",
        "age" => "Player age",
        "injuries_last_season" => "Injuries sustained last season",
        _ => return team_description(feature),
    };
    Some(description)
}

fn team_description(feature: &str) -> Option<&'static str> {
    let suffix = feature
        .strip_prefix("team_a_")
        .or_else(|| feature.strip_prefix("team_b_"))?;
    let description = match suffix {
        "performance" | "avg_performance" => "Average player performance",
        "injury_risk" | "avg_injury_risk" => "Average injury risk",
        "goals" | "total_goals" => "Total goals scored",
        "starters" => "Starting XI players in the squad",
        "goals_per_match" => "Average goals per match",
        "total_assists" => "Total assists",
        "total_passes" => "Total passes",
        _ => return None,
    };
    Some(description)
}

/// Description with a title-cased fallback; match features name their side.
pub fn describe(feature: &str) -> String {
    let base = feature_description(feature)
        .map(str::to_string)
        .unwrap_or_else(|| title_case(feature));
    if feature.starts_with("team_a_") {
        format!("{base} (Team A)")
    } else if feature.starts_with("team_b_") {
        format!("{base} (Team B)")
    } else {
        base
    }
}

/// Markdown summary of the most influential features.
pub fn narrative(kind: PredictionKind, top_features: &NormalizedImportance) -> String {
    if top_features.is_empty() {
        return "No explanation data available".to_string();
    }

    let (intro, outro) = match kind {
        PredictionKind::Performance => (
            "This player's performance score is mainly driven by:",
            "Together these factors set the player's overall performance rating.",
        ),
        PredictionKind::Injury => (
            "This player's injury risk is influenced by:",
            "Weigh these factors when planning injury prevention.",
        ),
        PredictionKind::Match => (
            "The match prediction is mainly determined by:",
            "These squad-level statistics are the strongest predictors of the outcome.",
        ),
    };

    let mut text = format!("{intro}\n\n");
    for (i, entry) in top_features.iter().take(NARRATIVE_FEATURES).enumerate() {
        text.push_str(&format!(
            "{}. **{}** ({:.1}% influence)\n",
            i + 1,
            describe(&entry.feature),
            entry.contribution * 100.0
        ));
    }
    text.push('\n');
    text.push_str(outro);
    text
}

pub fn performance_insight(tier: PerformanceTier) -> &'static str {
    match tier {
        PerformanceTier::Excellent => {
            "🌟 **Excellent Performance**: performing exceptionally well and a key asset to the team."
        }
        PerformanceTier::Good => {
            "✅ **Good Performance**: contributing well with solid overall statistics."
        }
        PerformanceTier::Moderate => {
            "📈 **Moderate Performance**: room for improvement in key performance areas."
        }
    }
}

pub fn injury_insight(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => {
            "⚠️ **High Risk**: high likelihood of injury. Monitor carefully and prioritise recovery."
        }
        RiskLevel::Moderate => {
            "🟡 **Moderate Risk**: some risk factors present. Manage training load closely."
        }
        RiskLevel::Low => {
            "✅ **Low Risk**: low injury likelihood. Continue current training and recovery."
        }
    }
}

pub fn match_insight(verdict: MatchVerdict) -> &'static str {
    match verdict {
        MatchVerdict::TeamAFavored => {
            "🟢 **Team A Favored**: squad composition gives Team A a clear advantage."
        }
        MatchVerdict::Competitive => {
            "🟡 **Competitive Match**: the squads are evenly matched and it could go either way."
        }
        MatchVerdict::TeamBFavored => {
            "🔵 **Team B Favored**: squad composition gives Team B a clear advantage."
        }
    }
}
