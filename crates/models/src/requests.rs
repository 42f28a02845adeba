use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerRequest {
    pub player_name: String,
}

/// One side of a match-up: either a team name from the dataset or an
/// explicit list of player names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SquadSelector {
    Team(String),
    Players(Vec<String>),
}

impl SquadSelector {
    /// Display label used in responses and explanations.
    pub fn label(&self) -> String {
        match self {
            Self::Team(team) => team.clone(),
            Self::Players(names) => match names.as_slice() {
                [] => "empty squad".to_string(),
                [only] => only.clone(),
                [first, rest @ ..] => format!("{first} +{}", rest.len()),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchRequest {
    pub team_a: SquadSelector,
    pub team_b: SquadSelector,
}
