use thiserror::Error;

#[derive(Error, Debug)]
pub enum XaiError {
    #[error("Player not found: {name}")]
    PlayerNotFound { name: String },

    #[error("Team not found: {team}")]
    TeamNotFound { team: String },

    #[error("Players not found: {}", names.join(", "))]
    PlayersNotFound { names: Vec<String> },

    #[error("Squad {label} has no players")]
    EmptySquad { label: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown feature: {feature}")]
    UnknownFeature { feature: String },

    #[error("Feature {feature} missing from input vector")]
    MissingFeature { feature: String },

    #[error("Attribution length {actual} does not match {expected} feature names")]
    AttributionShape { expected: usize, actual: usize },

    #[error("Non-finite attribution for feature {feature}")]
    NonFiniteAttribution { feature: String },

    #[error("Invalid model artifact: {0}")]
    InvalidModel(String),

    #[error("Model prediction failed: {reason}")]
    PredictionFailed { reason: String },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl XaiError {
    /// Lookup failures the caller can fix by asking for something else.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PlayerNotFound { .. } | Self::TeamNotFound { .. } | Self::PlayersNotFound { .. }
        )
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::EmptySquad { .. } | Self::InvalidRequest(_))
    }
}

pub type Result<T> = std::result::Result<T, XaiError>;
