use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use xai_ml::ExplainerChoice;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub models: ModelsConfig,
    pub explain: ExplainConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub dataset_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    /// Feature-set version, `v1` or `v2`; selects the artifact files too.
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainConfig {
    pub method: ExplainerChoice,
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub json: bool,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("data.dataset_path", "data/football_master_dataset.csv")?
            .set_default("models.dir", "models")?
            .set_default("models.version", "v2")?
            .set_default("explain.method", "auto")?
            .set_default("explain.top_k", 5)?
            .set_default("logging.json", false)?
            // Add in settings from configuration file
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // XAI__SERVER__PORT=9000 overrides server.port
            .add_source(
                Environment::with_prefix("XAI")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
