mod config;

use anyhow::{Context, Result};
use config::AppConfig;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xai_api::{build_router, AppState};
use xai_data::Dataset;
use xai_services::{MetricsCollector, ModelRegistry, PredictorService};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "football_xai=info,xai_services=info,xai_ml=info,xai_data=info,tower_http=info".into()
    });
    let (plain, json) = if json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(json)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("⚠️ Failed to listen for Ctrl+C: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::new().context("failed to load configuration")?;
    init_tracing(config.logging.json);

    info!("🚀 Starting Football XAI prediction service");
    info!("📂 Dataset: {}", config.data.dataset_path.display());
    info!(
        "🧠 Models: {} (feature set {}, explainer {:?}, top {})",
        config.models.dir.display(),
        config.models.version,
        config.explain.method,
        config.explain.top_k
    );

    let dataset = Dataset::from_path(&config.data.dataset_path)
        .with_context(|| format!("failed to load {}", config.data.dataset_path.display()))?;
    let registry =
        ModelRegistry::load(&config.models.dir, &config.models.version, config.explain.method)
            .context("failed to load models")?;
    let metrics = Arc::new(MetricsCollector::new().context("failed to create metrics registry")?);

    let predictor = Arc::new(PredictorService::new(
        Arc::new(dataset),
        Arc::new(registry),
        config.explain.top_k,
        Arc::clone(&metrics),
    ));
    let app = build_router(AppState::new(predictor));

    let listener = tokio::net::TcpListener::bind(config.server_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server_addr()))?;

    info!("✅ All services started successfully");
    info!("🌐 Listening on {}", config.server_addr());
    info!("⌨️  Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    metrics.log_performance_summary();
    info!("👋 Shutting down gracefully");

    Ok(())
}
