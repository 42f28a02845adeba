use axum::{
    Router,
    routing::{get, post},
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;
use xai_ml::EngineeredFeatures;
use xai_models::{
    InjuryPrediction, MatchPrediction, MatchRequest, PerformancePrediction, PlayerRecord,
    PlayerRequest, XaiError,
};
use xai_services::{ModelInfo, PredictorService, ServiceMetrics};
use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<PredictorService>,
}

impl AppState {
    pub fn new(predictor: Arc<PredictorService>) -> Self {
        Self { predictor }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub dataset_rows: usize,
    pub models_loaded: usize,
    pub feature_set_version: String,
}

#[derive(Serialize)]
pub struct PlayerFeaturesResponse {
    pub player: String,
    pub team: String,
    pub feature_set_version: String,
    pub features: EngineeredFeatures,
}

/// Routes plus request tracing and permissive CORS, ready to serve.
pub fn build_router(state: AppState) -> Router {
    create_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health and status
        .route("/health", get(health_check))
        .route("/api/v1/status", get(get_system_status))
        .route("/metrics", get(get_metrics))

        // Dataset browsing
        .route("/api/players", get(list_players))
        .route("/api/players/:name/features", get(get_player_features))
        .route("/api/teams", get(list_teams))
        .route("/api/teams/:team/players", get(get_team_players))
        .route("/api/models", get(list_models))

        // Predictions
        .route("/api/performance/players", get(list_players))
        .route("/api/performance/predict", post(predict_performance))
        .route("/api/injury/players", get(list_players))
        .route("/api/injury/predict", post(predict_injury))
        .route("/api/match/players", get(list_players))
        .route("/api/match/teams", get(list_teams))
        .route("/api/match/predict", post(predict_match))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let predictor = &state.predictor;
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: predictor.metrics().snapshot().uptime_seconds,
        dataset_rows: predictor.dataset().len(),
        models_loaded: predictor.registry().len(),
        feature_set_version: predictor.registry().feature_set_version().to_string(),
    })
}

async fn get_system_status(State(state): State<AppState>) -> Json<ServiceMetrics> {
    Json(state.predictor.metrics().snapshot())
}

async fn get_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = state.predictor.metrics().render()?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

async fn list_players(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.predictor.dataset().players())
}

async fn list_teams(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.predictor.dataset().teams())
}

async fn get_player_features(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PlayerFeaturesResponse>, ApiError> {
    let predictor = &state.predictor;
    let record = predictor.dataset().require_player(&name)?;
    let features = predictor.player_features(&name)?;

    Ok(Json(PlayerFeaturesResponse {
        player: record.player_name.clone(),
        team: record.team.clone(),
        feature_set_version: predictor.registry().feature_set_version().to_string(),
        features,
    }))
}

async fn get_team_players(
    Path(team): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<PlayerRecord>>, ApiError> {
    let dataset = state.predictor.dataset();
    if !dataset.has_team(&team) {
        return Err(XaiError::TeamNotFound { team }.into());
    }
    Ok(Json(dataset.team_players(&team).into_iter().cloned().collect()))
}

async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.predictor.registry().models().into_iter().cloned().collect())
}

async fn predict_performance(
    State(state): State<AppState>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> Result<Json<PerformancePrediction>, ApiError> {
    let Json(request) = payload?;
    debug!("performance prediction for {}", request.player_name);
    Ok(Json(state.predictor.predict_performance(&request)?))
}

async fn predict_injury(
    State(state): State<AppState>,
    payload: Result<Json<PlayerRequest>, JsonRejection>,
) -> Result<Json<InjuryPrediction>, ApiError> {
    let Json(request) = payload?;
    debug!("injury prediction for {}", request.player_name);
    Ok(Json(state.predictor.predict_injury(&request)?))
}

async fn predict_match(
    State(state): State<AppState>,
    payload: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Json<MatchPrediction>, ApiError> {
    let Json(request) = payload?;
    debug!(
        "match prediction {} vs {}",
        request.team_a.label(),
        request.team_b.label()
    );
    Ok(Json(state.predictor.predict_match(&request)?))
}
