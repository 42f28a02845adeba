mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{create_test_app, get, post_json, send, send_raw};

#[tokio::test]
async fn test_health_endpoint() {
    let (status, health) = send(create_test_app(), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["timestamp"].is_string());
    assert!(health["version"].is_string());
    assert_eq!(health["dataset_rows"], 10);
    assert_eq!(health["models_loaded"], 3);
    assert_eq!(health["feature_set_version"], "v2");
}

#[tokio::test]
async fn test_player_listing_is_sorted_and_unique() {
    let (status, players) = send(create_test_app(), get("/api/players")).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = players
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 9);
    assert_eq!(names[0], "Bukayo Saka");
    assert_eq!(names[1], "Cole Palmer");
    assert!(names.windows(2).all(|w| w[0] < w[1]));

    for uri in ["/api/performance/players", "/api/injury/players", "/api/match/players"] {
        let (status, same) = send(create_test_app(), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(same, players, "{uri}");
    }
}

#[tokio::test]
async fn test_team_endpoints() {
    let (status, teams) = send(create_test_app(), get("/api/teams")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(teams, json!(["Arsenal", "Chelsea", "Liverpool"]));

    let (_, match_teams) = send(create_test_app(), get("/api/match/teams")).await;
    assert_eq!(match_teams, teams);

    let (status, roster) = send(create_test_app(), get("/api/teams/Arsenal/players")).await;
    assert_eq!(status, StatusCode::OK);
    let roster = roster.as_array().unwrap();
    assert_eq!(roster.len(), 3);
    assert_eq!(roster[0]["player_name"], "Bukayo Saka");
    assert_eq!(roster[0]["is_starting_xi"], true);

    let (status, error) = send(create_test_app(), get("/api/teams/Spurs/players")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "Team not found: Spurs");
}

#[tokio::test]
async fn test_player_features_endpoint() {
    let (status, body) =
        send(create_test_app(), get("/api/players/Gabriel%20Jesus/features")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["player"], "Gabriel Jesus");
    assert_eq!(body["team"], "Arsenal");
    assert_eq!(body["feature_set_version"], "v2");

    let features = &body["features"];
    assert_eq!(features["is_injury_prone"], 1.0);
    assert_eq!(features["is_starter"], 0.0);
    assert_eq!(features["total_actions"], 24.0);
    assert!((features["goals_per_match"].as_f64().unwrap() - 4.0 / 21.0).abs() < 1e-12);

    let (status, _) = send(create_test_app(), get("/api/players/Nobody/features")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_models_endpoint() {
    let (status, models) = send(create_test_app(), get("/api/models")).await;

    assert_eq!(status, StatusCode::OK);
    let models = models.as_array().unwrap();
    assert_eq!(models.len(), 3);

    assert_eq!(models[0]["kind"], "performance");
    assert_eq!(models[0]["artifact"], "performance_model_v2.json");
    assert_eq!(models[0]["explainer"], "tree_shap");
    assert_eq!(models[0]["num_trees"], 2);
    assert_eq!(models[0]["metrics"]["r2"], 0.91);

    assert_eq!(models[2]["kind"], "match");
    assert_eq!(models[2]["objective"], "binary:logistic");
    assert_eq!(models[2]["feature_names"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_status_and_metrics_track_predictions() {
    let app = create_test_app();

    let (status, _) = send(
        app.clone(),
        post_json("/api/performance/predict", &json!({"player_name": "Bukayo Saka"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        app.clone(),
        post_json("/api/injury/predict", &json!({"player_name": "Nobody"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, metrics) = send(app.clone(), get("/api/v1/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["predictions_generated"], 1);
    assert_eq!(metrics["prediction_errors"], 1);
    assert_eq!(metrics["by_kind"]["performance"]["predictions"], 1);
    assert_eq!(metrics["by_kind"]["injury"]["errors"], 1);

    let (status, exposition) = send_raw(app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(exposition.contains("football_xai_predictions_total"));
    assert!(exposition.contains("football_xai_prediction_latency_seconds"));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let request = axum::http::Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:8501")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(create_test_app(), request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, _) = send_raw(create_test_app(), get("/api/v1/events")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
