//! Integration tests for aqmon-dash API endpoints
//!
//! Each test seeds an in-memory SQLite store the way the ingestion
//! pipeline would, builds the app, waits for the refresh pipeline to
//! reach a terminal state, and exercises the HTTP surface.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use aqmon_dash::config::DashboardSettings;
use aqmon_dash::models::{ModelSet, RegressionModel};
use aqmon_dash::refresh::{DashboardState, RefreshParams};
use aqmon_dash::{build_router, AppState};

/// Test helper: in-memory store with the ingestion pipeline's schema
async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should create in-memory database");

    sqlx::query(
        "CREATE TABLE readings (
            id TEXT PRIMARY KEY,
            recorded_at TEXT NOT NULL,
            city TEXT NOT NULL,
            region TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            pollutant TEXT NOT NULL,
            aqi REAL,
            category TEXT
        )",
    )
    .execute(&pool)
    .await
    .expect("Should create readings table");

    pool
}

async fn insert_reading(
    pool: &SqlitePool,
    minutes_ago: i64,
    city: &str,
    region: &str,
    pollutant: &str,
    aqi: Option<f64>,
    category: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO readings
         (id, recorded_at, city, region, latitude, longitude, pollutant, aqi, category)
         VALUES (?, ?, ?, ?, 30.0, -97.0, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(Utc::now() - Duration::minutes(minutes_ago))
    .bind(city)
    .bind(region)
    .bind(pollutant)
    .bind(aqi)
    .bind(category)
    .execute(pool)
    .await
    .expect("Should insert reading");
}

/// Test helper: build app state and wait for the first refresh cycle to
/// reach a terminal state (single-shot mode)
async fn setup_app_with(pool: SqlitePool, models: ModelSet) -> (AppState, axum::Router) {
    let params = RefreshParams::from_settings(&DashboardSettings::default());
    let state = AppState::new(pool, models, params);
    wait_for_terminal(&state).await;
    let app = build_router(state.clone());
    (state, app)
}

async fn setup_app(pool: SqlitePool) -> (AppState, axum::Router) {
    setup_app_with(pool, ModelSet::default()).await
}

async fn wait_for_terminal(state: &AppState) {
    let mut rx = state.state_tx.subscribe();
    rx.wait_for(|s| !matches!(s, DashboardState::Pending))
        .await
        .expect("State channel should stay open");
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn test_model(name: &str, intercept: f64) -> RegressionModel {
    RegressionModel::from_json(&format!(
        r#"{{
            "name": "{}",
            "algorithm": "random_forest",
            "intercept": {},
            "features": [
                {{"kind": "numeric", "name": "latitude", "mean": 30.0, "std_dev": 1.0, "weight": 0.0}}
            ]
        }}"#,
        name, intercept
    ))
    .expect("Should parse test model")
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let pool = setup_test_db().await;
    let (_state, app) = setup_app(pool).await;

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "aqmon-dash");
    assert!(body["version"].is_string());
}

// =============================================================================
// Summary endpoint
// =============================================================================

#[tokio::test]
async fn test_summary_published_for_seeded_store() {
    let pool = setup_test_db().await;
    insert_reading(&pool, 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;
    insert_reading(&pool, 5, "Austin", "TX", "O3", Some(55.0), Some("Moderate")).await;
    let (_state, app) = setup_app(pool).await;

    let response = app.oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "published");

    let view = &body["view"];
    assert_eq!(view["overall"]["reading_count"], 2);
    let mean = view["overall"]["mean_aqi"].as_f64().unwrap();
    assert!((mean - 50.0).abs() < 1e-6);

    // Category distribution: Good and Moderate at 50% each
    let distribution = view["category_distribution"].as_array().unwrap();
    assert_eq!(distribution.len(), 2);
    for slice in distribution {
        assert_eq!(slice["count"], 1);
        assert!((slice["percent"].as_f64().unwrap() - 50.0).abs() < 1e-9);
    }
}

#[tokio::test]
async fn test_summary_empty_window() {
    let pool = setup_test_db().await;
    let (_state, app) = setup_app(pool).await;

    let response = app.oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "empty");
    assert_eq!(body["reason"], "no_data_in_window");
    assert_eq!(body["message"], "No data available for the selected time window");
}

#[tokio::test]
async fn test_summary_store_failure_is_unavailable() {
    // No readings table: every store query fails
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let (_state, app) = setup_app(pool).await;

    let response = app.oneshot(get("/api/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "unavailable");
    assert!(body["message"].as_str().unwrap().contains("unavailable"));
}

// =============================================================================
// Configuration endpoint
// =============================================================================

#[tokio::test]
async fn test_config_round_trip() {
    let pool = setup_test_db().await;
    let (_state, app) = setup_app(pool).await;

    let response = app.clone().oneshot(get("/api/config")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["window_hours"], 24);
    assert_eq!(body["region"], "all");
    assert_eq!(body["auto_refresh"], false);

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/config",
            json!({ "window_hours": 6, "region": "TX" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["window_hours"], 6);
    assert_eq!(body["region"], "TX");
}

#[tokio::test]
async fn test_config_rejects_off_menu_window() {
    let pool = setup_test_db().await;
    let (_state, app) = setup_app(pool).await;

    let response = app
        .oneshot(json_request("PUT", "/api/config", json!({ "window_hours": 7 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_config_rejects_out_of_range_interval() {
    let pool = setup_test_db().await;
    let (_state, app) = setup_app(pool).await;

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/config",
            json!({ "refresh_interval_secs": 3 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_filter_change_restarts_pipeline() {
    let pool = setup_test_db().await;
    insert_reading(&pool, 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;
    let (state, app) = setup_app(pool).await;

    // A region with no readings: the fresh cycle must land in the
    // filtered-empty state with its own message
    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/config", json!({ "region": "WA" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    wait_for_terminal(&state).await;
    let response = app.oneshot(get("/api/summary")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "empty");
    assert_eq!(body["reason"], "no_matching_data");
    assert_eq!(body["message"], "No data matching the selected filters");
}

// =============================================================================
// Readings endpoint
// =============================================================================

#[tokio::test]
async fn test_readings_respects_filters_and_limit() {
    let pool = setup_test_db().await;
    insert_reading(&pool, 30, "Austin", "TX", "O3", Some(45.0), None).await;
    insert_reading(&pool, 20, "Seattle", "WA", "O3", Some(30.0), None).await;
    insert_reading(&pool, 10, "Dallas", "TX", "PM2.5", Some(70.0), None).await;
    let (state, app) = setup_app(pool).await;

    let mut params = state.current_params();
    params.filters.region = aqmon_dash::filter::Selector::parse("TX");
    state.apply_params(params);
    wait_for_terminal(&state).await;

    let response = app
        .clone()
        .oneshot(get("/api/readings?limit=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["total"], 2);
    let readings = body["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 1);
    // Newest first
    assert_eq!(readings[0]["city"], "Dallas");

    let response = app.oneshot(get("/api/readings?limit=0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Distinct values endpoint
// =============================================================================

#[tokio::test]
async fn test_distinct_values() {
    let pool = setup_test_db().await;
    insert_reading(&pool, 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;
    insert_reading(&pool, 10, "Austin", "TX", "PM2.5", Some(55.0), Some("Moderate")).await;
    insert_reading(&pool, 10, "Seattle", "WA", "O3", None, None).await;
    let (_state, app) = setup_app(pool).await;

    let response = app.oneshot(get("/api/values")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["cities"], json!(["Austin", "Seattle"]));
    assert_eq!(body["regions"], json!(["TX", "WA"]));
    assert_eq!(body["pollutants"], json!(["O3", "PM2.5"]));
    // Null categories are excluded
    assert_eq!(body["categories"], json!(["Good", "Moderate"]));
}

// =============================================================================
// Prediction endpoints
// =============================================================================

#[tokio::test]
async fn test_models_status() {
    let pool = setup_test_db().await;
    let models = ModelSet {
        model_a: Some(test_model("Random Forest", 42.0)),
        model_b: None,
    };
    let (_state, app) = setup_app_with(pool, models).await;

    let response = app.oneshot(get("/api/models")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["model_a"]["loaded"], true);
    assert_eq!(body["model_a"]["name"], "Random Forest");
    assert_eq!(body["model_b"]["loaded"], false);
}

#[tokio::test]
async fn test_predict_without_models_is_unavailable() {
    let pool = setup_test_db().await;
    let (_state, app) = setup_app(pool).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/predict",
            json!({
                "city": "Austin", "region": "TX", "pollutant": "O3",
                "latitude": 30.27, "longitude": -97.74
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_predict_compares_both_models() {
    let pool = setup_test_db().await;
    let models = ModelSet {
        model_a: Some(test_model("Random Forest", 42.0)),
        model_b: Some(test_model("Gradient Boost", 58.0)),
    };
    let (_state, app) = setup_app_with(pool, models).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/predict",
            json!({
                "city": "Austin", "region": "TX", "pollutant": "O3",
                "latitude": 30.0, "longitude": -97.74
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["model_a"]["status"], "predicted");
    assert_eq!(body["model_b"]["status"], "predicted");

    let comparison = &body["comparison"];
    assert!((comparison["difference"].as_f64().unwrap() - 16.0).abs() < 1e-9);
    assert!((comparison["mean"].as_f64().unwrap() - 50.0).abs() < 1e-9);
    assert_eq!(comparison["agreement"], "Medium");
}

#[tokio::test]
async fn test_predict_rejects_bad_coordinates() {
    let pool = setup_test_db().await;
    let models = ModelSet {
        model_a: Some(test_model("Random Forest", 42.0)),
        model_b: None,
    };
    let (_state, app) = setup_app_with(pool, models).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/predict",
            json!({
                "city": "Austin", "region": "TX", "pollutant": "O3",
                "latitude": 120.0, "longitude": -97.74
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
