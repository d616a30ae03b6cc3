//! aqmon-dash library - air-quality dashboard service
//!
//! Read-only monitoring front-end over the measurement store: refresh
//! pipeline (fetch -> filter -> aggregate -> publish), AQI prediction
//! endpoint backed by two pre-trained models, and an HTTP/SSE API for
//! the presentation layer.

use std::sync::{Arc, Mutex, RwLock};

use axum::Router;
use sqlx::SqlitePool;
use tokio::sync::watch;

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod filter;
pub mod models;
pub mod predict;
pub mod refresh;
pub mod sse;

use models::ModelSet;
use refresh::{ControllerHandle, DashboardState, RefreshParams};
use sse::SummaryBroadcaster;

/// Application state shared across HTTP handlers
///
/// The store pool and loaded models are constructed once at process
/// start and passed in; nothing here is re-created per request.
#[derive(Clone)]
pub struct AppState {
    /// Measurement store pool (read-only)
    pub db: SqlitePool,
    /// The two pre-trained prediction models (either may be absent)
    pub models: Arc<ModelSet>,
    pub broadcaster: SummaryBroadcaster,
    /// Publish side of the dashboard state channel
    pub state_tx: Arc<watch::Sender<DashboardState>>,
    /// Parameters of the active refresh pipeline
    pub params: Arc<RwLock<RefreshParams>>,
    controller: Arc<Mutex<ControllerHandle>>,
}

impl AppState {
    /// Create application state and spawn the first refresh controller
    pub fn new(db: SqlitePool, models: ModelSet, params: RefreshParams) -> Self {
        let (state_tx, _) = watch::channel(DashboardState::Pending);
        let state_tx = Arc::new(state_tx);
        let broadcaster = SummaryBroadcaster::new(64);
        let controller = ControllerHandle::spawn(
            db.clone(),
            params.clone(),
            state_tx.clone(),
            broadcaster.clone(),
        );

        AppState {
            db,
            models: Arc::new(models),
            broadcaster,
            state_tx,
            params: Arc::new(RwLock::new(params)),
            controller: Arc::new(Mutex::new(controller)),
        }
    }

    /// Latest observable pipeline state
    pub fn dashboard_state(&self) -> DashboardState {
        self.state_tx.borrow().clone()
    }

    /// Snapshot of the active refresh parameters
    pub fn current_params(&self) -> RefreshParams {
        self.params.read().expect("params lock poisoned").clone()
    }

    /// Replace the refresh parameters and restart the pipeline
    ///
    /// A parameter change never mutates a running cycle; the old
    /// controller is aborted and a fresh one starts with the new values.
    pub fn apply_params(&self, params: RefreshParams) {
        *self.params.write().expect("params lock poisoned") = params.clone();
        let mut controller = self.controller.lock().expect("controller lock poisoned");
        controller.restart(
            self.db.clone(),
            params,
            self.state_tx.clone(),
            self.broadcaster.clone(),
        );
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/health", get(api::health_check))
        .route("/api/summary", get(api::get_summary))
        .route("/api/readings", get(api::get_readings))
        .route("/api/values", get(api::get_distinct_values))
        .route("/api/config", get(api::get_config).put(api::update_config))
        .route("/api/events", get(api::sse_events))
        .route("/api/models", get(api::get_models))
        .route("/api/predict", post(api::post_predict))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
