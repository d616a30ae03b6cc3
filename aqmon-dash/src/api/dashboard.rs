//! Dashboard endpoints: published summary, recent readings, configuration

use aqmon_common::TimeWindow;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{MAX_REFRESH_INTERVAL_SECS, MIN_REFRESH_INTERVAL_SECS};
use crate::db::queries;
use crate::filter::Selector;
use crate::refresh::DashboardState;
use crate::AppState;

use super::ApiError;

/// GET /api/summary
///
/// The latest observable pipeline state. Every state maps to a distinct,
/// non-error JSON shape; an empty result or a store failure is reported,
/// never papered over with a fabricated view.
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let body = match state.dashboard_state() {
        DashboardState::Pending => json!({
            "status": "pending",
            "message": "Refresh cycle in progress",
        }),
        DashboardState::Published(view) => {
            let view = serde_json::to_value(&*view)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            json!({
                "status": "published",
                "view": view,
            })
        }
        DashboardState::Empty(reason) => json!({
            "status": "empty",
            "reason": reason.code(),
            "message": reason.message(),
        }),
        DashboardState::Unavailable(message) => json!({
            "status": "unavailable",
            "message": format!("Measurement store unavailable: {}", message),
        }),
    };

    Ok(Json(body))
}

/// Query parameters for the recent-readings table
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    /// Maximum rows to return (1-500)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// GET /api/readings
///
/// Most recent readings for the active window and filters, newest first.
pub async fn get_readings(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> Result<Json<Value>, ApiError> {
    if query.limit == 0 || query.limit > 500 {
        return Err(ApiError::InvalidInput(
            "limit must be between 1 and 500".to_string(),
        ));
    }

    let params = state.current_params();
    let readings = queries::fetch_latest_readings(&state.db, params.window).await?;
    let filtered = params.filters.apply(&readings);
    let page: Vec<_> = filtered.iter().take(query.limit).collect();

    Ok(Json(json!({
        "total": filtered.len(),
        "readings": page,
    })))
}

/// GET /api/values
///
/// Distinct cities, regions, pollutants, and stored category labels for
/// the prediction form selectors.
pub async fn get_distinct_values(
    State(state): State<AppState>,
) -> Result<Json<queries::DistinctValues>, ApiError> {
    let values = queries::fetch_distinct_values(&state.db).await?;
    Ok(Json(values))
}

/// Active refresh configuration as exposed over the API
#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub window_hours: i64,
    pub region: String,
    pub pollutant: String,
    pub series_pollutant: String,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
}

impl ConfigResponse {
    fn from_state(state: &AppState) -> Self {
        let params = state.current_params();
        ConfigResponse {
            window_hours: params.window.hours(),
            region: params.filters.region.as_str().to_string(),
            pollutant: params.filters.pollutant.as_str().to_string(),
            series_pollutant: params.series_pollutant.as_str().to_string(),
            auto_refresh: params.auto_refresh,
            refresh_interval_secs: params.interval.as_secs(),
        }
    }
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    Json(ConfigResponse::from_state(&state))
}

/// Partial configuration update; absent fields keep their current value
#[derive(Debug, Deserialize)]
pub struct ConfigUpdate {
    pub window_hours: Option<i64>,
    pub region: Option<String>,
    pub pollutant: Option<String>,
    pub series_pollutant: Option<String>,
    pub auto_refresh: Option<bool>,
    pub refresh_interval_secs: Option<u64>,
}

/// PUT /api/config
///
/// Validates the update, then restarts the refresh pipeline with the new
/// parameters. The in-flight cycle is abandoned, not mutated.
pub async fn update_config(
    State(state): State<AppState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let mut params = state.current_params();

    if let Some(hours) = update.window_hours {
        params.window = TimeWindow::from_hours(hours).ok_or_else(|| {
            ApiError::InvalidInput(format!(
                "invalid time window: {} hours (expected 1/3/6/12/24/48)",
                hours
            ))
        })?;
    }
    if let Some(secs) = update.refresh_interval_secs {
        if !(MIN_REFRESH_INTERVAL_SECS..=MAX_REFRESH_INTERVAL_SECS).contains(&secs) {
            return Err(ApiError::InvalidInput(format!(
                "refresh interval must be between {} and {} seconds",
                MIN_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS
            )));
        }
        params.interval = std::time::Duration::from_secs(secs);
    }
    if let Some(region) = update.region {
        params.filters.region = Selector::parse(&region);
    }
    if let Some(pollutant) = update.pollutant {
        params.filters.pollutant = Selector::parse(&pollutant);
    }
    if let Some(series) = update.series_pollutant {
        params.series_pollutant = Selector::parse(&series);
    }
    if let Some(auto_refresh) = update.auto_refresh {
        params.auto_refresh = auto_refresh;
    }

    state.apply_params(params);
    Ok(Json(ConfigResponse::from_state(&state)))
}
