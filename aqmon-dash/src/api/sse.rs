//! SSE endpoint for live dashboard updates

use axum::{extract::State, response::IntoResponse};

use crate::AppState;

/// GET /api/events
///
/// Streams one event per refresh outcome: `summary` with the published
/// view, `empty` or `store_error` when the pipeline halts.
pub async fn sse_events(State(state): State<AppState>) -> impl IntoResponse {
    state.broadcaster.handle_sse_connection()
}
