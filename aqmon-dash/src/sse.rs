//! SSE broadcaster for pushing refresh results to connected clients
//!
//! Each refresh cycle that publishes (or terminates) emits one event;
//! clients reconnect-and-catch-up via the summary endpoint, so delivery
//! here is lossy by design.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// One dashboard event: an event name plus a JSON payload
#[derive(Debug, Clone)]
pub struct DashboardEvent {
    pub event: String,
    pub data: Value,
}

impl DashboardEvent {
    pub fn new(event: &str, data: Value) -> Self {
        DashboardEvent {
            event: event.to_string(),
            data,
        }
    }
}

/// Manages client connections and event distribution
#[derive(Clone)]
pub struct SummaryBroadcaster {
    tx: broadcast::Sender<DashboardEvent>,
}

impl SummaryBroadcaster {
    /// Create a new broadcaster with the given event buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Broadcast an event, ignoring if no clients are connected
    pub fn broadcast_lossy(&self, event: DashboardEvent) {
        if let Ok(count) = self.tx.send(event) {
            debug!("Broadcast event to {} clients", count);
        }
    }

    /// Current number of connected clients
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Create an SSE stream for a new client connection
    pub fn subscribe_stream(&self) -> impl Stream<Item = Result<Event, Infallible>> {
        let rx = self.tx.subscribe();
        let stream = BroadcastStream::new(rx);

        stream.filter_map(|result| async move {
            match result {
                Ok(dashboard_event) => {
                    let event = Event::default()
                        .event(&dashboard_event.event)
                        .json_data(&dashboard_event.data)
                        .ok();
                    event.map(Ok)
                }
                Err(e) => {
                    // Lagged receiver; log and continue
                    warn!("SSE client error: {:?}", e);
                    None
                }
            }
        })
    }

    /// Axum SSE response for GET /api/events
    pub fn handle_sse_connection(&self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        debug!("New SSE client connected, total clients: {}", self.client_count());

        Sse::new(self.subscribe_stream()).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("keep-alive"),
        )
    }
}
