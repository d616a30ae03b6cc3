//! Refresh controller: the fetch -> filter -> aggregate cycle
//!
//! Each cycle runs strictly sequentially: fetch the window-bounded
//! readings, apply the in-memory filters, run the remaining three
//! store-side aggregate queries, assemble one immutable `SummaryView`,
//! publish it. An empty raw fetch or an empty filtered set terminates
//! the loop in a distinct informational state rather than publishing a
//! stale or default view; a store failure terminates it in a failure
//! state. Parameter changes abort the running controller and spawn a
//! fresh one with the new parameters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aqmon_common::{Error, Result, TimeWindow};
use serde_json::json;
use sqlx::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::aggregate::SummaryView;
use crate::config::DashboardSettings;
use crate::db::queries;
use crate::filter::{FilterSelection, Selector};
use crate::sse::{DashboardEvent, SummaryBroadcaster};

/// Parameters for one controller run
///
/// Immutable for the lifetime of a controller; a change produces a new
/// controller rather than mutating a running one.
#[derive(Debug, Clone)]
pub struct RefreshParams {
    pub window: TimeWindow,
    pub filters: FilterSelection,
    /// Pollutant selection for the hourly series, independent of the
    /// main pollutant filter
    pub series_pollutant: Selector,
    pub auto_refresh: bool,
    pub interval: Duration,
    pub query_timeout: Duration,
}

impl RefreshParams {
    pub fn from_settings(settings: &DashboardSettings) -> Self {
        RefreshParams {
            window: settings.window,
            filters: FilterSelection {
                region: Selector::parse(&settings.region_filter),
                pollutant: Selector::parse(&settings.pollutant_filter),
            },
            series_pollutant: Selector::parse(&settings.series_pollutant),
            auto_refresh: settings.auto_refresh,
            interval: settings.refresh_interval(),
            query_timeout: settings.query_timeout(),
        }
    }
}

/// Why a cycle ended without a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The raw window fetch returned zero rows
    NoDataInWindow,
    /// Rows existed but none matched the active filters
    NoMatchingData,
}

impl EmptyReason {
    /// Distinct user-facing message per reason
    pub fn message(&self) -> &'static str {
        match self {
            EmptyReason::NoDataInWindow => "No data available for the selected time window",
            EmptyReason::NoMatchingData => "No data matching the selected filters",
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            EmptyReason::NoDataInWindow => "no_data_in_window",
            EmptyReason::NoMatchingData => "no_matching_data",
        }
    }
}

/// The latest observable state of the dashboard pipeline
#[derive(Debug, Clone)]
pub enum DashboardState {
    /// A cycle is running and nothing has been published yet
    Pending,
    /// The most recently published view
    Published(Arc<SummaryView>),
    /// Valid empty result; the loop has halted until parameters change
    Empty(EmptyReason),
    /// Store connectivity or query failure; no view was fabricated
    Unavailable(String),
}

enum CycleOutcome {
    Published(Arc<SummaryView>),
    Empty(EmptyReason),
}

/// Runs refresh cycles and publishes results
pub struct RefreshController {
    db: SqlitePool,
    params: RefreshParams,
    state_tx: Arc<watch::Sender<DashboardState>>,
    broadcaster: SummaryBroadcaster,
}

impl RefreshController {
    pub fn new(
        db: SqlitePool,
        params: RefreshParams,
        state_tx: Arc<watch::Sender<DashboardState>>,
        broadcaster: SummaryBroadcaster,
    ) -> Self {
        RefreshController {
            db,
            params,
            state_tx,
            broadcaster,
        }
    }

    /// Drive cycles until a terminal state
    ///
    /// Terminal conditions: single-shot mode after one published view,
    /// an empty result, or a store failure. Auto-refresh mode sleeps the
    /// configured interval between published cycles.
    pub async fn run(self) {
        loop {
            match self.run_cycle().await {
                Ok(CycleOutcome::Published(view)) => {
                    self.state_tx
                        .send_replace(DashboardState::Published(view.clone()));
                    if let Ok(data) = serde_json::to_value(&*view) {
                        self.broadcaster
                            .broadcast_lossy(DashboardEvent::new("summary", data));
                    }
                    if !self.params.auto_refresh {
                        info!("Auto-refresh disabled; published one view and stopping");
                        break;
                    }
                    tokio::time::sleep(self.params.interval).await;
                }
                Ok(CycleOutcome::Empty(reason)) => {
                    info!("Refresh halted: {}", reason.message());
                    self.broadcaster.broadcast_lossy(DashboardEvent::new(
                        "empty",
                        json!({ "message": reason.message() }),
                    ));
                    self.state_tx.send_replace(DashboardState::Empty(reason));
                    break;
                }
                Err(e) => {
                    error!("Refresh cycle failed: {}", e);
                    let message = e.to_string();
                    self.broadcaster.broadcast_lossy(DashboardEvent::new(
                        "store_error",
                        json!({ "message": &message }),
                    ));
                    self.state_tx
                        .send_replace(DashboardState::Unavailable(message));
                    break;
                }
            }
        }
    }

    /// One fetch -> filter -> aggregate pass
    async fn run_cycle(&self) -> Result<CycleOutcome> {
        debug!("Refresh cycle: fetching (window = {})", self.params.window);
        let readings = self
            .bounded(queries::fetch_latest_readings(&self.db, self.params.window))
            .await?;
        if readings.is_empty() {
            return Ok(CycleOutcome::Empty(EmptyReason::NoDataInWindow));
        }

        debug!("Refresh cycle: filtering {} readings", readings.len());
        let filtered = self.params.filters.apply(&readings);
        if filtered.is_empty() {
            return Ok(CycleOutcome::Empty(EmptyReason::NoMatchingData));
        }

        debug!("Refresh cycle: aggregating {} readings", filtered.len());
        let by_region = self
            .bounded(queries::fetch_summary_by_region(&self.db, self.params.window))
            .await?;
        let by_pollutant = self
            .bounded(queries::fetch_summary_by_pollutant(
                &self.db,
                self.params.window,
            ))
            .await?;
        let hourly_series = self
            .bounded(queries::fetch_hourly_series(
                &self.db,
                self.params.window,
                self.params.series_pollutant.selected(),
            ))
            .await?;

        let view = SummaryView::build(
            self.params.window,
            self.params.filters.clone(),
            &filtered,
            by_region,
            by_pollutant,
            hourly_series,
        );
        debug!(
            "Refresh cycle: publishing view generated at {}",
            view.generated_at
        );
        Ok(CycleOutcome::Published(Arc::new(view)))
    }

    /// Bounded store query; a hang surfaces as an error instead of
    /// blocking the cycle indefinitely
    async fn bounded<T>(&self, query: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.params.query_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(Error::Internal(format!(
                "store query exceeded {:?}",
                self.params.query_timeout
            ))),
        }
    }
}

/// Handle on the currently running controller task
pub struct ControllerHandle {
    task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Spawn a fresh controller, resetting the observable state
    pub fn spawn(
        db: SqlitePool,
        params: RefreshParams,
        state_tx: Arc<watch::Sender<DashboardState>>,
        broadcaster: SummaryBroadcaster,
    ) -> Self {
        state_tx.send_replace(DashboardState::Pending);
        let controller = RefreshController::new(db, params, state_tx, broadcaster);
        ControllerHandle {
            task: tokio::spawn(controller.run()),
        }
    }

    /// Abort the running controller and start over with new parameters
    pub fn restart(
        &mut self,
        db: SqlitePool,
        params: RefreshParams,
        state_tx: Arc<watch::Sender<DashboardState>>,
        broadcaster: SummaryBroadcaster,
    ) {
        self.task.abort();
        *self = ControllerHandle::spawn(db, params, state_tx, broadcaster);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
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
        .unwrap();
        pool
    }

    async fn insert_reading(
        pool: &SqlitePool,
        id: &str,
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
        .bind(id)
        .bind(Utc::now() - ChronoDuration::minutes(minutes_ago))
        .bind(city)
        .bind(region)
        .bind(pollutant)
        .bind(aqi)
        .bind(category)
        .execute(pool)
        .await
        .unwrap();
    }

    fn test_params() -> RefreshParams {
        RefreshParams {
            window: TimeWindow::Hours24,
            filters: FilterSelection::default(),
            series_pollutant: Selector::All,
            auto_refresh: false,
            interval: Duration::from_secs(5),
            query_timeout: Duration::from_secs(5),
        }
    }

    fn controller(db: SqlitePool, params: RefreshParams) -> (RefreshController, Arc<watch::Sender<DashboardState>>) {
        let (tx, _rx) = watch::channel(DashboardState::Pending);
        let tx = Arc::new(tx);
        let controller =
            RefreshController::new(db, params, tx.clone(), SummaryBroadcaster::new(16));
        (controller, tx)
    }

    #[tokio::test]
    async fn test_empty_window_halts_without_publishing() {
        let pool = memory_pool().await;
        let (ctl, tx) = controller(pool, test_params());

        // run() terminates on its own: no further automatic ticks
        ctl.run().await;
        match &*tx.borrow() {
            DashboardState::Empty(reason) => {
                assert_eq!(*reason, EmptyReason::NoDataInWindow)
            }
            other => panic!("expected Empty state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_filtered_empty_is_a_distinct_state() {
        let pool = memory_pool().await;
        insert_reading(&pool, "1", 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;

        let mut params = test_params();
        params.filters.region = Selector::parse("WA");
        let (ctl, tx) = controller(pool, params);

        ctl.run().await;
        match &*tx.borrow() {
            DashboardState::Empty(reason) => {
                assert_eq!(*reason, EmptyReason::NoMatchingData)
            }
            other => panic!("expected Empty state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_single_shot_publishes_exactly_one_view() {
        let pool = memory_pool().await;
        insert_reading(&pool, "1", 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;
        insert_reading(&pool, "2", 5, "Austin", "TX", "O3", Some(55.0), Some("Moderate")).await;

        let (ctl, tx) = controller(pool, test_params());
        // Single-shot mode terminates after one published view
        ctl.run().await;

        match &*tx.borrow() {
            DashboardState::Published(view) => {
                assert_eq!(view.overall.reading_count, 2);
                assert!((view.overall.mean_aqi.unwrap() - 50.0).abs() < 1e-6);
                assert_eq!(view.window_hours, 24);
                // Latest readings arrive newest-first from the adapter
                assert_eq!(view.latest_per_city[0].id, "2");
            }
            other => panic!("expected Published state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_readings_outside_window_are_excluded() {
        let pool = memory_pool().await;
        insert_reading(&pool, "old", 25 * 60, "Austin", "TX", "O3", Some(90.0), None).await;
        insert_reading(&pool, "new", 30, "Austin", "TX", "O3", Some(40.0), None).await;

        let (ctl, tx) = controller(pool, test_params());
        ctl.run().await;

        match &*tx.borrow() {
            DashboardState::Published(view) => {
                assert_eq!(view.overall.reading_count, 1);
                assert_eq!(view.overall.max_aqi, Some(40.0));
            }
            other => panic!("expected Published state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced_not_fabricated() {
        // No readings table at all: every query fails
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let (ctl, tx) = controller(pool, test_params());

        ctl.run().await;
        match &*tx.borrow() {
            DashboardState::Unavailable(message) => {
                assert!(!message.is_empty())
            }
            other => panic!("expected Unavailable state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_auto_refresh_republishes_then_halts_on_empty() {
        let pool = memory_pool().await;
        insert_reading(&pool, "1", 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;

        let mut params = test_params();
        params.auto_refresh = true;
        params.interval = Duration::from_millis(10);
        let (ctl, tx) = controller(pool.clone(), params);
        let mut rx = tx.subscribe();
        let task = tokio::spawn(ctl.run());

        // The loop keeps publishing while data remains
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| matches!(s, DashboardState::Published(_))),
        )
        .await
        .expect("no view published")
        .unwrap();

        // Once the window drains, a later cycle halts the loop
        sqlx::query("DELETE FROM readings")
            .execute(&pool)
            .await
            .unwrap();
        tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| matches!(s, DashboardState::Empty(_))),
        )
        .await
        .expect("loop did not halt on empty")
        .unwrap();

        match &*tx.borrow() {
            DashboardState::Empty(reason) => {
                assert_eq!(*reason, EmptyReason::NoDataInWindow)
            }
            other => panic!("expected Empty state, got {:?}", other),
        }
        // run() returned on its own after the halt
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("controller task still running")
            .unwrap();
    }

    #[tokio::test]
    async fn test_region_and_pollutant_summaries_present() {
        let pool = memory_pool().await;
        insert_reading(&pool, "1", 10, "Austin", "TX", "O3", Some(45.0), Some("Good")).await;
        insert_reading(&pool, "2", 10, "Seattle", "WA", "PM2.5", Some(80.0), Some("Moderate")).await;

        let (ctl, tx) = controller(pool, test_params());
        ctl.run().await;

        match &*tx.borrow() {
            DashboardState::Published(view) => {
                // Region summary ordered by mean AQI descending
                assert_eq!(view.by_region.len(), 2);
                assert_eq!(view.by_region[0].region, "WA");
                // Pollutant summary ordered alphabetically
                assert_eq!(view.by_pollutant.len(), 2);
                assert_eq!(view.by_pollutant[0].pollutant, "O3");
                assert!(!view.hourly_series.is_empty());
            }
            other => panic!("expected Published state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_series_pollutant_filter_is_independent() {
        let pool = memory_pool().await;
        insert_reading(&pool, "1", 10, "Austin", "TX", "O3", Some(45.0), None).await;
        insert_reading(&pool, "2", 10, "Austin", "TX", "PM2.5", Some(60.0), None).await;

        let mut params = test_params();
        params.series_pollutant = Selector::parse("O3");
        let (ctl, tx) = controller(pool, params);
        ctl.run().await;

        match &*tx.borrow() {
            DashboardState::Published(view) => {
                // Main view covers both pollutants, the series only O3
                assert_eq!(view.overall.reading_count, 2);
                assert!(view.hourly_series.iter().all(|p| p.pollutant == "O3"));
            }
            other => panic!("expected Published state, got {:?}", other),
        };
    }
}
