//! Configuration for aqmon-dash
//!
//! Two tiers, following the usual split:
//! 1. **TOML bootstrap**: port, models directory, logging (static)
//! 2. **Database runtime**: dashboard defaults from the `settings` table
//!
//! The store connection is read-only, so missing settings fall back to
//! built-in defaults without being written back.

use std::path::{Path, PathBuf};
use std::time::Duration;

use aqmon_common::TimeWindow;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

/// Bootstrap configuration file name inside the root folder
pub const BOOTSTRAP_FILE: &str = "aqmon-dash.toml";

/// Refresh interval bounds in seconds
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 5;
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 60;

/// Bootstrap configuration loaded from TOML file
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the model artifacts; defaults to
    /// `<root folder>/models`
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5731
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        TomlConfig {
            port: default_port(),
            models_dir: None,
            logging: LoggingConfig {
                level: default_log_level(),
            },
        }
    }
}

impl TomlConfig {
    /// Load the bootstrap file from the root folder; a missing or
    /// malformed file falls back to defaults
    pub fn load(root_folder: &Path) -> Self {
        let path = root_folder.join(BOOTSTRAP_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No bootstrap config at {}, using defaults", path.display());
                return TomlConfig::default();
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                info!("Loaded bootstrap config from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Ignoring malformed bootstrap config {}: {}",
                    path.display(),
                    e
                );
                TomlConfig::default()
            }
        }
    }

    /// Effective models directory for a given root folder
    pub fn models_dir(&self, root_folder: &Path) -> PathBuf {
        self.models_dir
            .clone()
            .unwrap_or_else(|| root_folder.join("models"))
    }
}

/// Dashboard defaults loaded from the `settings` table
///
/// All values have built-in defaults; the table (or individual keys) may
/// be absent entirely since the store is owned by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub window: TimeWindow,
    pub region_filter: String,
    pub pollutant_filter: String,
    /// Pollutant selection for the time-series chart, independent of the
    /// main pollutant filter
    pub series_pollutant: String,
    pub auto_refresh: bool,
    pub refresh_interval_secs: u64,
    /// Hardening bound on each store query, not a contract requirement
    pub query_timeout_ms: u64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        DashboardSettings {
            window: TimeWindow::default(),
            region_filter: "all".to_string(),
            pollutant_filter: "all".to_string(),
            series_pollutant: "all".to_string(),
            auto_refresh: false,
            refresh_interval_secs: 15,
            query_timeout_ms: 5000,
        }
    }
}

impl DashboardSettings {
    /// Load settings from the database, falling back per-key to defaults
    pub async fn load(pool: &SqlitePool) -> Self {
        let defaults = DashboardSettings::default();

        let window = match get_setting(pool, "dashboard_window_hours").await {
            Some(raw) => match raw.parse::<i64>().ok().and_then(TimeWindow::from_hours) {
                Some(window) => window,
                None => {
                    warn!(
                        "Invalid dashboard_window_hours '{}', using default {}",
                        raw,
                        defaults.window.hours()
                    );
                    defaults.window
                }
            },
            None => defaults.window,
        };

        let refresh_interval_secs = match get_setting(pool, "dashboard_refresh_interval_secs").await
        {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) => clamp_refresh_interval(secs),
                Err(_) => {
                    warn!(
                        "Invalid dashboard_refresh_interval_secs '{}', using default {}",
                        raw, defaults.refresh_interval_secs
                    );
                    defaults.refresh_interval_secs
                }
            },
            None => defaults.refresh_interval_secs,
        };

        let auto_refresh = match get_setting(pool, "dashboard_auto_refresh").await {
            Some(raw) => matches!(raw.as_str(), "1" | "true"),
            None => defaults.auto_refresh,
        };

        let query_timeout_ms = get_setting(pool, "dashboard_query_timeout_ms")
            .await
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(defaults.query_timeout_ms);

        DashboardSettings {
            window,
            region_filter: get_setting(pool, "dashboard_region_filter")
                .await
                .unwrap_or(defaults.region_filter),
            pollutant_filter: get_setting(pool, "dashboard_pollutant_filter")
                .await
                .unwrap_or(defaults.pollutant_filter),
            series_pollutant: get_setting(pool, "dashboard_series_pollutant")
                .await
                .unwrap_or(defaults.series_pollutant),
            auto_refresh,
            refresh_interval_secs,
            query_timeout_ms,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Clamp a refresh interval into the supported 5-60 second range
pub fn clamp_refresh_interval(secs: u64) -> u64 {
    secs.clamp(MIN_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS)
}

/// Read one key from the settings table
///
/// The table may not exist at all in a store owned by the ingestion
/// pipeline; any query failure is treated as "not set".
async fn get_setting(pool: &SqlitePool, key: &str) -> Option<String> {
    let result: Result<Option<(String,)>, sqlx::Error> =
        sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await;

    match result {
        Ok(row) => row.map(|(value,)| value),
        Err(e) => {
            debug!("Setting '{}' unavailable ({}), using default", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_refresh_interval() {
        assert_eq!(clamp_refresh_interval(1), 5);
        assert_eq!(clamp_refresh_interval(5), 5);
        assert_eq!(clamp_refresh_interval(15), 15);
        assert_eq!(clamp_refresh_interval(60), 60);
        assert_eq!(clamp_refresh_interval(300), 60);
    }

    #[test]
    fn test_defaults() {
        let settings = DashboardSettings::default();
        assert_eq!(settings.window.hours(), 24);
        assert_eq!(settings.region_filter, "all");
        assert!(!settings.auto_refresh);
        assert_eq!(settings.refresh_interval_secs, 15);
    }

    #[tokio::test]
    async fn test_load_without_settings_table_uses_defaults() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        let settings = DashboardSettings::load(&pool).await;
        assert_eq!(settings.window.hours(), 24);
        assert_eq!(settings.pollutant_filter, "all");
    }

    #[tokio::test]
    async fn test_load_clamps_and_validates() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE settings (key TEXT PRIMARY KEY, value TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        for (key, value) in [
            ("dashboard_window_hours", "7"),
            ("dashboard_refresh_interval_secs", "120"),
            ("dashboard_auto_refresh", "true"),
            ("dashboard_region_filter", "TX"),
        ] {
            sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await
                .unwrap();
        }

        let settings = DashboardSettings::load(&pool).await;
        // 7 is off the window menu, falls back to 24
        assert_eq!(settings.window.hours(), 24);
        assert_eq!(settings.refresh_interval_secs, 60);
        assert!(settings.auto_refresh);
        assert_eq!(settings.region_filter, "TX");
    }
}
