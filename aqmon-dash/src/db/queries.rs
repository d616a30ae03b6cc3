//! Window-bounded read queries against the measurement store
//!
//! All four dashboard queries take the recency window as a bound
//! parameter (cutoff computed here, never spliced into query text).
//! Aggregation is delegated to SQLite; rows decode into the typed
//! records from `aqmon-common`.

use aqmon_common::{
    HourlyPoint, PollutantSummary, Reading, RegionSummary, Result, TimeWindow,
};
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;

/// Latest readings inside the window, newest first
pub async fn fetch_latest_readings(pool: &SqlitePool, window: TimeWindow) -> Result<Vec<Reading>> {
    let cutoff = window.cutoff(Utc::now());
    let readings = sqlx::query_as::<_, Reading>(
        "SELECT id, recorded_at, city, region, latitude, longitude, pollutant, aqi, category
         FROM readings
         WHERE recorded_at > ?
         ORDER BY recorded_at DESC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(readings)
}

/// Per-region aggregates over readings with a non-null AQI,
/// ordered by mean AQI descending
pub async fn fetch_summary_by_region(
    pool: &SqlitePool,
    window: TimeWindow,
) -> Result<Vec<RegionSummary>> {
    let cutoff = window.cutoff(Utc::now());
    let rows = sqlx::query_as::<_, RegionSummary>(
        "SELECT region,
                COUNT(*) AS reading_count,
                AVG(aqi) AS mean_aqi,
                MAX(aqi) AS max_aqi,
                MIN(aqi) AS min_aqi
         FROM readings
         WHERE recorded_at > ? AND aqi IS NOT NULL
         GROUP BY region
         ORDER BY mean_aqi DESC",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per-pollutant aggregates over readings with a non-null AQI,
/// ordered alphabetically by pollutant code
pub async fn fetch_summary_by_pollutant(
    pool: &SqlitePool,
    window: TimeWindow,
) -> Result<Vec<PollutantSummary>> {
    let cutoff = window.cutoff(Utc::now());
    let rows = sqlx::query_as::<_, PollutantSummary>(
        "SELECT pollutant,
                COUNT(*) AS reading_count,
                AVG(aqi) AS mean_aqi,
                MAX(aqi) AS max_aqi
         FROM readings
         WHERE recorded_at > ? AND aqi IS NOT NULL
         GROUP BY pollutant
         ORDER BY pollutant",
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per-(hour, pollutant) mean AQI and reading count, chronological
///
/// The hour bucket is the reading timestamp truncated to the hour.
/// The pollutant filter is applied only when one is selected.
pub async fn fetch_hourly_series(
    pool: &SqlitePool,
    window: TimeWindow,
    pollutant: Option<&str>,
) -> Result<Vec<HourlyPoint>> {
    let cutoff = window.cutoff(Utc::now());

    let rows: Vec<(i64, String, Option<f64>, i64)> = match pollutant {
        Some(code) => {
            sqlx::query_as(
                "SELECT (CAST(strftime('%s', recorded_at) AS INTEGER) / 3600) * 3600 AS hour_epoch,
                        pollutant,
                        AVG(aqi) AS mean_aqi,
                        COUNT(*) AS reading_count
                 FROM readings
                 WHERE recorded_at > ? AND pollutant = ?
                 GROUP BY hour_epoch, pollutant
                 ORDER BY hour_epoch",
            )
            .bind(cutoff)
            .bind(code)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT (CAST(strftime('%s', recorded_at) AS INTEGER) / 3600) * 3600 AS hour_epoch,
                        pollutant,
                        AVG(aqi) AS mean_aqi,
                        COUNT(*) AS reading_count
                 FROM readings
                 WHERE recorded_at > ?
                 GROUP BY hour_epoch, pollutant
                 ORDER BY hour_epoch",
            )
            .bind(cutoff)
            .fetch_all(pool)
            .await?
        }
    };

    let points = rows
        .into_iter()
        .filter_map(|(hour_epoch, pollutant, mean_aqi, reading_count)| {
            Utc.timestamp_opt(hour_epoch, 0)
                .single()
                .map(|hour| HourlyPoint {
                    hour,
                    pollutant,
                    mean_aqi,
                    reading_count,
                })
        })
        .collect();

    Ok(points)
}

/// Distinct field values for the prediction form selectors
#[derive(Debug, Clone, serde::Serialize)]
pub struct DistinctValues {
    pub cities: Vec<String>,
    pub regions: Vec<String>,
    pub pollutants: Vec<String>,
    pub categories: Vec<String>,
}

/// Distinct cities, regions, pollutants, and stored category labels
pub async fn fetch_distinct_values(pool: &SqlitePool) -> Result<DistinctValues> {
    let cities = fetch_distinct_column(pool, "SELECT DISTINCT city FROM readings ORDER BY city").await?;
    let regions =
        fetch_distinct_column(pool, "SELECT DISTINCT region FROM readings ORDER BY region").await?;
    let pollutants = fetch_distinct_column(
        pool,
        "SELECT DISTINCT pollutant FROM readings ORDER BY pollutant",
    )
    .await?;
    let categories = fetch_distinct_column(
        pool,
        "SELECT DISTINCT category FROM readings WHERE category IS NOT NULL ORDER BY category",
    )
    .await?;

    Ok(DistinctValues {
        cities,
        regions,
        pollutants,
        categories,
    })
}

async fn fetch_distinct_column(pool: &SqlitePool, sql: &str) -> Result<Vec<String>> {
    let values: Vec<(String,)> = sqlx::query_as(sql).fetch_all(pool).await?;
    Ok(values.into_iter().map(|(v,)| v).collect())
}
