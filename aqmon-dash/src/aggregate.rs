//! Summary computation over the filtered reading set
//!
//! Everything here is derived fresh each refresh cycle and published as
//! one immutable `SummaryView`. The aggregator is only invoked on a
//! non-empty filtered set; the refresh controller short-circuits to its
//! empty state before this point otherwise.

use std::collections::{HashMap, HashSet};

use aqmon_common::{HourlyPoint, PollutantSummary, Reading, RegionSummary, TimeWindow};
use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::filter::FilterSelection;

/// Headline metrics over the filtered set
///
/// `mean_aqi`/`max_aqi` cover non-null AQI values only and are None when
/// every reading in the set lacks an AQI value; `reading_count` counts
/// all rows regardless.
#[derive(Debug, Clone, Serialize)]
pub struct OverallMetrics {
    pub mean_aqi: Option<f64>,
    /// Classifier band of the mean AQI (breakpoint-derived, independent
    /// of the stored category labels)
    pub mean_category: String,
    pub max_aqi: Option<f64>,
    pub reading_count: usize,
    pub city_count: usize,
    pub region_count: usize,
}

/// One slice of the category distribution
///
/// `label` is the category stored with the reading by the ingestion
/// pipeline (missing labels land in "Unknown"); it is reported as-is,
/// never recomputed from the classifier breakpoints.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySlice {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

/// The aggregated snapshot published once per refresh cycle
#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub generated_at: DateTime<Utc>,
    pub window_hours: i64,
    pub filters: FilterSelection,
    pub overall: OverallMetrics,
    /// Most recent reading per city, for map display
    pub latest_per_city: Vec<Reading>,
    pub category_distribution: Vec<CategorySlice>,
    /// Reading counts per hour of day, index 0-23
    pub hour_counts: Vec<u64>,
    pub by_region: Vec<RegionSummary>,
    pub by_pollutant: Vec<PollutantSummary>,
    pub hourly_series: Vec<HourlyPoint>,
}

impl SummaryView {
    /// Assemble the view from the filtered readings and the three
    /// store-side aggregate row sets fetched in the same cycle
    pub fn build(
        window: TimeWindow,
        filters: FilterSelection,
        filtered: &[Reading],
        by_region: Vec<RegionSummary>,
        by_pollutant: Vec<PollutantSummary>,
        hourly_series: Vec<HourlyPoint>,
    ) -> Self {
        debug_assert!(!filtered.is_empty(), "aggregator requires a non-empty set");

        SummaryView {
            generated_at: Utc::now(),
            window_hours: window.hours(),
            filters,
            overall: overall_metrics(filtered),
            latest_per_city: latest_per_city(filtered),
            category_distribution: category_distribution(filtered),
            hour_counts: hour_of_day_counts(filtered),
            by_region,
            by_pollutant,
            hourly_series,
        }
    }
}

/// Mean/max AQI over non-null values, plus row and distinct-place counts
pub fn overall_metrics(readings: &[Reading]) -> OverallMetrics {
    let mut sum = 0.0;
    let mut count_with_aqi = 0usize;
    let mut max_aqi: Option<f64> = None;

    for aqi in readings.iter().filter_map(|r| r.aqi) {
        sum += aqi;
        count_with_aqi += 1;
        max_aqi = Some(match max_aqi {
            Some(current) if current >= aqi => current,
            _ => aqi,
        });
    }

    let mean_aqi = if count_with_aqi > 0 {
        Some(sum / count_with_aqi as f64)
    } else {
        None
    };

    let cities: HashSet<&str> = readings.iter().map(|r| r.city.as_str()).collect();
    let regions: HashSet<&str> = readings.iter().map(|r| r.region.as_str()).collect();

    OverallMetrics {
        mean_aqi,
        mean_category: aqmon_common::AqiCategory::classify(mean_aqi)
            .display_name()
            .to_string(),
        max_aqi,
        reading_count: readings.len(),
        city_count: cities.len(),
        region_count: regions.len(),
    }
}

/// The single most recent reading per city, ordered by city name
///
/// Ties on the maximum timestamp resolve last-wins in input order: the
/// set is stable-sorted by timestamp ascending and later rows replace
/// earlier ones, so among equal timestamps the reading that arrived last
/// in the input wins. Deterministic for a fixed input order.
pub fn latest_per_city(readings: &[Reading]) -> Vec<Reading> {
    let mut ascending: Vec<&Reading> = readings.iter().collect();
    ascending.sort_by_key(|r| r.recorded_at);

    let mut latest: HashMap<&str, &Reading> = HashMap::new();
    for reading in ascending {
        latest.insert(reading.city.as_str(), reading);
    }

    let mut snapshot: Vec<Reading> = latest.into_values().cloned().collect();
    snapshot.sort_by(|a, b| a.city.cmp(&b.city));
    snapshot
}

/// Count and percentage of rows per stored category label
///
/// Percentages divide by the full filtered row count, so they sum to
/// 100 (within rounding) over a non-empty set. Ordered by count
/// descending, then label, for stable display.
pub fn category_distribution(readings: &[Reading]) -> Vec<CategorySlice> {
    let total = readings.len();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for reading in readings {
        let label = reading.category.as_deref().unwrap_or("Unknown");
        *counts.entry(label).or_insert(0) += 1;
    }

    let mut slices: Vec<CategorySlice> = counts
        .into_iter()
        .map(|(label, count)| CategorySlice {
            label: label.to_string(),
            count,
            percent: count as f64 / total as f64 * 100.0,
        })
        .collect();

    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    slices
}

/// Reading counts per hour of day (0-23), from each timestamp's hour
pub fn hour_of_day_counts(readings: &[Reading]) -> Vec<u64> {
    let mut counts = vec![0u64; 24];
    for reading in readings {
        counts[reading.recorded_at.hour() as usize] += 1;
    }
    counts
}
