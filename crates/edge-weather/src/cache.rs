//! Session-scoped proximity cache for forecasts.
//!
//! Query points closer than the threshold to an earlier query share its
//! forecast. The slot is inserted before the fetch starts, so concurrent
//! lookups that land on it await the same fetch and each proximity cluster
//! costs at most one upstream request. Entries are never evicted.

use edge_core::CacheConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::geo::{distance_km, Coordinate, KM_TO_MILES};
use crate::provider::ForecastSource;
use crate::types::HourlySeries;

type ForecastSlot = Arc<OnceCell<Arc<HourlySeries>>>;

#[derive(Debug)]
struct CacheEntry {
    coordinate: Coordinate,
    forecast: ForecastSlot,
}

#[derive(Debug)]
pub struct ProximityCache {
    threshold_miles: f64,
    fallback: Arc<HourlySeries>,
    entries: Mutex<Vec<CacheEntry>>,
}

impl ProximityCache {
    /// `fallback` resolves any slot whose fetch fails.
    pub fn new(threshold_miles: f64, fallback: HourlySeries) -> Self {
        Self {
            threshold_miles,
            fallback: Arc::new(fallback),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &CacheConfig, fallback: HourlySeries) -> Self {
        Self::new(config.same_weather_threshold_miles, fallback)
    }

    /// Forecast for `at`, shared with the nearest cached query point when it
    /// is within the threshold. Only a miss calls `source`.
    pub async fn get_forecast(&self, at: Coordinate, source: &dyn ForecastSource) -> Arc<HourlySeries> {
        let (origin, slot) = self.find_or_insert(at);

        let series = slot
            .get_or_init(|| async move {
                match source.fetch(origin).await {
                    Ok(series) => Arc::new(series),
                    Err(e) => {
                        tracing::warn!(
                            "Failed to fetch weather for {}: {}. Falling back to sample forecast",
                            origin,
                            e
                        );
                        Arc::clone(&self.fallback)
                    }
                }
            })
            .await;

        Arc::clone(series)
    }

    /// Nearest-or-insert under one lock so two concurrent misses for the same
    /// cluster cannot both create a slot.
    fn find_or_insert(&self, at: Coordinate) -> (Coordinate, ForecastSlot) {
        let mut entries = self.entries.lock();

        if let Some((nearest, km)) = nearest_entry(&entries, at) {
            let miles = km * KM_TO_MILES;
            if miles < self.threshold_miles {
                tracing::debug!(
                    "Using cached weather report for {} ({:.1} miles from cached location {})",
                    at,
                    miles,
                    nearest.coordinate
                );
                return (nearest.coordinate, Arc::clone(&nearest.forecast));
            }
            tracing::debug!(
                "Cache miss for {}: closest cached location is {:.1} miles away (threshold: {} miles)",
                at,
                miles,
                self.threshold_miles
            );
        }

        let slot: ForecastSlot = Arc::new(OnceCell::new());
        entries.push(CacheEntry {
            coordinate: at,
            forecast: Arc::clone(&slot),
        });
        tracing::debug!("Cached weather request for {} (cache size: {})", at, entries.len());

        (at, slot)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Query points that own a slot, in insertion order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.entries.lock().iter().map(|e| e.coordinate).collect()
    }
}

/// Linear scan; ties go to the earliest entry.
fn nearest_entry(entries: &[CacheEntry], at: Coordinate) -> Option<(&CacheEntry, f64)> {
    let mut best: Option<(&CacheEntry, f64)> = None;
    for entry in entries {
        let km = distance_km(entry.coordinate, at);
        if best.map_or(true, |(_, best_km)| km < best_km) {
            best = Some((entry, km));
        }
    }
    best
}
