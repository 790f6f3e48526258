//! Venue ranking.
//!
//! A pass keeps the nearest venues first and only then scores them, which
//! bounds the number of forecast lookups to `limit`. Venues are scored
//! concurrently; one that fails to score is dropped from the pass.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use parking_lot::Mutex;
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::cache::ProximityCache;
use crate::conditions::ConditionSource;
use crate::courses::Course;
use crate::geo::{distance_km, Coordinate};
use crate::provider::ForecastSource;
use crate::scoring::score;
use crate::types::{ConditionReport, WeatherError, WeatherScore};
use crate::window::select_window;

/// Weekday rounds default to after work.
const AFTER_WORK_HOUR: u32 = 17;
const AFTER_WORK_CUTOFF_HOUR: u32 = 16;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVenue {
    pub course: Course,
    pub distance_km: f64,
    pub score: WeatherScore,
    /// Report that fed the score, kept for display
    pub condition: Option<ConditionReport>,
    /// Average user ratings by dimension
    pub ratings: BTreeMap<String, f64>,
}

/// Result of one ranking pass, best first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    /// Increases with every pass started by the same `Ranker`
    pub generation: u64,
    pub start_hour: u32,
    pub entries: Vec<RankedVenue>,
}

pub struct Ranker {
    cache: Arc<ProximityCache>,
    forecasts: Arc<dyn ForecastSource>,
    conditions: Arc<dyn ConditionSource>,
    min_holes: u32,
    generation: AtomicU64,
}

impl Ranker {
    pub fn new(
        cache: Arc<ProximityCache>,
        forecasts: Arc<dyn ForecastSource>,
        conditions: Arc<dyn ConditionSource>,
    ) -> Self {
        Self {
            cache,
            forecasts,
            conditions,
            min_holes: 0,
            generation: AtomicU64::new(0),
        }
    }

    /// Drop venues with fewer holes before the distance filter.
    pub fn with_min_holes(mut self, min_holes: u32) -> Self {
        self.min_holes = min_holes;
        self
    }

    pub fn cache(&self) -> &Arc<ProximityCache> {
        &self.cache
    }

    /// Rank the `limit` venues nearest to `user` by weather at `start_hour`.
    ///
    /// # Errors
    /// `InvalidStartHour` when `start_hour > 23`. Per-venue failures never
    /// fail the pass.
    pub async fn rank(
        &self,
        venues: &[Course],
        user: Coordinate,
        start_hour: u32,
        limit: usize,
    ) -> Result<Ranking, WeatherError> {
        if start_hour > 23 {
            return Err(WeatherError::InvalidStartHour(start_hour));
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut candidates: Vec<(Course, f64)> = venues
            .iter()
            .filter(|course| course.holes >= self.min_holes)
            .map(|course| (course.clone(), distance_km(user, course.location)))
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(limit);

        tracing::debug!(
            "Ranking pass {}: scoring {} of {} venues near {} at {:02}:00",
            generation,
            candidates.len(),
            venues.len(),
            user,
            start_hour
        );

        let ids: Vec<u32> = candidates.iter().map(|(course, _)| course.id).collect();
        self.conditions.prefetch(&ids).await;

        let mut tasks = JoinSet::new();
        for (index, (course, distance_km)) in candidates.into_iter().enumerate() {
            let cache = Arc::clone(&self.cache);
            let forecasts = Arc::clone(&self.forecasts);
            let conditions = Arc::clone(&self.conditions);

            tasks.spawn(async move {
                let forecast = cache.get_forecast(course.location, forecasts.as_ref()).await;
                let data = conditions.course_data(course.id).await;
                let result = select_window(&forecast, start_hour)
                    .map(|window| score(&window, data.condition.as_ref()));
                (index, course, distance_km, data, result)
            });
        }

        let mut scored = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, course, distance_km, data, Ok(score))) => {
                    scored.push((
                        index,
                        RankedVenue {
                            course,
                            distance_km,
                            score,
                            condition: data.condition,
                            ratings: data.ratings,
                        },
                    ));
                }
                Ok((_, course, _, _, Err(e))) => {
                    tracing::warn!("Excluding {} from ranking: {}", course.name, e);
                }
                Err(e) => tracing::warn!("Scoring task failed: {}", e),
            }
        }

        scored.sort_by(|(ia, a), (ib, b)| by_score_then_distance(a, b).then(ia.cmp(ib)));
        let entries: Vec<RankedVenue> = scored.into_iter().map(|(_, venue)| venue).collect();

        tracing::info!(
            "Ranking pass {} complete: {} venues ranked (cache holds {} locations)",
            generation,
            entries.len(),
            self.cache.len()
        );

        Ok(Ranking {
            generation,
            start_hour,
            entries,
        })
    }
}

fn by_score_then_distance(a: &RankedVenue, b: &RankedVenue) -> CmpOrdering {
    b.score
        .overall
        .total_cmp(&a.score.overall)
        .then(a.distance_km.total_cmp(&b.distance_km))
}

/// Latest published ranking. A pass that finishes after a newer one has been
/// published is discarded.
#[derive(Debug, Default)]
pub struct RankingBoard {
    current: Mutex<Option<Arc<Ranking>>>,
}

impl RankingBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `ranking` replaced the displayed one.
    pub fn publish(&self, ranking: Ranking) -> bool {
        let mut current = self.current.lock();
        if let Some(shown) = current.as_ref() {
            if shown.generation >= ranking.generation {
                tracing::debug!(
                    "Discarding stale ranking pass {} (showing {})",
                    ranking.generation,
                    shown.generation
                );
                return false;
            }
        }
        *current = Some(Arc::new(ranking));
        true
    }

    pub fn current(&self) -> Option<Arc<Ranking>> {
        self.current.lock().clone()
    }
}

/// Suggested round start: 17:00 on a weekday before 16:00, otherwise the
/// next hour.
pub fn default_start_hour(now: NaiveDateTime) -> u32 {
    let weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    if weekday && now.hour() < AFTER_WORK_CUTOFF_HOUR {
        AFTER_WORK_HOUR
    } else {
        (now.hour() + 1) % 24
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{InMemoryConditions, NoConditions};
    use crate::provider::StaticForecastSource;
    use crate::types::HourlySeries;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    /// Serves a per-location series keyed by rounded latitude.
    struct ByLatitude {
        series: HashMap<i64, HourlySeries>,
        default: HourlySeries,
    }

    #[async_trait]
    impl ForecastSource for ByLatitude {
        async fn fetch(&self, at: Coordinate) -> Result<HourlySeries, WeatherError> {
            let key = at.lat().round() as i64;
            Ok(self.series.get(&key).unwrap_or(&self.default).clone())
        }
    }

    fn bundled() -> HourlySeries {
        StaticForecastSource::bundled().unwrap().series().clone()
    }

    fn rainy() -> HourlySeries {
        let base = bundled();
        let len = base.len();
        HourlySeries::with_gaps(
            base.time().to_vec(),
            base.temperature_f().to_vec(),
            vec![Some(90.0); len],
            vec![Some(4.0); len],
            base.wind_speed_kmh().to_vec(),
        )
        .unwrap()
    }

    fn course(id: u32, holes: u32, lat: f64, lon: f64) -> Course {
        Course {
            id,
            name: format!("Course {}", id),
            holes,
            location: Coordinate::new(lat, lon).unwrap(),
        }
    }

    fn ranker(forecasts: Arc<dyn ForecastSource>, conditions: Arc<dyn ConditionSource>) -> Ranker {
        let cache = Arc::new(ProximityCache::new(10.0, bundled()));
        Ranker::new(cache, forecasts, conditions)
    }

    fn user() -> Coordinate {
        Coordinate::new(45.0, -122.0).unwrap()
    }

    #[tokio::test]
    async fn test_rank_sorts_by_score() {
        let forecasts = ByLatitude {
            series: HashMap::from([(46, rainy())]),
            default: bundled(),
        };
        let ranker = ranker(Arc::new(forecasts), Arc::new(NoConditions));
        let venues = vec![course(1, 18, 45.6, -122.0), course(2, 18, 44.2, -122.0)];

        let ranking = ranker.rank(&venues, user(), 10, 10).await.unwrap();
        assert_eq!(ranking.entries.len(), 2);
        // Course 1 is nearer but rainy.
        assert_eq!(ranking.entries[0].course.id, 2);
        assert!(ranking.entries[0].score.overall > ranking.entries[1].score.overall);
    }

    #[tokio::test]
    async fn test_distance_filter_runs_before_scoring() {
        let forecasts = ByLatitude {
            series: HashMap::from([(45, rainy())]),
            default: bundled(),
        };
        let ranker = ranker(Arc::new(forecasts), Arc::new(NoConditions));
        // The farther venue would score better but is cut by the limit.
        let venues = vec![course(1, 18, 47.0, -122.0), course(2, 18, 45.1, -122.0)];

        let ranking = ranker.rank(&venues, user(), 10, 1).await.unwrap();
        assert_eq!(ranking.entries.len(), 1);
        assert_eq!(ranking.entries[0].course.id, 2);
        assert_eq!(ranker.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_min_holes_filter() {
        let ranker = ranker(Arc::new(StaticForecastSource::bundled().unwrap()), Arc::new(NoConditions))
            .with_min_holes(18);
        let venues = vec![course(1, 9, 45.01, -122.0), course(2, 18, 45.5, -122.0)];

        let ranking = ranker.rank(&venues, user(), 10, 10).await.unwrap();
        let ids: Vec<u32> = ranking.entries.iter().map(|e| e.course.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_ties_prefer_nearer_venue() {
        let ranker = ranker(Arc::new(StaticForecastSource::bundled().unwrap()), Arc::new(NoConditions));
        let venues = vec![course(1, 18, 45.3, -122.0), course(2, 18, 45.1, -122.0)];

        let ranking = ranker.rank(&venues, user(), 12, 10).await.unwrap();
        assert_eq!(ranking.entries[0].score.overall, ranking.entries[1].score.overall);
        assert_eq!(ranking.entries[0].course.id, 2);
    }

    #[tokio::test]
    async fn test_condition_report_lowers_venue() {
        let conditions = InMemoryConditions::default();
        conditions.submit(2, ConditionReport::new(1).unwrap());
        let ranker = ranker(Arc::new(StaticForecastSource::bundled().unwrap()), Arc::new(conditions));
        let venues = vec![course(1, 18, 45.3, -122.0), course(2, 18, 45.1, -122.0)];

        let ranking = ranker.rank(&venues, user(), 12, 10).await.unwrap();
        assert_eq!(ranking.entries[0].course.id, 1);
        assert!(ranking.entries[0].condition.is_none());
        assert_eq!(ranking.entries[1].condition.as_ref().map(|c| c.rating), Some(1));
    }

    #[tokio::test]
    async fn test_invalid_start_hour_is_surfaced() {
        let ranker = ranker(Arc::new(StaticForecastSource::bundled().unwrap()), Arc::new(NoConditions));
        let venues = vec![course(1, 18, 45.3, -122.0)];
        let err = ranker.rank(&venues, user(), 24, 10).await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidStartHour(24)));
        assert!(ranker.cache().is_empty());
    }

    #[tokio::test]
    async fn test_round_before_forecast_origin_reads_first_hours() {
        // Forecast starts at 12:00, round at 09:00: every quantity reads
        // from hour 0 onward, so the rain later in the day is not seen.
        let time = bundled().time()[12..24].to_vec();
        let mut temperature = vec![60.0, 62.0, 64.0];
        temperature.extend([80.0; 9]);
        let mut probability = vec![0.0; 3];
        probability.extend([100.0; 9]);
        let mut precip = vec![0.0; 3];
        precip.extend([6.0; 9]);
        let afternoon = HourlySeries::new(time, temperature, probability, precip, vec![5.0; 12]).unwrap();

        let ranker = ranker(Arc::new(StaticForecastSource::new(afternoon)), Arc::new(NoConditions));
        let ranking = ranker
            .rank(&[course(1, 18, 45.1, -122.0)], user(), 9, 10)
            .await
            .unwrap();

        assert_eq!(ranking.entries.len(), 1);
        let breakdown = &ranking.entries[0].score.breakdown;
        assert!((breakdown.temperature.raw.fahrenheit - 62.0).abs() < 1e-9);
        assert_eq!(breakdown.precipitation.raw.mm, 0.0);
        assert_eq!(breakdown.precipitation.raw.probability, 0.0);
    }

    #[tokio::test]
    async fn test_unscorable_venue_is_excluded() {
        // Forecast starting at 12:00 with only 2 hours: round at 20:00 is out of range.
        let short = HourlySeries::new(
            bundled().time()[12..14].to_vec(),
            vec![60.0; 2],
            vec![0.0; 2],
            vec![0.0; 2],
            vec![5.0; 2],
        )
        .unwrap();
        let forecasts = ByLatitude {
            series: HashMap::from([(47, short)]),
            default: bundled(),
        };
        let ranker = ranker(Arc::new(forecasts), Arc::new(NoConditions));
        let venues = vec![course(1, 18, 47.0, -122.0), course(2, 18, 45.1, -122.0)];

        let ranking = ranker.rank(&venues, user(), 20, 10).await.unwrap();
        let ids: Vec<u32> = ranking.entries.iter().map(|e| e.course.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_board_discards_stale_pass() {
        let ranker = ranker(Arc::new(StaticForecastSource::bundled().unwrap()), Arc::new(NoConditions));
        let venues = vec![course(1, 18, 45.1, -122.0)];

        let first = ranker.rank(&venues, user(), 9, 10).await.unwrap();
        let second = ranker.rank(&venues, user(), 15, 10).await.unwrap();
        assert!(second.generation > first.generation);

        let board = RankingBoard::new();
        assert!(board.publish(second));
        assert!(!board.publish(first));
        assert_eq!(board.current().unwrap().start_hour, 15);
    }

    #[test]
    fn test_default_start_hour() {
        let at = |y, m, d, h| {
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, 30, 0)
                .unwrap()
        };
        // 2024-06-12 is a Wednesday, 2024-06-15 a Saturday.
        assert_eq!(default_start_hour(at(2024, 6, 12, 9)), 17);
        assert_eq!(default_start_hour(at(2024, 6, 12, 16)), 17);
        assert_eq!(default_start_hour(at(2024, 6, 12, 19)), 20);
        assert_eq!(default_start_hour(at(2024, 6, 15, 9)), 10);
        assert_eq!(default_start_hour(at(2024, 6, 15, 23)), 0);
    }
}
