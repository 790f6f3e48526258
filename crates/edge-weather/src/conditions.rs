//! On-site condition reports and course ratings.
//!
//! A venue may carry several recent user reports. They are folded into one
//! report by a time-weighted average, where each day of age costs a fixed
//! share of the weight and reports past the age limit drop out.
//!
//! The HTTP source keeps what it fetched for the rest of the session and can
//! load a whole ranking pass worth of venues in one bulk request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edge_core::ConditionsConfig;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::types::{ConditionReport, WeatherError};

/// What is known about a venue besides its weather.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CourseData {
    /// Average user rating per dimension, e.g. `quality` or `difficulty`
    pub ratings: BTreeMap<String, f64>,
    pub condition: Option<ConditionReport>,
}

/// Looks up ratings and the current on-site condition for a venue.
///
/// Lookups never fail: missing or unreachable data is empty.
#[async_trait]
pub trait ConditionSource: Send + Sync {
    /// Load a batch of venues ahead of the per-venue lookups.
    async fn prefetch(&self, _venue_ids: &[u32]) {}

    async fn course_data(&self, venue_id: u32) -> CourseData;

    async fn condition(&self, venue_id: u32) -> Option<ConditionReport> {
        self.course_data(venue_id).await.condition
    }
}

/// No data for any venue.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConditions;

#[async_trait]
impl ConditionSource for NoConditions {
    async fn course_data(&self, _venue_id: u32) -> CourseData {
        CourseData::default()
    }
}

/// How report age discounts a report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConditionWeighting {
    /// Newest reports considered per venue
    pub max_reports: usize,
    pub daily_penalty_rate: f64,
    pub min_weight: f64,
    pub max_age_days: u32,
}

impl Default for ConditionWeighting {
    fn default() -> Self {
        Self::from(&ConditionsConfig::default())
    }
}

impl From<&ConditionsConfig> for ConditionWeighting {
    fn from(config: &ConditionsConfig) -> Self {
        Self {
            max_reports: config.max_reports,
            daily_penalty_rate: config.daily_penalty_rate,
            min_weight: config.min_weight,
            max_age_days: config.max_age_days,
        }
    }
}

impl ConditionWeighting {
    /// `max(1 - days * rate, min_weight)`, or 0 past the age limit.
    pub fn calculate_weight(&self, days_old: u32) -> f64 {
        if days_old > self.max_age_days {
            return 0.0;
        }
        (1.0 - f64::from(days_old) * self.daily_penalty_rate).max(self.min_weight)
    }
}

/// Fold a venue's reports into one.
///
/// Uses the newest `max_reports`; undated reports count as fresh. The rating
/// is the weighted mean rounded to the nearest whole rating, and the
/// description and timestamp come from the newest contributing report.
/// Returns `None` when nothing carries weight.
pub fn aggregate_reports(
    reports: &[ConditionReport],
    now: DateTime<Utc>,
    weighting: &ConditionWeighting,
) -> Option<ConditionReport> {
    let mut newest_first: Vec<&ConditionReport> = reports.iter().collect();
    newest_first.sort_by_key(|r| std::cmp::Reverse(r.observed_at.unwrap_or(now)));

    let weighted: Vec<(&ConditionReport, f64)> = newest_first
        .into_iter()
        .take(weighting.max_reports)
        .map(|report| {
            let days = report
                .observed_at
                .map_or(0, |at| (now - at).num_days().max(0));
            let days = u32::try_from(days).unwrap_or(u32::MAX);
            (report, weighting.calculate_weight(days))
        })
        .filter(|(_, weight)| *weight > 0.0)
        .collect();

    let (newest, _) = weighted.first()?;

    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    let weighted_rating: f64 = weighted
        .iter()
        .map(|(report, w)| f64::from(report.rating) * w)
        .sum();
    let rating = (weighted_rating / total_weight)
        .round()
        .clamp(f64::from(ConditionReport::MIN_RATING), f64::from(ConditionReport::MAX_RATING));

    Some(ConditionReport {
        rating: rating as u8,
        description: newest.description.clone(),
        observed_at: newest.observed_at,
    })
}

/// Short relative age for display: "just now", "5m ago", "3h ago", "2d ago", "1w ago".
pub fn format_condition_age(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - observed_at).num_minutes();
    let hours = minutes / 60;
    let days = hours / 24;

    if minutes < 60 {
        if minutes <= 1 {
            "just now".to_string()
        } else {
            format!("{}m ago", minutes)
        }
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        format!("{}w ago", days / 7)
    }
}

/// Reports held in memory, keyed by venue id.
#[derive(Debug, Default)]
pub struct InMemoryConditions {
    weighting: ConditionWeighting,
    reports: RwLock<HashMap<u32, Vec<ConditionReport>>>,
}

impl InMemoryConditions {
    pub fn new(weighting: ConditionWeighting) -> Self {
        Self {
            weighting,
            reports: RwLock::new(HashMap::new()),
        }
    }

    /// Record a report; an undated report is stamped with the current time.
    pub fn submit(&self, venue_id: u32, mut report: ConditionReport) {
        if report.observed_at.is_none() {
            report.observed_at = Some(Utc::now());
        }
        tracing::debug!("Condition report {} for venue {}", report.rating, venue_id);
        self.reports.write().entry(venue_id).or_default().push(report);
    }

    pub fn condition_at(&self, venue_id: u32, now: DateTime<Utc>) -> Option<ConditionReport> {
        let reports = self.reports.read();
        aggregate_reports(reports.get(&venue_id)?, now, &self.weighting)
    }
}

#[async_trait]
impl ConditionSource for InMemoryConditions {
    async fn course_data(&self, venue_id: u32) -> CourseData {
        CourseData {
            ratings: BTreeMap::new(),
            condition: self.condition_at(venue_id, Utc::now()),
        }
    }
}

/// Body of `/api/courses/{id}/data`, and each value of the bulk response.
#[derive(Debug, Deserialize)]
struct CourseDataResponse {
    #[serde(default)]
    ratings: BTreeMap<String, f64>,
    #[serde(default)]
    conditions: Option<WireCondition>,
}

#[derive(Debug, Deserialize)]
struct WireCondition {
    rating: i64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl WireCondition {
    fn into_report(self) -> Result<ConditionReport, WeatherError> {
        let mut report = ConditionReport::new(self.rating)?;
        report.description = self.description.filter(|d| !d.is_empty());
        report.observed_at = self.timestamp;
        Ok(report)
    }
}

impl CourseDataResponse {
    fn into_course_data(self, venue_id: u32) -> CourseData {
        let condition = match self.conditions.map(WireCondition::into_report) {
            Some(Ok(report)) => Some(report),
            Some(Err(e)) => {
                tracing::warn!("Ignoring condition for venue {}: {}", venue_id, e);
                None
            }
            None => None,
        };

        CourseData {
            ratings: self.ratings,
            condition,
        }
    }
}

/// Reads ratings and aggregated reports from the course data backend.
///
/// Venues found are kept for the life of the source; a venue the backend
/// has nothing for is asked again next time.
#[derive(Debug, Clone)]
pub struct HttpConditionSource {
    client: Arc<Client>,
    base_url: Url,
    cache: Arc<RwLock<HashMap<u32, CourseData>>>,
}

impl HttpConditionSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client: Arc::new(client),
            base_url: Url::parse(base_url)?,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn api_url(&self, path: &str) -> Result<Url, WeatherError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}/api/courses/{}", base, path))?)
    }

    pub fn course_data_url(&self, venue_id: u32) -> Result<Url, WeatherError> {
        self.api_url(&format!("{}/data", venue_id))
    }

    /// `/api/courses/bulk?ids=1,2,3`
    pub fn bulk_url(&self, venue_ids: &[u32]) -> Result<Url, WeatherError> {
        let ids: Vec<String> = venue_ids.iter().map(u32::to_string).collect();
        let mut url = self.api_url("bulk")?;
        url.query_pairs_mut().append_pair("ids", &ids.join(","));
        Ok(url)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    fn cached(&self, venue_id: u32) -> Option<CourseData> {
        self.cache.read().get(&venue_id).cloned()
    }

    /// Sorted, deduplicated ids not cached yet.
    fn uncached(&self, venue_ids: &[u32]) -> Vec<u32> {
        let cache = self.cache.read();
        let mut ids: Vec<u32> = venue_ids
            .iter()
            .copied()
            .filter(|id| !cache.contains_key(id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    async fn fetch(&self, venue_id: u32) -> Result<Option<CourseData>, WeatherError> {
        let url = self.course_data_url(venue_id)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("No course data for venue {}", venue_id);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(WeatherError::CourseDataUnavailable(format!(
                "backend returned {} for venue {}",
                status, venue_id
            )));
        }

        let body: CourseDataResponse = response.json().await?;
        Ok(Some(body.into_course_data(venue_id)))
    }

    async fn fetch_bulk(&self, venue_ids: &[u32]) -> Result<HashMap<u32, CourseData>, WeatherError> {
        let url = self.bulk_url(venue_ids)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::CourseDataUnavailable(format!(
                "bulk request for {} venues returned {}",
                venue_ids.len(),
                status
            )));
        }

        let body: HashMap<u32, CourseDataResponse> = response.json().await?;
        Ok(body
            .into_iter()
            .map(|(id, data)| (id, data.into_course_data(id)))
            .collect())
    }
}

#[async_trait]
impl ConditionSource for HttpConditionSource {
    async fn prefetch(&self, venue_ids: &[u32]) {
        let missing = self.uncached(venue_ids);
        if missing.is_empty() {
            return;
        }

        match self.fetch_bulk(&missing).await {
            Ok(data) => {
                tracing::info!(
                    "Fetched course data for {} of {} venues",
                    data.len(),
                    missing.len()
                );
                self.cache.write().extend(data);
            }
            Err(e) => tracing::warn!("Continuing without bulk course data: {}", e),
        }
    }

    async fn course_data(&self, venue_id: u32) -> CourseData {
        if let Some(data) = self.cached(venue_id) {
            return data;
        }

        match self.fetch(venue_id).await {
            Ok(Some(data)) => {
                self.cache.write().insert(venue_id, data.clone());
                data
            }
            Ok(None) => CourseData::default(),
            Err(e) => {
                tracing::warn!("No course data for venue {}: {}", venue_id, e);
                CourseData::default()
            }
        }
    }
}
