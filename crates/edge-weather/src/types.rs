use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use edge_core::{AppError, ConfigError, DataError, ForecastError};
use serde::{Deserialize, Serialize};

/// Hourly forecast aligned on a local-time origin.
///
/// All five sequences share one length (at least 1) and `time` advances in
/// exact one-hour steps. `time[0]` is the forecast origin. A quantity may be
/// missing (`None`) for an hour the upstream model does not cover.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    time: Vec<NaiveDateTime>,
    temperature_f: Vec<Option<f64>>,
    precip_probability_pct: Vec<Option<f64>>,
    precip_mm: Vec<Option<f64>>,
    wind_speed_kmh: Vec<Option<f64>>,
}

impl HourlySeries {
    /// Series with a value for every hour.
    pub fn new(
        time: Vec<NaiveDateTime>,
        temperature_f: Vec<f64>,
        precip_probability_pct: Vec<f64>,
        precip_mm: Vec<f64>,
        wind_speed_kmh: Vec<f64>,
    ) -> Result<Self, WeatherError> {
        Self::with_gaps(
            time,
            present(temperature_f),
            present(precip_probability_pct),
            present(precip_mm),
            present(wind_speed_kmh),
        )
    }

    pub fn with_gaps(
        time: Vec<NaiveDateTime>,
        temperature_f: Vec<Option<f64>>,
        precip_probability_pct: Vec<Option<f64>>,
        precip_mm: Vec<Option<f64>>,
        wind_speed_kmh: Vec<Option<f64>>,
    ) -> Result<Self, WeatherError> {
        let len = time.len();
        if len == 0 {
            return Err(WeatherError::MalformedSeries("series is empty".into()));
        }

        for (name, values) in [
            ("temperature", &temperature_f),
            ("precipitation probability", &precip_probability_pct),
            ("precipitation", &precip_mm),
            ("wind speed", &wind_speed_kmh),
        ] {
            if values.len() != len {
                return Err(WeatherError::MalformedSeries(format!(
                    "{} has {} values, expected {}",
                    name,
                    values.len(),
                    len
                )));
            }
        }

        if let Some(pair) = time
            .windows(2)
            .find(|pair| pair[1] - pair[0] != TimeDelta::hours(1))
        {
            return Err(WeatherError::MalformedSeries(format!(
                "timestamps {} and {} are not one hour apart",
                pair[0], pair[1]
            )));
        }

        Ok(Self {
            time,
            temperature_f,
            precip_probability_pct,
            precip_mm,
            wind_speed_kmh,
        })
    }

    /// First timestamp of the series, in local time at the forecast point.
    pub fn origin(&self) -> NaiveDateTime {
        self.time[0]
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[NaiveDateTime] {
        &self.time
    }

    pub fn temperature_f(&self) -> &[Option<f64>] {
        &self.temperature_f
    }

    pub fn precip_probability_pct(&self) -> &[Option<f64>] {
        &self.precip_probability_pct
    }

    pub fn precip_mm(&self) -> &[Option<f64>] {
        &self.precip_mm
    }

    pub fn wind_speed_kmh(&self) -> &[Option<f64>] {
        &self.wind_speed_kmh
    }
}

fn present(values: Vec<f64>) -> Vec<Option<f64>> {
    values.into_iter().map(Some).collect()
}

/// Parse a forecast timestamp such as `2023-10-27T09:00`.
pub fn parse_local_timestamp(raw: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| WeatherError::MalformedSeries(format!("bad timestamp {:?}: {}", raw, e)))
}

/// Per-quantity averages over one round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowedAverages {
    pub precip_mm: f64,
    pub precip_probability_pct: f64,
    pub temperature_f: f64,
    pub wind_speed_mph: f64,
}

/// Human-submitted on-site condition report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    /// 1 (unplayable) to 5 (excellent)
    pub rating: u8,
    pub description: Option<String>,
    /// Only used to display how stale the report is
    #[serde(default, alias = "timestamp")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl ConditionReport {
    pub const MIN_RATING: u8 = 1;
    pub const MAX_RATING: u8 = 5;

    pub fn new(rating: i64) -> Result<Self, WeatherError> {
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (Self::MIN_RATING..=Self::MAX_RATING).contains(r))
            .ok_or(WeatherError::InvalidConditionRating(rating))?;

        Ok(Self {
            rating,
            description: None,
            observed_at: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }
}

/// Raw value, weighted penalty and 0-10 sub-score for one factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorScore<R> {
    pub raw: R,
    pub penalty: f64,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrecipitationRaw {
    pub mm: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureRaw {
    pub fahrenheit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindRaw {
    pub mph: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub precipitation: FactorScore<PrecipitationRaw>,
    pub temperature: FactorScore<TemperatureRaw>,
    pub wind: FactorScore<WindRaw>,
    pub overall: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherScore {
    pub overall: f64,
    pub breakdown: ScoreBreakdown,
}

/// Weather engine errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Invalid start hour: {0}")]
    InvalidStartHour(u32),
    #[error("Insufficient weather data. Needed {needed} hours, got {available}.")]
    InsufficientForecastData { needed: i64, available: usize },
    #[error("Forecast unavailable: {0}")]
    ForecastUnavailable(String),
    #[error("Malformed forecast series: {0}")]
    MalformedSeries(String),
    #[error("Forecast has no {quantity} values for a round at {start_hour:02}:00")]
    MissingHourlyValues { quantity: &'static str, start_hour: u32 },
    #[error("Course data unavailable: {0}")]
    CourseDataUnavailable(String),
    #[error("Condition rating must be between 1 and 5, got {0}")]
    InvalidConditionRating(i64),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl From<WeatherError> for AppError {
    fn from(e: WeatherError) -> Self {
        use edge_core::error::ReqwestErrorExt;

        match e {
            WeatherError::InvalidStartHour(hour) => {
                AppError::Forecast(ForecastError::InvalidStartHour(hour))
            }
            WeatherError::InsufficientForecastData { needed, available } => {
                AppError::Forecast(ForecastError::InsufficientData { needed, available })
            }
            WeatherError::ForecastUnavailable(msg) => {
                AppError::Forecast(ForecastError::Unavailable(msg))
            }
            WeatherError::MalformedSeries(msg) => AppError::Forecast(ForecastError::Malformed(msg)),
            e @ WeatherError::MissingHourlyValues { .. } => {
                AppError::Forecast(ForecastError::MissingValues(e.to_string()))
            }
            WeatherError::CourseDataUnavailable(msg) => {
                AppError::Data(DataError::CourseDataUnavailable(msg))
            }
            WeatherError::InvalidConditionRating(rating) => {
                AppError::Data(DataError::InvalidConditionRating(rating))
            }
            WeatherError::InvalidUrl(e) => AppError::Config(ConfigError::Invalid(e.to_string())),
            WeatherError::Network(e) => AppError::Network(e.into_network_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let origin = parse_local_timestamp("2023-10-27T00:00").unwrap();
        (0..n)
            .map(|i| origin + TimeDelta::hours(i64::try_from(i).unwrap()))
            .collect()
    }

    #[test]
    fn test_series_accepts_aligned_data() {
        let series = HourlySeries::new(
            hours(3),
            vec![65.0; 3],
            vec![10.0; 3],
            vec![0.1; 3],
            vec![5.0; 3],
        )
        .unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.origin().to_string(), "2023-10-27 00:00:00");
    }

    #[test]
    fn test_series_keeps_missing_hours() {
        let series = HourlySeries::with_gaps(
            hours(2),
            vec![Some(65.0), None],
            vec![Some(10.0), Some(20.0)],
            vec![None, Some(0.5)],
            vec![Some(5.0), Some(6.0)],
        )
        .unwrap();
        assert_eq!(series.temperature_f(), &[Some(65.0), None]);
        assert_eq!(series.precip_mm()[0], None);
    }

    #[test]
    fn test_series_rejects_empty() {
        let err = HourlySeries::new(vec![], vec![], vec![], vec![], vec![]).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedSeries(_)));
    }

    #[test]
    fn test_series_rejects_length_mismatch() {
        let err = HourlySeries::new(
            hours(3),
            vec![65.0; 3],
            vec![10.0; 2],
            vec![0.1; 3],
            vec![5.0; 3],
        )
        .unwrap_err();
        assert!(err.to_string().contains("precipitation probability"));
    }

    #[test]
    fn test_series_rejects_gaps() {
        let mut time = hours(3);
        time[2] += TimeDelta::hours(1);
        let err = HourlySeries::new(time, vec![0.0; 3], vec![0.0; 3], vec![0.0; 3], vec![0.0; 3])
            .unwrap_err();
        assert!(matches!(err, WeatherError::MalformedSeries(_)));
    }

    #[test]
    fn test_parse_timestamp_with_seconds() {
        let t = parse_local_timestamp("2023-10-27T09:30:15").unwrap();
        assert_eq!(t.to_string(), "2023-10-27 09:30:15");
        assert!(parse_local_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_condition_rating_bounds() {
        assert!(ConditionReport::new(0).is_err());
        assert!(ConditionReport::new(6).is_err());
        assert!(ConditionReport::new(-3).is_err());
        assert_eq!(ConditionReport::new(5).unwrap().rating, 5);
    }

    #[test]
    fn test_condition_report_deserializes_timestamp_alias() {
        let report: ConditionReport = serde_json::from_value(serde_json::json!({
            "rating": 2,
            "description": "Muddy fairways",
            "timestamp": "2026-10-16T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(report.rating, 2);
        assert!(report.observed_at.is_some());
    }

    #[test]
    fn test_weather_error_maps_to_app_error() {
        let app: AppError = WeatherError::InvalidStartHour(25).into();
        assert!(matches!(
            app,
            AppError::Forecast(ForecastError::InvalidStartHour(25))
        ));
    }
}
