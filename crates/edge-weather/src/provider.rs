//! Forecast sources.
//!
//! `OpenMeteoSource` fetches a one-day hourly forecast from an Open-Meteo
//! compatible endpoint. `StaticForecastSource` serves a fixed series and backs
//! both mock mode and the fallback used when a fetch fails.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::geo::Coordinate;
use crate::types::{parse_local_timestamp, HourlySeries, WeatherError};

const HOURLY_FIELDS: &str = "temperature_2m,precipitation_probability,precipitation,windspeed_10m";
const USER_AGENT: &str = "forecasters-edge/0.1.0";

/// Sample Open-Meteo response served in mock mode and as the fallback forecast.
const BUNDLED_FORECAST: &str = include_str!("../data/sample_forecast.json");

/// Supplies an hourly forecast for a coordinate.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// # Errors
    /// `ForecastUnavailable` on a non-2xx upstream status; network and parse
    /// failures are reported as their own variants.
    async fn fetch(&self, at: Coordinate) -> Result<HourlySeries, WeatherError>;
}

#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub hourly: OpenMeteoHourly,
}

/// Hourly arrays; Open-Meteo sends `null` for hours a model does not cover.
#[derive(Debug, Deserialize)]
pub struct OpenMeteoHourly {
    pub time: Vec<String>,
    pub temperature_2m: Vec<Option<f64>>,
    pub precipitation_probability: Vec<Option<f64>>,
    pub precipitation: Vec<Option<f64>>,
    pub windspeed_10m: Vec<Option<f64>>,
}

impl TryFrom<OpenMeteoHourly> for HourlySeries {
    type Error = WeatherError;

    fn try_from(hourly: OpenMeteoHourly) -> Result<Self, Self::Error> {
        let time = hourly
            .time
            .iter()
            .map(|raw| parse_local_timestamp(raw))
            .collect::<Result<Vec<_>, _>>()?;

        HourlySeries::with_gaps(
            time,
            hourly.temperature_2m,
            hourly.precipitation_probability,
            hourly.precipitation,
            hourly.windspeed_10m,
        )
    }
}

/// Parse a full Open-Meteo JSON body into a series.
pub fn parse_open_meteo(body: &str) -> Result<HourlySeries, WeatherError> {
    let response: OpenMeteoResponse = serde_json::from_str(body)
        .map_err(|e| WeatherError::MalformedSeries(format!("invalid forecast JSON: {}", e)))?;
    response.hourly.try_into()
}

/// HTTP client for the Open-Meteo hourly forecast API.
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: Arc<Client>,
    base_url: Url,
}

impl OpenMeteoSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: Url::parse(base_url)?,
        })
    }

    /// Request URL for a one-day Fahrenheit forecast in the point's local time zone.
    pub fn forecast_url(&self, at: Coordinate) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &at.lat().to_string())
            .append_pair("longitude", &at.lon().to_string())
            .append_pair("hourly", HOURLY_FIELDS)
            .append_pair("temperature_unit", "fahrenheit")
            .append_pair("forecast_days", "1")
            .append_pair("timezone", "auto");
        url
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoSource {
    async fn fetch(&self, at: Coordinate) -> Result<HourlySeries, WeatherError> {
        let url = self.forecast_url(at);
        tracing::debug!("Fetching forecast for {}: {}", at, url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::ForecastUnavailable(format!(
                "Weather API error: {} for {}",
                status, at
            )));
        }

        let body: OpenMeteoResponse = response.json().await?;
        tracing::debug!(
            "Got {} forecast hours for {} (timezone {})",
            body.hourly.time.len(),
            at,
            body.timezone.as_deref().unwrap_or("unknown")
        );

        body.hourly.try_into()
    }
}

/// Serves the same series for every coordinate.
#[derive(Debug, Clone)]
pub struct StaticForecastSource {
    series: HourlySeries,
}

impl StaticForecastSource {
    pub fn new(series: HourlySeries) -> Self {
        Self { series }
    }

    /// The sample forecast shipped with the crate.
    pub fn bundled() -> Result<Self, WeatherError> {
        Ok(Self::new(parse_open_meteo(BUNDLED_FORECAST)?))
    }

    pub fn series(&self) -> &HourlySeries {
        &self.series
    }
}

#[async_trait]
impl ForecastSource for StaticForecastSource {
    async fn fetch(&self, at: Coordinate) -> Result<HourlySeries, WeatherError> {
        tracing::debug!("Using static forecast for {}", at);
        Ok(self.series.clone())
    }
}
