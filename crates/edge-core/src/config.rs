use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ConfigError};

/// Environment variable prefix for overrides, e.g. `EDGE__RANKING__LIMIT=20`.
const ENV_PREFIX: &str = "EDGE";
const ENV_SEPARATOR: &str = "__";

/// One rejected or questionable setting.
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of `Config::validate`: errors block startup, warnings are logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors on one line, `field: message` separated by `; `.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Forecast feed settings
    pub forecast: ForecastConfig,

    /// Proximity cache settings
    pub cache: CacheConfig,

    /// Ranking pass settings
    pub ranking: RankingConfig,

    /// On-site condition report settings
    pub conditions: ConditionsConfig,

    /// Input data locations
    pub data: DataConfig,

    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Hourly forecast endpoint (Open-Meteo compatible)
    pub api_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Serve the bundled sample forecast instead of calling the API
    pub mock: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timeout_secs: 10,
            mock: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Query points closer than this share one forecast
    pub same_weather_threshold_miles: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            same_weather_threshold_miles: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Number of nearest venues scored per pass
    pub limit: usize,

    /// Venues with fewer holes are skipped before the distance filter
    pub min_holes: u32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            min_holes: 18,
        }
    }
}

/// Condition report aggregation and backend settings.
///
/// A report `d` days old is weighted `max(1 - d * daily_penalty_rate, min_weight)`,
/// and dropped entirely once older than `max_age_days`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionsConfig {
    /// Base URL of the course data backend; reports are skipped when unset
    pub backend_url: Option<String>,
    pub max_reports: usize,
    pub daily_penalty_rate: f64,
    pub min_weight: f64,
    pub max_age_days: u32,
}

impl Default for ConditionsConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            max_reports: 3,
            daily_penalty_rate: 0.25,
            min_weight: 0.01,
            max_age_days: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Course list in `id,name,numHoles,lat,lon` lines
    pub courses_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            courses_path: PathBuf::from("data/usa_courses.csv"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, layered under `EDGE__*` env vars
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from `path` (optional) plus environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from {}", path.display());

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors. Warnings are
    /// returned for the caller to report once logging is up.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.forecast.api_url, "forecast.api_url", &mut result);

        if let Some(backend) = &self.conditions.backend_url {
            self.validate_url(backend, "conditions.backend_url", &mut result);
        }

        if self.forecast.timeout_secs == 0 {
            result.add_error("forecast.timeout_secs", "Timeout must be greater than 0");
        }

        if self.forecast.mock {
            result.add_warning("forecast.mock", "Mock forecasts enabled; scores use sample data");
        }

        let threshold = self.cache.same_weather_threshold_miles;
        if !threshold.is_finite() || threshold < 0.0 {
            result.add_error(
                "cache.same_weather_threshold_miles",
                "Threshold must be a non-negative number of miles",
            );
        } else if threshold == 0.0 {
            result.add_warning(
                "cache.same_weather_threshold_miles",
                "Proximity sharing disabled (0 miles); every venue fetches its own forecast",
            );
        }

        if self.ranking.limit == 0 {
            result.add_error("ranking.limit", "Limit must be greater than 0");
        } else if self.ranking.limit > 100 {
            result.add_warning(
                "ranking.limit",
                "Limit is unusually large (>100); expect many forecast requests",
            );
        }

        let rate = self.conditions.daily_penalty_rate;
        if !(0.0..=1.0).contains(&rate) {
            result.add_error(
                "conditions.daily_penalty_rate",
                "Daily penalty rate must be between 0 and 1",
            );
        }

        let min_weight = self.conditions.min_weight;
        if !(0.0..=1.0).contains(&min_weight) {
            result.add_error("conditions.min_weight", "Minimum weight must be between 0 and 1");
        }

        if self.conditions.max_reports == 0 {
            result.add_warning("conditions.max_reports", "Condition reports disabled (0 reports)");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Write a new config file. An existing file is only replaced when
    /// `overwrite` is set.
    pub fn init_file(&self, path: &Path, overwrite: bool) -> std::result::Result<(), AppError> {
        if path.exists() && !overwrite {
            return Err(ConfigError::AlreadyExists(path.display().to_string()).into());
        }
        self.save_to(path)?;
        Ok(())
    }

    /// `<config dir>/forecasters-edge/config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("forecasters-edge");

        Ok(config_dir.join("config.toml"))
    }
}
