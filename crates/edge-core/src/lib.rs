pub mod config;
pub mod error;

pub use config::{
    CacheConfig, ConditionsConfig, Config, DataConfig, ForecastConfig, LoggingConfig,
    RankingConfig, ValidationResult,
};
pub use error::{AppError, ConfigError, DataError, ForecastError, NetworkError};

use anyhow::Result;

/// Initialize tracing with `default_filter` unless `RUST_LOG` is set.
pub fn init(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Forecaster's Edge core initialized");
    Ok(())
}
