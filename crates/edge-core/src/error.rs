//! Error hierarchy shared by the engine and the binary.
//!
//! Engine crates keep their own fine-grained errors and convert into
//! `AppError` at the boundary. `user_message()` gives the short text shown
//! in the terminal; `Display` keeps the detail for logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Forecast(e) => e.user_message(),
            AppError::Data(e) => e.user_message(),
            AppError::Io(_) => "Could not read an input file. Check the course list path.",
            AppError::Other(_) => "Something went wrong while ranking courses.",
        }
    }
}

/// Failures talking to the forecast or course-data backends.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Could not reach backend: {0}")]
    Unreachable(String),

    #[error("Backend did not answer in time")]
    Timeout,

    #[error("Backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unreadable backend response: {0}")]
    Decode(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::Unreachable(_) => "No connection to the weather service.",
            NetworkError::Timeout => "The weather service is slow to respond. Try again shortly.",
            NetworkError::Status { status, .. } if *status >= 500 => {
                "The weather service is having trouble. Try again later."
            }
            NetworkError::Status { .. } => "The weather service rejected the request.",
            NetworkError::Decode(_) => "The weather service sent a response we could not read.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Config file already exists: {0}")]
    AlreadyExists(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "The configuration is invalid. Check config.toml and EDGE__ variables.",
            ConfigError::AlreadyExists(_) => "A config file is already there. Pass --force to overwrite it.",
        }
    }
}

/// Errors raised while turning a forecast into a score.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Invalid start hour: {0}")]
    InvalidStartHour(u32),

    #[error("Insufficient weather data. Needed {needed} hours, got {available}.")]
    InsufficientData { needed: i64, available: usize },

    #[error("Forecast unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed forecast: {0}")]
    Malformed(String),

    #[error("{0}")]
    MissingValues(String),
}

impl ForecastError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ForecastError::InvalidStartHour(_) => "Start hour must be between 0 and 23.",
            ForecastError::InsufficientData { .. } => {
                "The forecast does not reach the requested start time."
            }
            ForecastError::Unavailable(_) => "No forecast is available right now.",
            ForecastError::Malformed(_) => "Received an unreadable forecast.",
            ForecastError::MissingValues(_) => "The forecast has gaps over the requested round.",
        }
    }
}

/// Input data errors (course list, coordinates, reports).
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Condition rating must be between 1 and 5, got {0}")]
    InvalidConditionRating(i64),

    #[error("Malformed course line {line}: {message}")]
    MalformedCourse { line: usize, message: String },

    #[error("Course data unavailable: {0}")]
    CourseDataUnavailable(String),
}

impl DataError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DataError::InvalidCoordinate(_) => {
                "Invalid location. Use latitude,longitude in degrees."
            }
            DataError::InvalidConditionRating(_) => "A condition report had an invalid rating.",
            DataError::MalformedCourse { .. } => "The course list contains a malformed line.",
            DataError::CourseDataUnavailable(_) => "Course ratings and conditions are unavailable.",
        }
    }
}

/// Classify a `reqwest` failure.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            return NetworkError::Timeout;
        }
        if self.is_decode() {
            return NetworkError::Decode(self.to_string());
        }
        match self.status() {
            Some(status) => NetworkError::Status {
                status: status.as_u16(),
                message: self.to_string(),
            },
            None => NetworkError::Unreachable(self.to_string()),
        }
    }
}
