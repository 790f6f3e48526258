//! Weather suitability engine for Forecaster's Edge
//!
//! Turns an hourly forecast and a round start time into a 0-10 score with a
//! per-factor breakdown, and shares forecasts between nearby venues so a
//! ranking pass fetches each area once.

pub mod cache;
pub mod conditions;
pub mod courses;
pub mod geo;
pub mod provider;
pub mod ranking;
pub mod scoring;
pub mod types;
pub mod window;

pub use cache::ProximityCache;
pub use conditions::{
    aggregate_reports, format_condition_age, ConditionSource, ConditionWeighting, CourseData,
    HttpConditionSource, InMemoryConditions, NoConditions,
};
pub use courses::{parse_course_line, parse_courses, Course, CourseParseError};
pub use geo::{distance_km, distance_miles, Coordinate, CoordinateError};
pub use provider::{ForecastSource, OpenMeteoSource, StaticForecastSource};
pub use ranking::{default_start_hour, RankedVenue, Ranker, Ranking, RankingBoard};
pub use scoring::{score, ScoreGrade};
pub use types::*;
pub use window::select_window;
