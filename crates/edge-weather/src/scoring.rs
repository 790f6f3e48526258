//! Composite desirability score.
//!
//! Each factor yields a non-negative penalty; the weighted penalties are
//! subtracted from 10 and the result floored at 0. The function is pure, so
//! identical inputs always produce bit-identical scores.

use serde::Serialize;

use crate::types::{
    ConditionReport, FactorScore, PrecipitationRaw, ScoreBreakdown, TemperatureRaw,
    WeatherScore, WindRaw, WindowedAverages,
};

pub const MAX_SCORE: f64 = 10.0;

/// Comfortable temperature band in °F.
const MIN_BEST_TEMPERATURE_F: f64 = 45.0;
const MAX_BEST_TEMPERATURE_F: f64 = 82.0;

/// Wind at or below this speed carries no penalty.
const MAX_BEST_WIND_MPH: f64 = 25.0;

/// Calibration weights applied to each penalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub precip_amount: f64,
    pub precip_probability: f64,
    pub temperature: f64,
    pub wind: f64,
    pub condition: f64,
}

pub const WEIGHTS: ScoreWeights = ScoreWeights {
    precip_amount: 0.734011,
    precip_probability: 0.227356,
    temperature: 0.974824,
    wind: 0.946542,
    condition: 1.0,
};

/// 0 mm → 0, saturating at 10 once `mm ≥ 2.78`.
pub fn precipitation_penalty(mm: f64) -> f64 {
    10.0 - (7.5 - 2.7 * mm).max(0.0) * (10.0 / 7.5)
}

/// Linear: 0% → 0, 100% → 10.
pub fn precipitation_probability_penalty(pct: f64) -> f64 {
    10.0 - (1.0 - pct / 100.0) * 10.0
}

pub fn temperature_penalty(fahrenheit: f64) -> f64 {
    ((MIN_BEST_TEMPERATURE_F - fahrenheit).max(0.0) + (fahrenheit - MAX_BEST_TEMPERATURE_F).max(0.0))
        / 3.0
}

pub fn wind_penalty(mph: f64) -> f64 {
    (mph - MAX_BEST_WIND_MPH).max(0.0) / 2.0
}

/// A single low on-site rating dominates the weather factors.
pub fn condition_penalty(condition: Option<&ConditionReport>) -> f64 {
    let Some(report) = condition else {
        return 0.0;
    };

    let rating = f64::from(report.rating);
    match report.rating {
        4.. => 0.0,
        3 => rating / 2.0,
        2 => rating * 1.5,
        _ => 8.0 + rating,
    }
}

/// Reduce a round's averaged weather (and optional on-site report) to a score.
pub fn score(window: &WindowedAverages, condition: Option<&ConditionReport>) -> WeatherScore {
    let precip = precipitation_penalty(window.precip_mm);
    let precip_probability = precipitation_probability_penalty(window.precip_probability_pct);
    let temperature = temperature_penalty(window.temperature_f);
    let wind = wind_penalty(window.wind_speed_mph);
    let condition = condition_penalty(condition);

    let overall = (MAX_SCORE
        - precip * WEIGHTS.precip_amount
        - precip_probability * WEIGHTS.precip_probability
        - temperature * WEIGHTS.temperature
        - wind * WEIGHTS.wind
        - condition * WEIGHTS.condition)
        .max(0.0);

    let breakdown = ScoreBreakdown {
        precipitation: FactorScore {
            raw: PrecipitationRaw {
                mm: window.precip_mm,
                probability: window.precip_probability_pct,
            },
            penalty: precip * WEIGHTS.precip_amount
                + precip_probability * WEIGHTS.precip_probability,
            score: MAX_SCORE - precip - precip_probability,
        },
        temperature: FactorScore {
            raw: TemperatureRaw {
                fahrenheit: window.temperature_f,
            },
            penalty: temperature * WEIGHTS.temperature,
            score: MAX_SCORE - temperature,
        },
        wind: FactorScore {
            raw: WindRaw {
                mph: window.wind_speed_mph,
            },
            penalty: wind * WEIGHTS.wind,
            score: MAX_SCORE - wind,
        },
        overall,
    };

    WeatherScore { overall, breakdown }
}

/// Display bucket for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
}

impl ScoreGrade {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Self::Excellent
        } else if score >= 6.5 {
            Self::Good
        } else if score >= 5.0 {
            Self::Fair
        } else if score >= 3.5 {
            Self::Poor
        } else {
            Self::Bad
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Bad => "Bad",
        }
    }
}
