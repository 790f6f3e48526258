//! Maps a round start hour onto a slice of an hourly forecast.

use chrono::NaiveTime;

use crate::geo::KM_TO_MILES;
use crate::types::{HourlySeries, WeatherError, WindowedAverages};

/// Hours a round is assumed to last.
pub const ROUND_HOURS: usize = 3;

/// Latest index a round window may start at.
const MAX_WINDOW_START: i64 = 23;

/// How a forecast value lines up with its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Alignment {
    /// Value holds at the timestamp itself (temperature).
    Instant,
    /// Value accumulates over the hour ending at the timestamp
    /// (precipitation, precipitation probability, wind).
    PrecedingHour,
}

/// Average each quantity over the round starting at `start_hour` local time.
///
/// Missing hours are skipped; only the values present in the slice are
/// averaged.
///
/// # Errors
/// `InvalidStartHour` when `start_hour > 23`, `InsufficientForecastData` when
/// the series ends before the round starts, `MissingHourlyValues` when a
/// quantity has no value anywhere in its slice.
pub fn select_window(series: &HourlySeries, start_hour: u32) -> Result<WindowedAverages, WeatherError> {
    let start_time = NaiveTime::from_hms_opt(start_hour, 0, 0)
        .ok_or(WeatherError::InvalidStartHour(start_hour))?;

    let offset_hours = offset_hours(series, start_time);
    let available = series.len();
    if usize::try_from(offset_hours).is_ok_and(|offset| offset >= available) {
        return Err(WeatherError::InsufficientForecastData {
            needed: offset_hours + 1,
            available,
        });
    }

    tracing::trace!(
        "Round at {:02}:00 starts {} hours after forecast origin {}",
        start_hour,
        offset_hours,
        series.origin()
    );

    let average = |quantity: &'static str, values: &[Option<f64>], alignment: Alignment| {
        average_over_round(values, offset_hours, alignment)
            .ok_or(WeatherError::MissingHourlyValues { quantity, start_hour })
    };

    let averages = WindowedAverages {
        precip_mm: average("precipitation", series.precip_mm(), Alignment::PrecedingHour)?,
        precip_probability_pct: average(
            "precipitation probability",
            series.precip_probability_pct(),
            Alignment::PrecedingHour,
        )?,
        temperature_f: average("temperature", series.temperature_f(), Alignment::Instant)?,
        wind_speed_mph: average("wind speed", series.wind_speed_kmh(), Alignment::PrecedingHour)?
            * KM_TO_MILES,
    };

    Ok(averages)
}

/// Whole hours from the origin to `start_time` on the origin's calendar day,
/// rounded toward negative infinity.
fn offset_hours(series: &HourlySeries, start_time: NaiveTime) -> i64 {
    let origin = series.origin();
    let target = origin.date().and_time(start_time);
    (target - origin).num_seconds().div_euclid(3600)
}

fn average_over_round(values: &[Option<f64>], offset_hours: i64, alignment: Alignment) -> Option<f64> {
    let shift = match alignment {
        Alignment::Instant => 0,
        Alignment::PrecedingHour => 1,
    };

    // Rounds before the origin read from the first hour available.
    let start = (offset_hours + shift).clamp(0, MAX_WINDOW_START);
    let last = values.len().saturating_sub(1);
    let start = usize::try_from(start).map_or(last, |s| s.min(last));
    let end = (start + ROUND_HOURS).min(values.len());

    let (sum, count) = values[start..end]
        .iter()
        .flatten()
        .fold((0.0_f64, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
