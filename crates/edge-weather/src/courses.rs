//! Course list parsing.
//!
//! One course per line: `id,name,numHoles,lat,lon`. There is no quoting, so a
//! name containing a comma shifts the remaining fields and the line is
//! rejected.

use edge_core::DataError;
use serde::Serialize;
use thiserror::Error;

use crate::geo::{Coordinate, CoordinateError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: u32,
    pub name: String,
    pub holes: u32,
    pub location: Coordinate,
}

#[derive(Debug, Error, PartialEq)]
pub enum CourseParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
}

impl CourseParseError {
    /// Attach the 1-based line number the error came from.
    pub fn at_line(self, line: usize) -> DataError {
        DataError::MalformedCourse {
            line,
            message: self.to_string(),
        }
    }
}

fn number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, CourseParseError> {
    let trimmed = raw.trim();
    trimmed.parse().map_err(|_| CourseParseError::InvalidNumber {
        field,
        value: trimmed.to_string(),
    })
}

/// Parse one `id,name,numHoles,lat,lon` line.
///
/// Numeric fields are trimmed; the name is kept as written.
pub fn parse_course_line(line: &str) -> Result<Course, CourseParseError> {
    let fields: Vec<&str> = line.split(',').collect();
    let [id, name, holes, lat, lon] = fields[..] else {
        return Err(CourseParseError::FieldCount(fields.len()));
    };

    Ok(Course {
        id: number("id", id)?,
        name: name.to_string(),
        holes: number("numHoles", holes)?,
        location: Coordinate::new(number("lat", lat)?, number("lon", lon)?)?,
    })
}

/// Parse a whole course file.
///
/// The first line is a header. Blank lines are ignored; malformed lines are
/// logged and skipped.
pub fn parse_courses(text: &str) -> Vec<Course> {
    let mut courses = Vec::new();

    for (index, line) in text.lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        match parse_course_line(line) {
            Ok(course) => courses.push(course),
            Err(e) => tracing::warn!("Skipping course: {}", e.at_line(index + 1)),
        }
    }

    tracing::debug!("Parsed {} courses", courses.len());
    courses
}
