//! Record types produced by the preparation stages.

use chrono::NaiveDate;

/// One monthly ridership reading for a station on a subway line.
#[derive(Debug, Clone, PartialEq)]
pub struct RidershipRecord {
    pub station: String,
    pub subway_line: String,
    pub year: i32,
    pub year_month: NaiveDate,
    /// Monthly passenger count; `None` where the source cell was empty or
    /// failed numeric coercion.
    pub passengers: Option<f64>,
}

/// Yearly population figure.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub year: i32,
    pub population: Option<f64>,
}

/// The three GDP estimate series for one year, plus the unified value
/// derived by priority (revised > retropolated > closed).
#[derive(Debug, Clone, PartialEq)]
pub struct GdpRecord {
    pub year: i32,
    pub revised: Option<f64>,
    pub retropolated: Option<f64>,
    pub closed: Option<f64>,
    pub unified: Option<f64>,
}

/// Parses a cell as `f64`, treating empty and malformed text as missing.
pub fn parse_float(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse().ok()
}
