//! Yearly population: numeric scrubbing, interpolation, and range restriction.

use std::fs::File;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::prepare::types::PopulationRecord;
use crate::report::{ColumnProfile, profile_column};

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Ano")]
    year: i32,
    #[serde(rename = "População", default)]
    population: String,
}

/// Reads the population CSV. The population field arrives as text with
/// separator junk; it is scrubbed and coerced, with failures becoming missing.
pub fn load_population(path: &str) -> Result<Vec<PopulationRecord>> {
    let file = File::open(path).with_context(|| format!("opening population CSV {path}"))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let raw: RawRow = result.with_context(|| format!("reading population row in {path}"))?;
        rows.push(PopulationRecord {
            year: raw.year,
            population: scrub_numeric(&raw.population),
        });
    }

    info!(path, rows = rows.len(), "population CSV loaded");
    Ok(rows)
}

/// Strips everything except digits and dots before parsing, so values like
/// "6,775,561 " coerce cleanly. Returns `None` when nothing parseable remains.
pub fn scrub_numeric(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Fills missing years by linear interpolation against the two nearest years
/// with known values, sorted by year. A missing run at the tail takes the
/// last known value; a leading run stays missing.
pub fn interpolate_missing(mut rows: Vec<PopulationRecord>) -> Vec<PopulationRecord> {
    rows.sort_by_key(|r| r.year);

    let filled: Vec<PopulationRecord> = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row.population.is_some() {
                return row.clone();
            }

            let prev = rows[..i]
                .iter()
                .rev()
                .find(|r| r.population.is_some());
            let next = rows[i + 1..].iter().find(|r| r.population.is_some());

            let population = match (prev, next) {
                (Some(p), Some(n)) => {
                    let (y1, v1) = (p.year as f64, p.population.unwrap());
                    let (y2, v2) = (n.year as f64, n.population.unwrap());
                    let value = v1 + (v2 - v1) * (row.year as f64 - y1) / (y2 - y1);
                    debug!(year = row.year, value, "interpolated population");
                    Some(value)
                }
                (Some(p), None) => p.population,
                _ => None,
            };

            PopulationRecord {
                year: row.year,
                population,
            }
        })
        .collect();

    filled
}

/// Restricts the series to the inclusive year range `[lo, hi]`.
pub fn restrict_years(rows: Vec<PopulationRecord>, lo: i32, hi: i32) -> Vec<PopulationRecord> {
    rows.into_iter()
        .filter(|r| (lo..=hi).contains(&r.year))
        .collect()
}

/// Column profiles for the profiling dump.
pub fn profile(rows: &[PopulationRecord]) -> Vec<ColumnProfile> {
    let years: Vec<Option<f64>> = rows.iter().map(|r| Some(r.year as f64)).collect();
    let population: Vec<Option<f64>> = rows.iter().map(|r| r.population).collect();
    vec![
        profile_column("year", &years),
        profile_column("population", &population),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32, population: Option<f64>) -> PopulationRecord {
        PopulationRecord { year, population }
    }

    #[test]
    fn test_scrub_numeric() {
        assert_eq!(scrub_numeric("6,775,561 "), Some(6_775_561.0));
        assert_eq!(scrub_numeric(" 6 775 561"), Some(6_775_561.0));
        assert_eq!(scrub_numeric(""), None);
        assert_eq!(scrub_numeric("sem dados"), None);
    }

    #[test]
    fn test_interpolate_interior_chain() {
        // Gaps at 2021 and 2022 both interpolate against 2020 and 2023.
        let rows = vec![
            record(2020, Some(100.0)),
            record(2021, None),
            record(2023, Some(120.0)),
            record(2022, None),
        ];
        let filled = interpolate_missing(rows);

        let by_year = |y: i32| {
            filled
                .iter()
                .find(|r| r.year == y)
                .unwrap()
                .population
                .unwrap()
        };
        assert!((by_year(2021) - 106.666_666_666_666_67).abs() < 1e-9);
        assert!((by_year(2022) - 113.333_333_333_333_33).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_trailing_takes_last_known() {
        let rows = vec![
            record(2020, Some(100.0)),
            record(2021, Some(110.0)),
            record(2022, None),
        ];
        let filled = interpolate_missing(rows);
        assert_eq!(filled[2].population, Some(110.0));
    }

    #[test]
    fn test_interpolate_leading_stays_missing() {
        let rows = vec![record(2020, None), record(2021, Some(110.0))];
        let filled = interpolate_missing(rows);
        assert_eq!(filled[0].population, None);
    }

    #[test]
    fn test_restrict_years_inclusive() {
        let rows = vec![
            record(1997, Some(1.0)),
            record(1998, Some(2.0)),
            record(2022, Some(3.0)),
            record(2023, Some(4.0)),
        ];
        let kept = restrict_years(rows, 1998, 2022);
        let years: Vec<i32> = kept.iter().map(|r| r.year).collect();
        assert_eq!(years, vec![1998, 2022]);
    }
}
