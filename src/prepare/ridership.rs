//! Subway ridership: loading, repair, and yearly aggregation.
//!
//! The raw file carries two defects the pipeline repairs up front: duplicated
//! interior spaces in line names ("Linha  1" and "Linha 1" are the same
//! line), and placeholder rows inserted before a station started operating,
//! recognizable as a leading run of missing passenger counts.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info};

use crate::prepare::types::{RidershipRecord, parse_float};
use crate::report::{ColumnProfile, profile_column};

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Station")]
    station: String,
    subway_line: String,
    year: i32,
    year_month: NaiveDate,
    #[serde(default)]
    passengers: String,
}

/// Reads the ridership CSV. Malformed passenger cells become missing values.
pub fn load_ridership(path: &str) -> Result<Vec<RidershipRecord>> {
    let file = File::open(path).with_context(|| format!("opening ridership CSV {path}"))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let raw: RawRow = result.with_context(|| format!("reading ridership row in {path}"))?;
        rows.push(RidershipRecord {
            station: raw.station,
            subway_line: raw.subway_line,
            year: raw.year,
            year_month: raw.year_month,
            passengers: parse_float(&raw.passengers),
        });
    }

    info!(path, rows = rows.len(), "ridership CSV loaded");
    Ok(rows)
}

/// Collapses every run of consecutive spaces to a single space and trims the
/// ends. Idempotent: a second application is a no-op.
pub fn collapse_spaces(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes line names so spacing variants denote the same line.
pub fn normalize_line_names(rows: Vec<RidershipRecord>) -> Vec<RidershipRecord> {
    rows.into_iter()
        .map(|mut row| {
            row.subway_line = collapse_spaces(&row.subway_line);
            row
        })
        .collect()
}

/// Drops every row whose year matches `year`. Used for 2023, where all data
/// from a known date forward is unusable.
pub fn drop_year(rows: Vec<RidershipRecord>, year: i32) -> Vec<RidershipRecord> {
    let before = rows.len();
    let kept: Vec<_> = rows.into_iter().filter(|r| r.year != year).collect();
    debug!(year, dropped = before - kept.len(), "dropped unusable year");
    kept
}

/// Sorts by (station, year-month) and removes each station's leading run of
/// rows with missing passenger counts. Stations with no readings at all are
/// dropped entirely.
pub fn trim_leading_missing(mut rows: Vec<RidershipRecord>) -> Vec<RidershipRecord> {
    rows.sort_by(|a, b| {
        a.station
            .cmp(&b.station)
            .then(a.year_month.cmp(&b.year_month))
    });

    let mut cleaned = Vec::with_capacity(rows.len());
    let mut current_station: Option<&str> = None;
    let mut seen_value = false;

    for row in &rows {
        if current_station != Some(row.station.as_str()) {
            current_station = Some(row.station.as_str());
            seen_value = false;
        }
        if row.passengers.is_some() {
            seen_value = true;
        }
        if seen_value {
            cleaned.push(row.clone());
        }
    }

    cleaned
}

/// Distinct line names, sorted.
pub fn unique_lines(rows: &[RidershipRecord]) -> Vec<String> {
    let set: BTreeSet<&str> = rows.iter().map(|r| r.subway_line.as_str()).collect();
    set.into_iter().map(str::to_string).collect()
}

/// Months with at least one missing passenger count:
/// `(month, missing rows, distinct stations that month)`.
pub fn missing_by_month(rows: &[RidershipRecord]) -> Vec<(NaiveDate, usize, usize)> {
    let mut by_month: BTreeMap<NaiveDate, (usize, BTreeSet<&str>)> = BTreeMap::new();
    for row in rows {
        let entry = by_month.entry(row.year_month).or_default();
        if row.passengers.is_none() {
            entry.0 += 1;
        }
        entry.1.insert(row.station.as_str());
    }

    by_month
        .into_iter()
        .filter(|(_, (missing, _))| *missing > 0)
        .map(|(month, (missing, stations))| (month, missing, stations.len()))
        .collect()
}

/// Missing-passenger share per station, listed for stations with at least one
/// gap, worst first: `(station, missing, total, percentage)`.
pub fn missing_by_station(rows: &[RidershipRecord]) -> Vec<(String, usize, usize, f64)> {
    let mut by_station: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = by_station.entry(row.station.as_str()).or_default();
        if row.passengers.is_none() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }

    let mut out: Vec<_> = by_station
        .into_iter()
        .filter(|(_, (missing, _))| *missing > 0)
        .map(|(station, (missing, total))| {
            (
                station.to_string(),
                missing,
                total,
                missing as f64 / total as f64 * 100.0,
            )
        })
        .collect();
    out.sort_by(|a, b| b.3.total_cmp(&a.3));
    out
}

/// Total passengers per year summed across all stations and lines. Missing
/// counts contribute zero.
pub fn passengers_by_year(rows: &[RidershipRecord]) -> BTreeMap<i32, f64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        *totals.entry(row.year).or_insert(0.0) += row.passengers.unwrap_or(0.0);
    }
    totals
}

/// Column profiles for the profiling dump.
pub fn profile(rows: &[RidershipRecord]) -> Vec<ColumnProfile> {
    let passengers: Vec<Option<f64>> = rows.iter().map(|r| r.passengers).collect();
    let years: Vec<Option<f64>> = rows.iter().map(|r| Some(r.year as f64)).collect();
    vec![
        profile_column("year", &years),
        profile_column("passengers", &passengers),
    ]
}
