//! Leveled console reporting.
//!
//! The original analysis narrates itself as it runs: section banners between
//! stages, value dumps for intermediate tables, and a full data-profiling
//! dump for each freshly loaded dataset. All of it is gated by a single
//! verbosity setting carried in [`Reporter`], which stages receive by
//! reference instead of reading a process-wide global.

use std::fmt::Display;

use crate::prepare::types::RidershipRecord;
use crate::stats;

/// Output verbosity, ordered from quietest to loudest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// No console output.
    Silent,
    /// Section banners only.
    Section,
    /// Sections plus value dumps.
    Detail,
    /// Everything, including data-profiling dumps.
    Full,
}

impl Verbosity {
    /// Maps the numeric CLI level (0-3) onto a variant. Values above 3 are
    /// treated as `Full`.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Verbosity::Silent,
            1 => Verbosity::Section,
            2 => Verbosity::Detail,
            _ => Verbosity::Full,
        }
    }
}

/// Summary of one numeric column, printed by the profiling dump.
#[derive(Debug)]
pub struct ColumnProfile {
    pub name: String,
    pub rows: usize,
    pub missing: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

/// Builds a [`ColumnProfile`] from a column of optional values.
pub fn profile_column(name: &str, values: &[Option<f64>]) -> ColumnProfile {
    let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    let (min, max) = match stats::min_max(&present) {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    };
    let mean = if present.is_empty() {
        None
    } else {
        Some(stats::mean(&present))
    };

    ColumnProfile {
        name: name.to_string(),
        rows: values.len(),
        missing: values.len() - present.len(),
        min,
        max,
        mean,
    }
}

/// Console reporter gated by a fixed [`Verbosity`].
pub struct Reporter {
    verbosity: Verbosity,
}

impl Reporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Prints a section title framed by underline rules matching its length.
    /// Active at `Section` and above.
    pub fn section(&self, title: &str) {
        if self.verbosity >= Verbosity::Section {
            let rule = "-".repeat(title.chars().count());
            println!("\n{rule}");
            println!("{title}");
            println!("{rule}");
        }
    }

    /// Dumps a value. Active at `Detail` and above.
    pub fn detail(&self, value: impl Display) {
        if self.verbosity >= Verbosity::Detail {
            println!();
            println!("{value}");
        }
    }

    /// Lists every record of one station: year-month and passenger count.
    pub fn list_station(&self, rows: &[RidershipRecord], station: &str) {
        self.section(&format!("Station data: {station}"));
        if self.verbosity < Verbosity::Detail {
            return;
        }

        println!();
        for row in rows.iter().filter(|r| r.station == station) {
            match row.passengers {
                Some(p) => println!("{}  {:>12.1}", row.year_month, p),
                None => println!("{}  {:>12}", row.year_month, "NaN"),
            }
        }
    }

    /// Full data-profiling dump for a freshly loaded dataset: row counts,
    /// per-column missing counts, and basic descriptive statistics. Active
    /// only at `Full`.
    pub fn data_profile(&self, dataset: &str, columns: &[ColumnProfile]) {
        if self.verbosity < Verbosity::Full {
            return;
        }

        self.section(&format!("Data profiling: {dataset}"));
        for col in columns {
            println!();
            println!(
                "{}: {} rows, {} missing",
                col.name, col.rows, col.missing
            );
            if let (Some(min), Some(max), Some(mean)) = (col.min, col.max, col.mean) {
                println!("  min {min:.2}  max {max:.2}  mean {mean:.2}");
            }
        }
    }
}
