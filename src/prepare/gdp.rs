//! GDP indicator table: level-row selection and series unification.
//!
//! The source file is semicolon-delimited with one row per indicator. The
//! first column is the indicator level code, the second its description; the
//! remaining headers are years except for a trailing non-year column that is
//! excluded. Three levels matter here: "1.1" (revised figures), "1.2"
//! (retropolated), and "1.3" (closed).

use std::fs::File;

use anyhow::{Context, Result, bail, ensure};
use csv::StringRecord;
use tracing::info;

use crate::prepare::types::{GdpRecord, parse_float};
use crate::table::YearTable;

const LEVEL_REVISED: &str = "1.1";
const LEVEL_RETROPOLATED: &str = "1.2";
const LEVEL_CLOSED: &str = "1.3";

/// Columns before the first year column (level code, description).
const LEADING_COLUMNS: usize = 2;

/// Reads the GDP CSV and builds one record per year, including the unified
/// series. A missing indicator row is a fatal input-shape error; malformed
/// value cells become missing.
pub fn load_gdp(path: &str) -> Result<Vec<GdpRecord>> {
    let file = File::open(path).with_context(|| format!("opening GDP CSV {path}"))?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(file);

    let headers = rdr
        .headers()
        .with_context(|| format!("reading GDP header in {path}"))?
        .clone();
    ensure!(
        headers.len() > LEADING_COLUMNS + 1,
        "GDP CSV {path} has no year columns"
    );

    // Year columns sit between the level/description pair and one trailing
    // non-year column.
    let year_range = LEADING_COLUMNS..headers.len() - 1;
    let years: Vec<i32> = year_range
        .clone()
        .map(|i| {
            headers[i]
                .trim()
                .parse()
                .with_context(|| format!("GDP header '{}' is not a year", &headers[i]))
        })
        .collect::<Result<_>>()?;

    let mut revised: Option<StringRecord> = None;
    let mut retropolated: Option<StringRecord> = None;
    let mut closed: Option<StringRecord> = None;

    for result in rdr.records() {
        let record = result.with_context(|| format!("reading GDP row in {path}"))?;
        match record.get(0).map(str::trim) {
            Some(LEVEL_REVISED) => revised = Some(record),
            Some(LEVEL_RETROPOLATED) => retropolated = Some(record),
            Some(LEVEL_CLOSED) => closed = Some(record),
            _ => {}
        }
    }

    let series = |row: Option<StringRecord>, level: &str| -> Result<Vec<Option<f64>>> {
        let Some(row) = row else {
            bail!("GDP indicator row '{level}' not found in {path}");
        };
        Ok(year_range
            .clone()
            .map(|i| row.get(i).and_then(parse_float))
            .collect())
    };

    let revised = series(revised, LEVEL_REVISED)?;
    let retropolated = series(retropolated, LEVEL_RETROPOLATED)?;
    let closed = series(closed, LEVEL_CLOSED)?;

    let records: Vec<GdpRecord> = years
        .iter()
        .enumerate()
        .map(|(i, &year)| GdpRecord {
            year,
            revised: revised[i],
            retropolated: retropolated[i],
            closed: closed[i],
            unified: unify(revised[i], retropolated[i], closed[i]),
        })
        .collect();

    info!(path, years = records.len(), "GDP CSV loaded");
    Ok(records)
}

/// Derives the unified value for one year. This is an unconditional override
/// chain, highest priority last: start from the closed figure, overwrite with
/// the retropolated one where present, overwrite again with the revised one
/// where present.
pub fn unify(
    revised: Option<f64>,
    retropolated: Option<f64>,
    closed: Option<f64>,
) -> Option<f64> {
    let mut unified = closed;
    if retropolated.is_some() {
        unified = retropolated;
    }
    if revised.is_some() {
        unified = revised;
    }
    unified
}

/// The three original estimate series as a year table, for charting.
pub fn original_series_table(records: &[GdpRecord]) -> Result<YearTable> {
    let mut table = YearTable::new(records.iter().map(|r| r.year).collect());
    table.push_column("Revised", records.iter().map(|r| r.revised).collect())?;
    table.push_column(
        "Retropolated",
        records.iter().map(|r| r.retropolated).collect(),
    )?;
    table.push_column("Closed", records.iter().map(|r| r.closed).collect())?;
    Ok(table)
}

/// The unified series alone as a year table.
pub fn unified_series_table(records: &[GdpRecord]) -> Result<YearTable> {
    let mut table = YearTable::new(records.iter().map(|r| r.year).collect());
    table.push_column("Unified", records.iter().map(|r| r.unified).collect())?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unify_retropolated_over_closed() {
        assert_eq!(unify(None, Some(50.0), Some(40.0)), Some(50.0));
    }

    #[test]
    fn test_unify_revised_over_retropolated() {
        assert_eq!(unify(Some(70.0), Some(50.0), None), Some(70.0));
    }

    #[test]
    fn test_unify_closed_when_alone() {
        assert_eq!(unify(None, None, Some(40.0)), Some(40.0));
    }

    #[test]
    fn test_unify_all_missing() {
        assert_eq!(unify(None, None, None), None);
    }

    fn write_fixture(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_gdp_builds_unified_series() {
        let file = write_fixture(
            "Nível;Setores;2000;2001;2002;Fonte\n\
             1.1;PIB revisado;;;300.0;IBGE\n\
             1.2;PIB retropolado;;210.0;290.0;IBGE\n\
             1.3;PIB encerrado;100.0;200.0;;IBGE\n",
        );
        let records = load_gdp(file.path().to_str().unwrap()).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].unified, Some(100.0)); // closed only
        assert_eq!(records[1].unified, Some(210.0)); // retropolated wins
        assert_eq!(records[2].unified, Some(300.0)); // revised wins
    }

    #[test]
    fn test_load_gdp_missing_indicator_is_fatal() {
        let file = write_fixture(
            "Nível;Setores;2000;Fonte\n\
             1.1;PIB revisado;100.0;IBGE\n\
             1.3;PIB encerrado;90.0;IBGE\n",
        );
        let err = load_gdp(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("1.2"));
    }

    #[test]
    fn test_load_gdp_malformed_cell_becomes_missing() {
        let file = write_fixture(
            "Nível;Setores;2000;Fonte\n\
             1.1;PIB revisado;...;IBGE\n\
             1.2;PIB retropolado;;IBGE\n\
             1.3;PIB encerrado;90.0;IBGE\n",
        );
        let records = load_gdp(file.path().to_str().unwrap()).unwrap();
        assert_eq!(records[0].revised, None);
        assert_eq!(records[0].unified, Some(90.0));
    }
}
