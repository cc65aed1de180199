use std::path::PathBuf;

use metro_forecast::charts::ChartSettings;
use metro_forecast::forecast::{ForecastParams, run_forecast, split_at_year};
use metro_forecast::prepare::{combine, gdp, population, ridership};
use metro_forecast::report::{Reporter, Verbosity};
use metro_forecast::table::YearTable;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

#[test]
fn test_full_preparation_pipeline() {
    // Ridership: normalize line names, drop the unusable year, trim leading
    // missing runs.
    let rows = ridership::load_ridership(&fixture("metro.csv")).unwrap();
    let rows = ridership::normalize_line_names(rows);
    assert_eq!(
        ridership::unique_lines(&rows),
        vec!["Linha 1".to_string(), "Linha 4".to_string()]
    );

    let rows = ridership::drop_year(rows, 2023);
    assert!(rows.iter().all(|r| r.year != 2023));

    let rows = ridership::trim_leading_missing(rows);
    for station in ["Central", "São Conrado"] {
        let first = rows.iter().find(|r| r.station == station).unwrap();
        assert!(
            first.passengers.is_some(),
            "station {station} still starts with a missing value"
        );
    }

    let totals = ridership::passengers_by_year(&rows);
    assert_eq!(totals[&2014], 200.0); // Central only; São Conrado not yet open
    assert_eq!(totals[&2015], 250.0); // interior gap counts as zero
    assert_eq!(totals[&2016], 300.0);
    assert_eq!(totals[&2017], 300.0);

    // Population: scrub separators and interpolate the gap year.
    let pop = population::load_population(&fixture("populacao.csv")).unwrap();
    let pop = population::interpolate_missing(pop);
    let pop = population::restrict_years(pop, 2014, 2017);
    let p2016 = pop
        .iter()
        .find(|r| r.year == 2016)
        .unwrap()
        .population
        .unwrap();
    assert!((p2016 - 6_200_000.0).abs() < 1e-6);

    // GDP: unified by priority revised > retropolated > closed.
    let gdp_records = gdp::load_gdp(&fixture("pib.csv")).unwrap();
    let unified: Vec<Option<f64>> = gdp_records.iter().map(|r| r.unified).collect();
    assert_eq!(
        unified,
        vec![Some(290.0), Some(310.0), Some(320.0), Some(340.0)]
    );

    // Combine: all three sources align on year with no gaps.
    let combined = combine::combine(&totals, &gdp_records, &pop).unwrap();
    assert_eq!(combined.years(), &[2014, 2015, 2016, 2017]);
    let (complete_years, _) = combined.rows_complete();
    assert_eq!(complete_years, vec![2014, 2015, 2016, 2017]);
}

fn synthetic_series() -> YearTable {
    let years: Vec<i32> = (1998..=2022).collect();
    let n = years.len();
    let mut table = YearTable::new(years);
    table
        .push_column(
            "Passengers",
            (0..n).map(|i| Some(1000.0 + 25.0 * i as f64)).collect(),
        )
        .unwrap();
    table
        .push_column("GDP", (0..n).map(|i| Some(200.0 + 8.0 * i as f64)).collect())
        .unwrap();
    table
        .push_column(
            "Population",
            (0..n).map(|i| Some(6e6 + 1e4 * i as f64)).collect(),
        )
        .unwrap();
    table
}

#[test]
fn test_reference_split_scenario() {
    // 1998-2022 with split at 2015: 18 training rows, 7 evaluation rows.
    let split = split_at_year(&synthetic_series(), 2015).unwrap();
    assert_eq!(split.train.nrows(), 18);
    assert_eq!(split.eval.nrows(), 7);
    assert!(split.train_years.iter().all(|&y| y <= 2015));
    assert!(split.eval_years.iter().all(|&y| y > 2015));
}

#[test]
fn test_forecast_runs_end_to_end() {
    let settings = ChartSettings {
        generate: false,
        display: false,
        persist: false,
        images_dir: PathBuf::from("images"),
    };
    let reporter = Reporter::new(Verbosity::Silent);
    let params = ForecastParams {
        split_year: 2015,
        epochs: 5,
        batch_size: 4,
    };

    run_forecast(&synthetic_series(), &params, &reporter, &settings).unwrap();
}

#[test]
fn test_forecast_fails_without_evaluation_years() {
    let settings = ChartSettings {
        generate: false,
        display: false,
        persist: false,
        images_dir: PathBuf::from("images"),
    };
    let reporter = Reporter::new(Verbosity::Silent);
    let params = ForecastParams {
        split_year: 2030,
        epochs: 5,
        batch_size: 4,
    };

    let err = run_forecast(&synthetic_series(), &params, &reporter, &settings).unwrap_err();
    assert!(err.to_string().contains("2030"));
}
