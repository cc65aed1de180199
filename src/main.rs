//! CLI entry point for the metro forecast pipeline.
//!
//! Loads and repairs the three input datasets (subway ridership, population,
//! GDP), combines them into one yearly series, renders the exploratory
//! charts, and optionally trains the next-year forecasting network.

use anyhow::Result;
use clap::Parser;
use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use metro_forecast::charts::{self, ChartSettings};
use metro_forecast::config::{ChartFlags, RunConfig};
use metro_forecast::forecast::{ForecastParams, run_forecast};
use metro_forecast::prepare::types::{GdpRecord, PopulationRecord, RidershipRecord};
use metro_forecast::prepare::{combine, gdp, population, ridership};
use metro_forecast::report::{ColumnProfile, Reporter, Verbosity, profile_column};
use metro_forecast::table::YearTable;

/// Year whose ridership data is entirely unusable (every record missing the
/// passenger count from a known date forward).
const UNUSABLE_RIDERSHIP_YEAR: i32 = 2023;

/// Inclusive year range the population series is restricted to.
const POPULATION_YEARS: (i32, i32) = (1998, 2022);

#[derive(Parser)]
#[command(name = "metro_forecast")]
#[command(about = "Cleans, merges, and forecasts metro ridership, GDP, and population", long_about = None)]
struct Cli {
    /// Ridership CSV path
    #[arg(long, default_value = "data/metro.csv")]
    metro_csv: String,

    /// Population CSV path
    #[arg(long, default_value = "data/populacao.csv")]
    population_csv: String,

    /// GDP CSV path (semicolon-delimited)
    #[arg(long, default_value = "data/pib.csv")]
    gdp_csv: String,

    /// Directory chart PNGs are written to
    #[arg(long, default_value = "images")]
    images_dir: String,

    /// Skip chart generation entirely
    #[arg(long, default_value_t = false)]
    no_charts: bool,

    /// Open persisted charts in the platform image viewer
    #[arg(long, default_value_t = false)]
    show: bool,

    /// Render charts without writing PNG files
    #[arg(long, default_value_t = false)]
    no_save: bool,

    /// Skip the neural-network forecast stage
    #[arg(long, default_value_t = false)]
    no_forecast: bool,

    /// Split year: years <= this train the model, later years evaluate it
    #[arg(long, default_value_t = 2015)]
    split_year: i32,

    /// Training passes over the training set
    #[arg(long, default_value_t = 500)]
    epochs: usize,

    /// Mini-batch size for training
    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    /// First year of the "well-behaved" filtered analysis
    #[arg(long, default_value_t = 2001)]
    focus_start: i32,

    /// Last year of the "well-behaved" filtered analysis
    #[arg(long, default_value_t = 2019)]
    focus_end: i32,

    /// Verbosity: 0=silent, 1=sections, 2=+value dumps, 3=+profiling dumps
    #[arg(short, long, default_value_t = 3)]
    verbosity: u8,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/metro_forecast.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("metro_forecast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let cfg = RunConfig {
        metro_csv: cli.metro_csv,
        population_csv: cli.population_csv,
        gdp_csv: cli.gdp_csv,
        images_dir: cli.images_dir,
        charts: ChartFlags {
            generate: !cli.no_charts,
            display: cli.show,
            persist: !cli.no_save,
        },
        forecast: !cli.no_forecast,
        split_year: cli.split_year,
        epochs: cli.epochs,
        batch_size: cli.batch_size,
        verbosity: Verbosity::from_level(cli.verbosity),
        focus_range: (cli.focus_start, cli.focus_end),
    };

    run(&cfg)
}

/// Sequences the pipeline stages: each runs to completion before the next,
/// and any fatal error terminates the run.
fn run(cfg: &RunConfig) -> Result<()> {
    let reporter = Reporter::new(cfg.verbosity);
    let chart_settings = ChartSettings::from_config(cfg);

    let metro = load_and_clean_ridership(cfg, &reporter, &chart_settings)?;
    let population = load_and_clean_population(cfg, &reporter)?;
    let gdp = load_and_unify_gdp(cfg, &reporter, &chart_settings)?;

    let combined = combine_and_chart(cfg, &reporter, &chart_settings, &metro, &gdp, &population)?;

    if cfg.forecast {
        run_forecast(
            &combined,
            &ForecastParams {
                split_year: cfg.split_year,
                epochs: cfg.epochs,
                batch_size: cfg.batch_size,
            },
            &reporter,
            &chart_settings,
        )?;
    }

    reporter.section("PROCESSING COMPLETE");
    Ok(())
}

#[tracing::instrument(skip_all)]
fn load_and_clean_ridership(
    cfg: &RunConfig,
    reporter: &Reporter,
    chart_settings: &ChartSettings,
) -> Result<Vec<RidershipRecord>> {
    let rows = ridership::load_ridership(&cfg.metro_csv)?;
    reporter.data_profile("metro", &ridership::profile(&rows));

    // The profiling dump shows one more line than the network actually has;
    // duplicated interior spaces make one line look like two.
    reporter.section("Unique subway_line values");
    reporter.detail(format!("{:?}", ridership::unique_lines(&rows)));

    let rows = ridership::normalize_line_names(rows);
    reporter.section("Unique subway_line values after fix");
    reporter.detail(format!("{:?}", ridership::unique_lines(&rows)));

    reporter.section("Missing passengers by month");
    let mut by_month = String::new();
    for (month, missing, stations) in ridership::missing_by_month(&rows) {
        let _ = writeln!(by_month, "{month}  missing {missing:>3} of {stations} stations");
    }
    reporter.detail(by_month);

    let rows = ridership::drop_year(rows, UNUSABLE_RIDERSHIP_YEAR);

    report_missing_by_station(reporter, &rows);
    reporter.list_station(&rows, "Ipanema / General Osório");
    reporter.list_station(&rows, "São Conrado");

    // The stations with the worst gaps all start with a missing run: rows
    // recorded from January of the opening year, before service began.
    let rows = ridership::trim_leading_missing(rows);
    report_missing_by_station(reporter, &rows);

    charts::boxplot_grid(
        chart_settings,
        &rows,
        4,
        "",
        "Pax / Month",
        "BoxPlot - Monthly Passenger Distribution by Station and Year",
    )?;

    Ok(rows)
}

fn report_missing_by_station(reporter: &Reporter, rows: &[RidershipRecord]) {
    reporter.section("Missing passengers by station");
    let mut out = String::new();
    for (station, missing, total, pct) in ridership::missing_by_station(rows) {
        let _ = writeln!(out, "{station}: {missing} of {total} ({pct:.1}%)");
    }
    reporter.detail(out);
}

#[tracing::instrument(skip_all)]
fn load_and_clean_population(
    cfg: &RunConfig,
    reporter: &Reporter,
) -> Result<Vec<PopulationRecord>> {
    let rows = population::load_population(&cfg.population_csv)?;
    reporter.data_profile("population", &population::profile(&rows));

    reporter.section("Years without population data");
    let missing: Vec<i32> = rows
        .iter()
        .filter(|r| r.population.is_none())
        .map(|r| r.year)
        .collect();
    reporter.detail(format!("{missing:?}"));

    let rows = population::interpolate_missing(rows);

    reporter.section("Tail years after interpolation");
    let mut tail = String::new();
    for row in rows.iter().rev().take(5).rev() {
        match row.population {
            Some(p) => {
                let _ = writeln!(tail, "{}  {p:.1}", row.year);
            }
            None => {
                let _ = writeln!(tail, "{}  NaN", row.year);
            }
        }
    }
    reporter.detail(tail);

    Ok(population::restrict_years(
        rows,
        POPULATION_YEARS.0,
        POPULATION_YEARS.1,
    ))
}

#[tracing::instrument(skip_all)]
fn load_and_unify_gdp(
    cfg: &RunConfig,
    reporter: &Reporter,
    chart_settings: &ChartSettings,
) -> Result<Vec<GdpRecord>> {
    let records = gdp::load_gdp(&cfg.gdp_csv)?;

    let original = gdp::original_series_table(&records)?;
    let profiles: Vec<ColumnProfile> = original
        .columns()
        .map(|(name, values)| profile_column(name, values))
        .collect();
    reporter.data_profile("gdp", &profiles);

    reporter.section("GDP original series");
    reporter.detail(format_table(&original));
    charts::line_chart(
        chart_settings,
        &original,
        "Year",
        "R$",
        "Line - GDP by Year - Original Series",
    )?;

    let unified = gdp::unified_series_table(&records)?;
    reporter.section("GDP unified series");
    reporter.detail(format_table(&unified));
    charts::line_chart(
        chart_settings,
        &unified,
        "Year",
        "R$",
        "Line - GDP by Year - Unified Series",
    )?;

    Ok(records)
}

#[tracing::instrument(skip_all)]
fn combine_and_chart(
    cfg: &RunConfig,
    reporter: &Reporter,
    s: &ChartSettings,
    metro: &[RidershipRecord],
    gdp: &[GdpRecord],
    population: &[PopulationRecord],
) -> Result<YearTable> {
    let totals = ridership::passengers_by_year(metro);
    let combined = combine::combine(&totals, gdp, population)?;
    info!(years = combined.len(), "combined series built");

    reporter.section("Combined data - all years");
    reporter.detail(format_table(&combined));

    charts::minmax_line_chart(
        s,
        &combined,
        "Year",
        "Min-Max Normalized",
        "Line - MinMax - Passengers, GDP and Population - All Years",
    )?;

    let (start, end) = cfg.focus_range;
    let label = format!("{start} to {end}");
    let filtered = combined.filter_years(start, end);
    charts::minmax_line_chart(
        s,
        &filtered,
        "Year",
        "Min-Max Normalized",
        &format!("Line - MinMax - Passengers, GDP and Population - {label}"),
    )?;

    charts::correlation_heatmap(
        s,
        &combined,
        "Correlation Matrix - Passengers, GDP and Population - All Years",
    )?;
    charts::scatter_regression(
        s,
        &combined,
        combine::PASSENGERS,
        combine::POPULATION,
        "Scatter - Passengers and Population - All Years",
    )?;
    charts::scatter_regression(
        s,
        &combined,
        combine::PASSENGERS,
        combine::GDP,
        "Scatter - Passengers and GDP - All Years",
    )?;

    charts::correlation_heatmap(
        s,
        &filtered,
        &format!("Correlation Matrix - Passengers, GDP and Population - {label}"),
    )?;
    charts::scatter_regression(
        s,
        &filtered,
        combine::PASSENGERS,
        combine::POPULATION,
        &format!("Scatter - Passengers and Population - {label}"),
    )?;
    charts::scatter_regression(
        s,
        &filtered,
        combine::PASSENGERS,
        combine::GDP,
        &format!("Scatter - Passengers and GDP - {label}"),
    )?;

    Ok(combined)
}

/// Fixed-width text rendering of a year table for the value dumps.
fn format_table(table: &YearTable) -> String {
    let mut out = String::new();

    let _ = write!(out, "{:>6}", "year");
    for name in table.column_names() {
        let _ = write!(out, "  {name:>18}");
    }
    out.push('\n');

    for (i, year) in table.years().iter().enumerate() {
        let _ = write!(out, "{year:>6}");
        for (_, values) in table.columns() {
            match values[i] {
                Some(v) => {
                    let _ = write!(out, "  {v:>18.1}");
                }
                None => {
                    let _ = write!(out, "  {:>18}", "NaN");
                }
            }
        }
        out.push('\n');
    }

    out
}
