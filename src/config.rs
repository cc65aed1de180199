//! Run-wide configuration, assembled once from the CLI at startup.

use crate::report::Verbosity;

/// Chart gating flags.
///
/// `generate` controls whether charts are rendered at all, `display` whether
/// a persisted chart is opened in the platform viewer, and `persist` whether
/// the rendered PNG is written to disk.
#[derive(Debug, Clone, Copy)]
pub struct ChartFlags {
    pub generate: bool,
    pub display: bool,
    pub persist: bool,
}

/// Static configuration for a single pipeline run.
///
/// Built once in `main` and passed by reference into each stage; no stage
/// mutates it.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Path to the subway ridership CSV.
    pub metro_csv: String,
    /// Path to the population CSV.
    pub population_csv: String,
    /// Path to the GDP CSV (semicolon-delimited).
    pub gdp_csv: String,
    /// Directory where chart PNGs are written.
    pub images_dir: String,

    pub charts: ChartFlags,

    /// Whether the neural-network forecast stage runs.
    pub forecast: bool,
    /// Years <= `split_year` train the model, years > it evaluate it.
    pub split_year: i32,
    /// Training passes over the training set.
    pub epochs: usize,
    /// Mini-batch size for training.
    pub batch_size: usize,

    pub verbosity: Verbosity,

    /// Inclusive year sub-range used for the "well-behaved" filtered analysis.
    pub focus_range: (i32, i32),
}
