//! Chart rendering over year tables.
//!
//! Every function here is a pure transform from a table (plus parameters) to
//! a rendered chart, gated by three flags: `generate` (render at all),
//! `persist` (write the PNG under the images directory, named after the
//! chart title), and `display` (open the persisted file in the platform
//! viewer). Without `persist` the chart is rendered into an in-memory
//! bitmap and discarded; `display` without `persist` is a no-op.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::prepare::types::RidershipRecord;
use crate::stats;
use crate::table::YearTable;

const SIZE_WIDE: (u32, u32) = (1200, 600);
const SIZE_SQUARE: (u32, u32) = (800, 700);
const FACET_SIZE: u32 = 400;

/// Chart gating and output location for one run.
#[derive(Debug, Clone)]
pub struct ChartSettings {
    pub generate: bool,
    pub display: bool,
    pub persist: bool,
    pub images_dir: PathBuf,
}

impl ChartSettings {
    pub fn from_config(cfg: &RunConfig) -> Self {
        Self {
            generate: cfg.charts.generate,
            display: cfg.charts.display,
            persist: cfg.charts.persist,
            images_dir: PathBuf::from(&cfg.images_dir),
        }
    }

    /// Output path for a chart: `<images_dir>/<title>.png`. Title collisions
    /// overwrite silently, so titles must be unique within a run.
    pub fn target_path(&self, title: &str) -> PathBuf {
        self.images_dir.join(format!("{title}.png"))
    }
}

fn chart_err(title: &str, e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("rendering chart '{title}': {e}")
}

/// Creates the drawing root: a file-backed bitmap when persisting, an
/// in-memory buffer otherwise.
fn make_root<'a>(
    s: &ChartSettings,
    path: &'a Path,
    buf: &'a mut Vec<u8>,
    size: (u32, u32),
    title: &str,
) -> Result<DrawingArea<BitMapBackend<'a>, Shift>> {
    let root = if s.persist {
        fs::create_dir_all(&s.images_dir)
            .with_context(|| format!("creating images directory {}", s.images_dir.display()))?;
        BitMapBackend::new(path, size).into_drawing_area()
    } else {
        buf.resize((size.0 * size.1 * 3) as usize, 0);
        BitMapBackend::with_buffer(buf.as_mut_slice(), size).into_drawing_area()
    };
    root.fill(&WHITE).map_err(|e| chart_err(title, e))?;
    Ok(root)
}

fn finish(s: &ChartSettings, path: &Path) {
    if s.persist && s.display {
        open_viewer(path);
    }
}

/// Opens the persisted chart in the platform image viewer, best effort.
fn open_viewer(path: &Path) {
    let cmd = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    if let Err(e) = std::process::Command::new(cmd).arg(path).spawn() {
        warn!(path = %path.display(), error = %e, "could not open chart viewer");
    }
}

/// Line chart: one marked series per column over the year index.
pub fn line_chart(
    s: &ChartSettings,
    table: &YearTable,
    x_label: &str,
    y_label: &str,
    title: &str,
) -> Result<()> {
    if !s.generate {
        return Ok(());
    }
    debug!(title, "rendering line chart");

    let path = s.target_path(title);
    let mut buf = Vec::new();
    {
        let root = make_root(s, &path, &mut buf, SIZE_WIDE, title)?;
        draw_line_series(&root, table, x_label, y_label, title, None)?;
        root.present().map_err(|e| chart_err(title, e))?;
    }
    finish(s, &path);
    Ok(())
}

/// Line chart with every column independently min-max normalized, so all
/// series share a [0, 1] visual scale regardless of original units.
pub fn minmax_line_chart(
    s: &ChartSettings,
    table: &YearTable,
    x_label: &str,
    y_label: &str,
    title: &str,
) -> Result<()> {
    if !s.generate {
        return Ok(());
    }
    debug!(title, "rendering min-max line chart");

    let normalized = table.min_max_normalized();
    let path = s.target_path(title);
    let mut buf = Vec::new();
    {
        let root = make_root(s, &path, &mut buf, SIZE_WIDE, title)?;
        draw_line_series(
            &root,
            &normalized,
            x_label,
            y_label,
            title,
            Some((-0.05, 1.05)),
        )?;
        root.present().map_err(|e| chart_err(title, e))?;
    }
    finish(s, &path);
    Ok(())
}

fn draw_line_series(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    table: &YearTable,
    x_label: &str,
    y_label: &str,
    title: &str,
    y_range: Option<(f64, f64)>,
) -> Result<()> {
    let present: Vec<f64> = table
        .columns()
        .flat_map(|(_, values)| values.iter().filter_map(|v| *v))
        .collect();
    let Some((y_min, y_max)) = stats::min_max(&present) else {
        warn!(title, "no data to plot, skipping");
        return Ok(());
    };
    let (y_lo, y_hi) = y_range.unwrap_or_else(|| {
        let pad = ((y_max - y_min) * 0.05).max(1e-9);
        (y_min - pad, y_max + pad)
    });

    let years = table.years();
    let (x_lo, x_hi) = (years[0], years[years.len() - 1]);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_lo..x_hi + 1, y_lo..y_hi)
        .map_err(|e| chart_err(title, e))?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .x_labels(years.len().min(26))
        .x_label_formatter(&|y| y.to_string())
        .draw()
        .map_err(|e| chart_err(title, e))?;

    for (i, (name, values)) in table.columns().enumerate() {
        let color = Palette99::pick(i).to_rgba();
        let points: Vec<(i32, f64)> = years
            .iter()
            .zip(values)
            .filter_map(|(&y, v)| v.map(|v| (y, v)))
            .collect();

        chart
            .draw_series(LineSeries::new(
                points.iter().copied(),
                color.stroke_width(2),
            ))
            .map_err(|e| chart_err(title, e))?
            .label(name)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
            });

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
            )
            .map_err(|e| chart_err(title, e))?;
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| chart_err(title, e))?;

    Ok(())
}

/// Boxplot facet grid: one subplot per category (station), `cols` subplots
/// per row, with per-year quartile boxes and small outlier markers.
pub fn boxplot_grid(
    s: &ChartSettings,
    rows: &[RidershipRecord],
    cols: usize,
    _x_label: &str,
    y_label: &str,
    title: &str,
) -> Result<()> {
    if !s.generate {
        return Ok(());
    }
    debug!(title, "rendering boxplot grid");

    let mut by_station: std::collections::BTreeMap<&str, std::collections::BTreeMap<i32, Vec<f64>>> =
        Default::default();
    for row in rows {
        if let Some(p) = row.passengers {
            by_station
                .entry(row.station.as_str())
                .or_default()
                .entry(row.year)
                .or_default()
                .push(p);
        }
    }
    if by_station.is_empty() {
        warn!(title, "no data to plot, skipping");
        return Ok(());
    }

    let cols = cols.max(1);
    let grid_rows = by_station.len().div_ceil(cols);
    let size = (cols as u32 * FACET_SIZE, grid_rows as u32 * FACET_SIZE + 40);

    let path = s.target_path(title);
    let mut buf = Vec::new();
    {
        let root = make_root(s, &path, &mut buf, size, title)?;
        let titled = root
            .titled(title, ("sans-serif", 22))
            .map_err(|e| chart_err(title, e))?;
        let areas = titled.split_evenly((grid_rows, cols));

        for (area, (station, by_year)) in areas.iter().zip(&by_station) {
            let years: Vec<i32> = by_year.keys().copied().collect();
            let (x_lo, x_hi) = (years[0], years[years.len() - 1]);
            let y_hi = by_year
                .values()
                .flatten()
                .copied()
                .fold(f64::MIN, f64::max);

            // Boxplot elements carry f32 values, so the y axis is f32 here.
            let mut chart = ChartBuilder::on(area)
                .caption(*station, ("sans-serif", 14))
                .margin(8)
                .x_label_area_size(30)
                .y_label_area_size(45)
                .build_cartesian_2d(
                    (x_lo..x_hi + 1).into_segmented(),
                    0f32..(y_hi * 1.05) as f32,
                )
                .map_err(|e| chart_err(title, e))?;

            chart
                .configure_mesh()
                .y_desc(y_label)
                .x_label_style(("sans-serif", 8))
                .y_label_style(("sans-serif", 8))
                .draw()
                .map_err(|e| chart_err(title, e))?;

            for (&year, values) in by_year {
                let quartiles = Quartiles::new(values);
                chart
                    .draw_series(std::iter::once(
                        Boxplot::new_vertical(SegmentValue::CenterOf(year), &quartiles)
                            .width(8)
                            .whisker_width(0.5),
                    ))
                    .map_err(|e| chart_err(title, e))?;

                // Outliers past the whisker fences, drawn small.
                let fences = quartiles.values();
                let (lo, hi) = (fences[0] as f64, fences[4] as f64);
                chart
                    .draw_series(values.iter().filter(|&&v| v < lo || v > hi).map(|&v| {
                        Circle::new((SegmentValue::CenterOf(year), v as f32), 1, BLACK.filled())
                    }))
                    .map_err(|e| chart_err(title, e))?;
            }
        }

        root.present().map_err(|e| chart_err(title, e))?;
    }
    finish(s, &path);
    Ok(())
}

/// Correlation heatmap over all columns, annotated with the coefficients.
///
/// The color range is fixed to [0, 1] to match the original analysis, so a
/// negative coefficient renders with the same color as zero (the annotation
/// still shows the true value). Known limitation, kept for output
/// compatibility.
pub fn correlation_heatmap(s: &ChartSettings, table: &YearTable, title: &str) -> Result<()> {
    if !s.generate {
        return Ok(());
    }
    debug!(title, "rendering correlation heatmap");

    let names: Vec<String> = table.column_names().iter().map(|n| n.to_string()).collect();
    let matrix = table.correlation_matrix();
    let n = names.len();
    if n == 0 {
        warn!(title, "no columns to correlate, skipping");
        return Ok(());
    }

    let path = s.target_path(title);
    let mut buf = Vec::new();
    {
        let root = make_root(s, &path, &mut buf, SIZE_SQUARE, title)?;

        let x_names = names.clone();
        let y_names = names.clone();
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(60)
            .y_label_area_size(90)
            .build_cartesian_2d(0.0..n as f64, 0.0..n as f64)
            .map_err(|e| chart_err(title, e))?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_labels(n)
            .y_labels(n)
            .x_label_formatter(&|v| label_for(&x_names, *v))
            .y_label_formatter(&|v| label_for(&y_names, *v))
            .draw()
            .map_err(|e| chart_err(title, e))?;

        for (i, row) in matrix.iter().enumerate() {
            for (j, &value) in row.iter().enumerate() {
                let (x, y) = (i as f64, j as f64);
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [(x, y), (x + 1.0, y + 1.0)],
                        heat_color(value).filled(),
                    )))
                    .map_err(|e| chart_err(title, e))?;
                chart
                    .draw_series(std::iter::once(Text::new(
                        format!("{value:.2}"),
                        (x + 0.38, y + 0.52),
                        ("sans-serif", 16),
                    )))
                    .map_err(|e| chart_err(title, e))?;
            }
        }

        root.present().map_err(|e| chart_err(title, e))?;
    }
    finish(s, &path);
    Ok(())
}

fn label_for(names: &[String], position: f64) -> String {
    let index = position.floor() as usize;
    names.get(index).cloned().unwrap_or_default()
}

/// Maps a coefficient to a cool-warm color over the fixed [0, 1] range.
/// Values outside the range clamp to the endpoints.
fn heat_color(value: f64) -> RGBColor {
    let t = value.clamp(0.0, 1.0);
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t) as u8;
    // coolwarm endpoints: blue (59, 76, 192) to red (180, 4, 38)
    RGBColor(lerp(59, 180), lerp(76, 4), lerp(192, 38))
}

/// Scatter of two columns with an ordinary least-squares regression overlay.
pub fn scatter_regression(
    s: &ChartSettings,
    table: &YearTable,
    x_col: &str,
    y_col: &str,
    title: &str,
) -> Result<()> {
    if !s.generate {
        return Ok(());
    }
    debug!(title, "rendering scatter chart");

    let xs_col = table
        .column(x_col)
        .with_context(|| format!("scatter '{title}': no column '{x_col}'"))?;
    let ys_col = table
        .column(y_col)
        .with_context(|| format!("scatter '{title}': no column '{y_col}'"))?;

    let (xs, ys): (Vec<f64>, Vec<f64>) = xs_col
        .iter()
        .zip(ys_col)
        .filter_map(|(x, y)| x.zip(*y))
        .unzip();
    if xs.len() < 2 {
        warn!(title, "not enough complete pairs to plot, skipping");
        return Ok(());
    }

    let (x_min, x_max) = stats::min_max(&xs).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = stats::min_max(&ys).unwrap_or((0.0, 1.0));
    let x_pad = ((x_max - x_min) * 0.05).max(1e-9);
    let y_pad = ((y_max - y_min) * 0.05).max(1e-9);

    let path = s.target_path(title);
    let mut buf = Vec::new();
    {
        let root = make_root(s, &path, &mut buf, SIZE_WIDE, title)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(x_min - x_pad..x_max + x_pad, y_min - y_pad..y_max + y_pad)
            .map_err(|e| chart_err(title, e))?;

        chart
            .configure_mesh()
            .x_desc(x_col)
            .y_desc(y_col)
            .draw()
            .map_err(|e| chart_err(title, e))?;

        chart
            .draw_series(
                xs.iter()
                    .zip(&ys)
                    .map(|(&x, &y)| Circle::new((x, y), 4, BLUE.mix(0.6).filled())),
            )
            .map_err(|e| chart_err(title, e))?
            .label("Data")
            .legend(|(x, y)| Circle::new((x + 10, y), 4, BLUE.mix(0.6).filled()));

        if let Some((a, b)) = stats::ols_line(&xs, &ys) {
            chart
                .draw_series(LineSeries::new(
                    [x_min, x_max].map(|x| (x, a * x + b)),
                    RED.stroke_width(2),
                ))
                .map_err(|e| chart_err(title, e))?
                .label(format!("Regression: y = {a:.2}x + {b:.2}"))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| chart_err(title, e))?;

        root.present().map_err(|e| chart_err(title, e))?;
    }
    finish(s, &path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_settings() -> ChartSettings {
        ChartSettings {
            generate: false,
            display: false,
            persist: false,
            images_dir: PathBuf::from("images"),
        }
    }

    fn small_table() -> YearTable {
        let mut table = YearTable::new(vec![2000, 2001]);
        table
            .push_column("a", vec![Some(1.0), Some(2.0)])
            .unwrap();
        table
    }

    #[test]
    fn test_target_path_uses_title() {
        let s = disabled_settings();
        assert_eq!(
            s.target_path("My Chart"),
            PathBuf::from("images/My Chart.png")
        );
    }

    #[test]
    fn test_disabled_generate_is_noop() {
        let s = disabled_settings();
        let table = small_table();
        line_chart(&s, &table, "x", "y", "t").unwrap();
        minmax_line_chart(&s, &table, "x", "y", "t").unwrap();
        correlation_heatmap(&s, &table, "t").unwrap();
        scatter_regression(&s, &table, "a", "a", "t").unwrap();
        boxplot_grid(&s, &[], 4, "x", "y", "t").unwrap();
        assert!(!s.target_path("t").exists());
    }

    #[test]
    fn test_heat_color_clamps_negative_to_zero_color() {
        assert_eq!(heat_color(-0.7), heat_color(0.0));
        assert_eq!(heat_color(1.5), heat_color(1.0));
        assert_ne!(heat_color(0.0), heat_color(1.0));
    }

    #[test]
    fn test_label_for_positions() {
        let names = vec!["a".to_string(), "b".to_string()];
        assert_eq!(label_for(&names, 0.0), "a");
        assert_eq!(label_for(&names, 1.2), "b");
        assert_eq!(label_for(&names, 5.0), "");
    }
}
