//! Next-year forecasting of the combined series.
//!
//! Linear stage chain with no recovery: clean (drop incomplete rows), split
//! at the cutoff year, scale on the training set, train, predict one step
//! per evaluation row, denormalize, and report. Any stage failure aborts the
//! run.

pub mod network;
pub mod scaler;

use anyhow::{Context, Result, ensure};
use ndarray::{Array2, s};
use serde_json::json;
use tracing::info;

use crate::charts::{self, ChartSettings};
use crate::forecast::network::{Mlp, TrainParams};
use crate::forecast::scaler::MinMaxScaler;
use crate::report::Reporter;
use crate::table::YearTable;

/// Dropout probability after the first hidden layer.
const DROPOUT: f64 = 0.2;

/// Forecast stage parameters.
#[derive(Debug, Clone)]
pub struct ForecastParams {
    /// Years <= `split_year` train; years > it evaluate.
    pub split_year: i32,
    pub epochs: usize,
    pub batch_size: usize,
}

/// Training and evaluation partitions of the cleaned combined series.
pub struct SplitSeries {
    pub train_years: Vec<i32>,
    pub train: Array2<f64>,
    pub eval_years: Vec<i32>,
    pub eval: Array2<f64>,
}

/// Drops incomplete rows and partitions the series at the cutoff year.
/// Both partitions must be non-empty.
pub fn split_at_year(table: &YearTable, split_year: i32) -> Result<SplitSeries> {
    let (years, rows) = table.rows_complete();
    let width = table.column_names().len();

    let mut train_years = Vec::new();
    let mut train_rows = Vec::new();
    let mut eval_years = Vec::new();
    let mut eval_rows = Vec::new();

    for (year, row) in years.into_iter().zip(rows) {
        if year <= split_year {
            train_years.push(year);
            train_rows.extend(row);
        } else {
            eval_years.push(year);
            eval_rows.extend(row);
        }
    }

    ensure!(
        !train_years.is_empty(),
        "no training data at or before split year {split_year}"
    );
    ensure!(
        !eval_years.is_empty(),
        "no evaluation data after split year {split_year}"
    );

    let train = Array2::from_shape_vec((train_years.len(), width), train_rows)
        .context("shaping training matrix")?;
    let eval = Array2::from_shape_vec((eval_years.len(), width), eval_rows)
        .context("shaping evaluation matrix")?;

    Ok(SplitSeries {
        train_years,
        train,
        eval_years,
        eval,
    })
}

/// Runs the full forecast stage over the combined series and renders one
/// actual-vs-predicted chart per variable.
pub fn run_forecast(
    table: &YearTable,
    params: &ForecastParams,
    reporter: &Reporter,
    chart_settings: &ChartSettings,
) -> Result<()> {
    reporter.section(&format!(
        "NEURAL NETWORK -- Split year: {} | Epochs: {} | Batch size: {}",
        params.split_year, params.epochs, params.batch_size
    ));

    let names = table.column_names();
    let split = split_at_year(table, params.split_year)?;

    reporter.detail(format!(
        "Training years: {:?}\nEvaluation years: {:?}",
        split.train_years, split.eval_years
    ));

    let scaler =
        MinMaxScaler::fit(&split.train, &names).context("fitting scaler on the training set")?;
    let train_scaled = scaler.transform(&split.train);
    let eval_scaled = scaler.transform(&split.eval);

    // One-step-ahead framing: predict each year's vector from the previous
    // year's vector.
    ensure!(
        train_scaled.nrows() >= 2,
        "need at least two training years to frame next-year prediction, got {}",
        train_scaled.nrows()
    );
    let x_train = train_scaled.slice(s![..-1, ..]).to_owned();
    let y_train = train_scaled.slice(s![1.., ..]).to_owned();

    let mut model = Mlp::new(names.len(), names.len(), DROPOUT);
    let summary = model.train(
        &x_train,
        &y_train,
        &TrainParams {
            epochs: params.epochs,
            batch_size: params.batch_size,
            ..TrainParams::default()
        },
    )?;
    info!(
        first_epoch_loss = summary.first_epoch_loss,
        final_loss = summary.final_loss,
        "model trained"
    );

    // Evaluation inputs are used directly, not chained autoregressively.
    let predictions = scaler.inverse_transform(&model.predict(&eval_scaled));

    let comparison: Vec<_> = split
        .eval_years
        .iter()
        .enumerate()
        .map(|(i, &year)| {
            let per_variable: Vec<_> = names
                .iter()
                .enumerate()
                .map(|(j, name)| {
                    json!({
                        "variable": name,
                        "actual": split.eval[[i, j]],
                        "predicted": predictions[[i, j]],
                    })
                })
                .collect();
            json!({ "year": year, "values": per_variable })
        })
        .collect();
    reporter.detail(serde_json::to_string_pretty(&comparison)?);

    for (j, name) in names.iter().enumerate() {
        let actual = table
            .column(name)
            .with_context(|| format!("missing column '{name}' in combined series"))?;

        let predicted: Vec<Option<f64>> = table
            .years()
            .iter()
            .map(|year| {
                split
                    .eval_years
                    .iter()
                    .position(|y| y == year)
                    .map(|i| predictions[[i, j]])
            })
            .collect();

        let mut comparison_table = YearTable::new(table.years().to_vec());
        comparison_table.push_column(name, actual.to_vec())?;
        comparison_table.push_column(&format!("{name} (predicted)"), predicted)?;

        charts::line_chart(
            chart_settings,
            &comparison_table,
            "Year",
            name,
            &format!(
                "Neural Forecast - {name} - (Epochs {} - Batch {})",
                params.epochs, params.batch_size
            ),
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(years: std::ops::RangeInclusive<i32>) -> YearTable {
        let years: Vec<i32> = years.collect();
        let n = years.len();
        let mut table = YearTable::new(years.clone());
        table
            .push_column(
                "Passengers",
                (0..n).map(|i| Some(100.0 + i as f64)).collect(),
            )
            .unwrap();
        table
            .push_column("GDP", (0..n).map(|i| Some(50.0 + 2.0 * i as f64)).collect())
            .unwrap();
        table
            .push_column(
                "Population",
                (0..n).map(|i| Some(1000.0 + 10.0 * i as f64)).collect(),
            )
            .unwrap();
        table
    }

    #[test]
    fn test_split_partitions_exactly() {
        let table = series(1998..=2022);
        let split = split_at_year(&table, 2015).unwrap();

        assert!(split.train_years.iter().all(|&y| y <= 2015));
        assert!(split.eval_years.iter().all(|&y| y > 2015));

        let mut all: Vec<i32> = split
            .train_years
            .iter()
            .chain(&split.eval_years)
            .copied()
            .collect();
        all.sort();
        assert_eq!(all, (1998..=2022).collect::<Vec<i32>>());
    }

    #[test]
    fn test_split_sizes_for_reference_scenario() {
        // Full coverage 1998-2022 with split at 2015: 18 train, 7 eval.
        let table = series(1998..=2022);
        let split = split_at_year(&table, 2015).unwrap();
        assert_eq!(split.train.nrows(), 18);
        assert_eq!(split.eval.nrows(), 7);
    }

    #[test]
    fn test_split_skips_incomplete_rows() {
        let mut table = YearTable::new(vec![2014, 2015, 2016]);
        table
            .push_column("a", vec![Some(1.0), None, Some(3.0)])
            .unwrap();
        let split = split_at_year(&table, 2015).unwrap();
        assert_eq!(split.train_years, vec![2014]);
        assert_eq!(split.eval_years, vec![2016]);
    }

    #[test]
    fn test_split_empty_partition_is_error() {
        let table = series(1998..=2022);
        assert!(split_at_year(&table, 2030).is_err());
        assert!(split_at_year(&table, 1990).is_err());
    }
}
