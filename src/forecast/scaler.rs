//! Per-column min-max scaling.

use anyhow::{Result, bail, ensure};
use ndarray::{Array1, Array2};

/// Min-max scaler fitted on the training set only: each column's training
/// minimum maps to 0 and maximum to 1. Data outside the fitted range maps
/// outside [0, 1]; it is never re-fitted.
#[derive(Debug, Clone)]
pub struct MinMaxScaler {
    min: Array1<f64>,
    range: Array1<f64>,
}

impl MinMaxScaler {
    /// Fits the scaler. `names` label the columns for error context. A column
    /// with zero range cannot be scaled and is a fatal error.
    pub fn fit(data: &Array2<f64>, names: &[&str]) -> Result<Self> {
        ensure!(data.nrows() > 0, "cannot fit scaler on an empty table");
        ensure!(
            names.len() == data.ncols(),
            "scaler got {} column names for {} columns",
            names.len(),
            data.ncols()
        );

        let mut min = Array1::zeros(data.ncols());
        let mut range = Array1::zeros(data.ncols());
        for (j, column) in data.columns().into_iter().enumerate() {
            let lo = column.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if hi <= lo {
                bail!(
                    "column '{}' has zero range (min == max == {lo}), cannot min-max scale",
                    names[j]
                );
            }
            min[j] = lo;
            range[j] = hi - lo;
        }

        Ok(Self { min, range })
    }

    /// Applies the fitted transform.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.min) / &self.range
    }

    /// Inverts the fitted transform, returning values to original units.
    pub fn inverse_transform(&self, data: &Array2<f64>) -> Array2<f64> {
        data * &self.range + &self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_transform_maps_train_bounds_to_unit_interval() {
        let data = array![[0.0, 10.0], [5.0, 20.0], [10.0, 30.0]];
        let scaler = MinMaxScaler::fit(&data, &["a", "b"]).unwrap();
        let scaled = scaler.transform(&data);

        assert_eq!(scaled[[0, 0]], 0.0);
        assert_eq!(scaled[[2, 0]], 1.0);
        assert_eq!(scaled[[1, 1]], 0.5);
    }

    #[test]
    fn test_round_trip_within_tolerance() {
        let data = array![[1.5, -3.0], [2.5, 7.0], [9.0, 0.0]];
        let scaler = MinMaxScaler::fit(&data, &["a", "b"]).unwrap();
        let back = scaler.inverse_transform(&scaler.transform(&data));

        for (orig, round) in data.iter().zip(back.iter()) {
            assert!((orig - round).abs() < 1e-12);
        }
    }

    #[test]
    fn test_evaluation_data_may_exceed_unit_interval() {
        let train = array![[0.0], [10.0]];
        let scaler = MinMaxScaler::fit(&train, &["a"]).unwrap();
        let scaled = scaler.transform(&array![[20.0]]);
        assert_eq!(scaled[[0, 0]], 2.0);
    }

    #[test]
    fn test_zero_range_column_is_fatal() {
        let data = array![[1.0, 2.0], [1.0, 3.0]];
        let err = MinMaxScaler::fit(&data, &["flat", "ok"]).unwrap_err();
        assert!(err.to_string().contains("flat"));
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let data = Array2::<f64>::zeros((0, 2));
        assert!(MinMaxScaler::fit(&data, &["a", "b"]).is_err());
    }
}
