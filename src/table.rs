//! Year-indexed tables of named numeric columns.
//!
//! [`YearTable`] is the common currency between the preparation stages, the
//! charts, and the forecaster. Transforms return new tables; nothing mutates
//! a table in place.

use anyhow::{Result, ensure};

use crate::stats;

/// A table of `Option<f64>` columns sharing one year index.
#[derive(Debug, Clone)]
pub struct YearTable {
    years: Vec<i32>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl YearTable {
    pub fn new(years: Vec<i32>) -> Self {
        Self {
            years,
            columns: Vec::new(),
        }
    }

    /// Adds a column. Its length must match the year index.
    pub fn push_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        ensure!(
            values.len() == self.years.len(),
            "column '{}' has {} values but the table has {} years",
            name,
            values.len(),
            self.years.len()
        );
        self.columns.push((name.to_string(), values));
        Ok(())
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Returns a copy restricted to the inclusive year range `[lo, hi]`.
    pub fn filter_years(&self, lo: i32, hi: i32) -> YearTable {
        let keep: Vec<usize> = self
            .years
            .iter()
            .enumerate()
            .filter(|(_, y)| (lo..=hi).contains(*y))
            .map(|(i, _)| i)
            .collect();

        YearTable {
            years: keep.iter().map(|&i| self.years[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| {
                    (name.clone(), keep.iter().map(|&i| values[i]).collect())
                })
                .collect(),
        }
    }

    /// Returns a copy with every column independently rescaled so its own
    /// minimum maps to 0 and maximum to 1. Constant columns map to 0.
    pub fn min_max_normalized(&self) -> YearTable {
        let columns = self
            .columns
            .iter()
            .map(|(name, values)| {
                let present: Vec<f64> = values.iter().filter_map(|v| *v).collect();
                let scaled = match stats::min_max(&present) {
                    Some((lo, hi)) if hi > lo => values
                        .iter()
                        .map(|v| v.map(|x| (x - lo) / (hi - lo)))
                        .collect(),
                    Some((lo, _)) => values.iter().map(|v| v.map(|x| x - lo)).collect(),
                    None => values.clone(),
                };
                (name.clone(), scaled)
            })
            .collect();

        YearTable {
            years: self.years.clone(),
            columns,
        }
    }

    /// Pairwise Pearson correlation matrix over all columns, computed on
    /// pairwise-complete rows (rows where both columns are present).
    pub fn correlation_matrix(&self) -> Vec<Vec<f64>> {
        let n = self.columns.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                let mut xs = Vec::new();
                let mut ys = Vec::new();
                for row in 0..self.years.len() {
                    if let (Some(x), Some(y)) = (self.columns[i].1[row], self.columns[j].1[row]) {
                        xs.push(x);
                        ys.push(y);
                    }
                }
                matrix[i][j] = if i == j { 1.0 } else { stats::pearson(&xs, &ys) };
            }
        }

        matrix
    }

    /// Rows where every column has a value: `(years, row-major values)`.
    pub fn rows_complete(&self) -> (Vec<i32>, Vec<Vec<f64>>) {
        let mut years = Vec::new();
        let mut rows = Vec::new();

        'rows: for (i, &year) in self.years.iter().enumerate() {
            let mut row = Vec::with_capacity(self.columns.len());
            for (_, values) in &self.columns {
                match values[i] {
                    Some(v) => row.push(v),
                    None => continue 'rows,
                }
            }
            years.push(year);
            rows.push(row);
        }

        (years, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> YearTable {
        let mut table = YearTable::new(vec![2000, 2001, 2002, 2003]);
        table
            .push_column("a", vec![Some(0.0), Some(10.0), Some(20.0), None])
            .unwrap();
        table
            .push_column("b", vec![Some(5.0), None, Some(15.0), Some(25.0)])
            .unwrap();
        table
    }

    #[test]
    fn test_push_column_length_mismatch() {
        let mut table = YearTable::new(vec![2000, 2001]);
        assert!(table.push_column("short", vec![Some(1.0)]).is_err());
    }

    #[test]
    fn test_filter_years_inclusive() {
        let filtered = sample_table().filter_years(2001, 2002);
        assert_eq!(filtered.years(), &[2001, 2002]);
        assert_eq!(filtered.column("a").unwrap(), &[Some(10.0), Some(20.0)]);
    }

    #[test]
    fn test_min_max_normalized_per_column() {
        let normalized = sample_table().min_max_normalized();
        assert_eq!(
            normalized.column("a").unwrap(),
            &[Some(0.0), Some(0.5), Some(1.0), None]
        );
        assert_eq!(
            normalized.column("b").unwrap(),
            &[Some(0.0), None, Some(0.5), Some(1.0)]
        );
    }

    #[test]
    fn test_min_max_normalized_constant_column() {
        let mut table = YearTable::new(vec![2000, 2001]);
        table
            .push_column("flat", vec![Some(7.0), Some(7.0)])
            .unwrap();

        let normalized = table.min_max_normalized();
        assert_eq!(normalized.column("flat").unwrap(), &[Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_rows_complete_skips_missing() {
        let (years, rows) = sample_table().rows_complete();
        assert_eq!(years, vec![2000, 2002]);
        assert_eq!(rows, vec![vec![0.0, 5.0], vec![20.0, 15.0]]);
    }

    #[test]
    fn test_correlation_matrix_diagonal() {
        let matrix = sample_table().correlation_matrix();
        assert_eq!(matrix[0][0], 1.0);
        assert_eq!(matrix[1][1], 1.0);
        // a and b move together on their complete rows
        assert!((matrix[0][1] - 1.0).abs() < 1e-12);
    }
}
