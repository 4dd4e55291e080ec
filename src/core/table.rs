//! FeatureTable: the cleaned numeric table every detector consumes.

use crate::error::{OutlierError, Result};

/// A rectangular numeric table with named features.
///
/// Values are stored column-major (`columns[feature][row]`). Every row carries
/// its original position in `index`, which outputs keep for traceability.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: Vec<usize>,
}

/// Builder for constructing a FeatureTable column by column.
#[derive(Debug, Clone, Default)]
pub struct FeatureTableBuilder {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    index: Option<Vec<usize>>,
}

impl FeatureTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named feature column.
    pub fn column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.names.push(name.into());
        self.columns.push(values);
        self
    }

    /// Override the row index (defaults to `0..n`).
    pub fn index(mut self, index: Vec<usize>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn build(self) -> Result<FeatureTable> {
        let table = FeatureTable::new(self.names, self.columns)?;
        match self.index {
            Some(index) => table.with_index(index),
            None => Ok(table),
        }
    }
}

impl FeatureTable {
    /// Create a table from named columns.
    ///
    /// Fails on an empty table, ragged columns, duplicate names, any
    /// non-finite value, or a column whose spread overflows `f64`.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.is_empty() || columns.is_empty() {
            return Err(OutlierError::EmptyData);
        }
        if names.len() != columns.len() {
            return Err(OutlierError::RaggedTable {
                feature: "<names>".to_string(),
                expected: columns.len(),
                got: names.len(),
            });
        }

        let n_rows = columns[0].len();
        if n_rows == 0 {
            return Err(OutlierError::EmptyData);
        }

        for (j, (name, column)) in names.iter().zip(&columns).enumerate() {
            if names[..j].contains(name) {
                return Err(OutlierError::DuplicateFeature {
                    feature: name.clone(),
                });
            }
            if column.len() != n_rows {
                return Err(OutlierError::RaggedTable {
                    feature: name.clone(),
                    expected: n_rows,
                    got: column.len(),
                });
            }
            if let Some(row) = column.iter().position(|v| !v.is_finite()) {
                return Err(OutlierError::NonFinite {
                    row,
                    feature: name.clone(),
                });
            }
            let (lo, hi) = column
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if !(hi - lo).is_finite() {
                return Err(OutlierError::NumericOverflow {
                    feature: name.clone(),
                    reason: format!("range [{lo:e}, {hi:e}] is not representable"),
                });
            }
        }

        Ok(Self {
            names,
            columns,
            index: (0..n_rows).collect(),
        })
    }

    /// Create a table from row-major observations.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let n_features = names.len();
        let mut columns = vec![Vec::with_capacity(rows.len()); n_features];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(OutlierError::RaggedTable {
                    feature: format!("<row {i}>"),
                    expected: n_features,
                    got: row.len(),
                });
            }
            for (column, &value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self::new(names, columns)
    }

    /// Replace the row index. Its length must match the row count.
    pub fn with_index(mut self, index: Vec<usize>) -> Result<Self> {
        if index.len() != self.n_rows() {
            return Err(OutlierError::RaggedTable {
                feature: "<index>".to_string(),
                expected: self.n_rows(),
                got: index.len(),
            });
        }
        self.index = index;
        Ok(self)
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Original row positions, aligned with every column.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Column by feature name.
    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.position(name)
            .map(|j| self.columns[j].as_slice())
            .ok_or_else(|| OutlierError::MissingFeature {
                feature: name.to_string(),
            })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Iterate `(name, column)` pairs.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.names
            .iter()
            .zip(&self.columns)
            .map(|(n, c)| (n.as_str(), c.as_slice()))
    }

    /// Copy of a single observation across all features.
    pub fn row(&self, i: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[i]).collect()
    }

    /// Row-major copy of the whole table, the joint matrix the multivariate
    /// detectors work on.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows()).map(|i| self.row(i)).collect()
    }

    /// Restrict the table to the named features, in the given order.
    pub fn select<S: AsRef<str>>(&self, features: &[S]) -> Result<Self> {
        let mut names = Vec::with_capacity(features.len());
        let mut columns = Vec::with_capacity(features.len());
        for feature in features {
            let feature = feature.as_ref();
            let column = self.column(feature)?;
            names.push(feature.to_string());
            columns.push(column.to_vec());
        }
        Self::new(names, columns)?.with_index(self.index.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureTable {
        FeatureTableBuilder::new()
            .column("Voltage", vec![240.0, 241.0, 239.5])
            .column("Global_intensity", vec![4.6, 5.0, 4.8])
            .build()
            .unwrap()
    }

    #[test]
    fn builder_assigns_positional_index() {
        let table = sample();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.n_features(), 2);
        assert_eq!(table.index(), &[0, 1, 2]);
        assert_eq!(table.row(1), vec![241.0, 5.0]);
    }

    #[test]
    fn from_rows_matches_columns() {
        let rows = vec![vec![1.0, 10.0], vec![2.0, 20.0]];
        let table = FeatureTable::from_rows(vec!["a".into(), "b".into()], &rows).unwrap();
        assert_eq!(table.column("b").unwrap(), &[10.0, 20.0]);
        assert_eq!(table.to_rows(), rows);
    }

    #[test]
    fn missing_feature_is_reported_by_name() {
        let err = sample().column("Sub_metering_9").unwrap_err();
        assert_eq!(
            err,
            OutlierError::MissingFeature {
                feature: "Sub_metering_9".to_string()
            }
        );
    }

    #[test]
    fn ragged_columns_rejected() {
        let err = FeatureTableBuilder::new()
            .column("a", vec![1.0, 2.0])
            .column("b", vec![1.0])
            .build()
            .unwrap_err();
        assert!(matches!(err, OutlierError::RaggedTable { .. }));
    }

    #[test]
    fn non_finite_values_rejected_with_position() {
        let err = FeatureTableBuilder::new()
            .column("a", vec![1.0, f64::NAN])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            OutlierError::NonFinite {
                row: 1,
                feature: "a".to_string()
            }
        );
    }

    #[test]
    fn empty_table_rejected() {
        assert_eq!(
            FeatureTableBuilder::new().build().unwrap_err(),
            OutlierError::EmptyData
        );
        assert_eq!(
            FeatureTableBuilder::new().column("a", vec![]).build().unwrap_err(),
            OutlierError::EmptyData
        );
    }

    #[test]
    fn select_keeps_index_and_order() {
        let table = sample().with_index(vec![10, 11, 12]).unwrap();
        let selected = table.select(&["Global_intensity"]).unwrap();
        assert_eq!(selected.feature_names(), &["Global_intensity".to_string()]);
        assert_eq!(selected.index(), &[10, 11, 12]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = FeatureTableBuilder::new()
            .column("Voltage", vec![1.0])
            .column("Voltage", vec![2.0])
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            OutlierError::DuplicateFeature {
                feature: "Voltage".to_string()
            }
        );
    }

    #[test]
    fn overflowing_spread_rejected() {
        let mut values = vec![0.0; 50];
        values[0] = -1e308;
        values[1] = 1e308;
        let err = FeatureTableBuilder::new()
            .column("a", values)
            .build()
            .unwrap_err();
        assert!(matches!(err, OutlierError::NumericOverflow { ref feature, .. } if feature == "a"));

        // wide but representable
        assert!(FeatureTableBuilder::new()
            .column("a", vec![-1e307, 1e307])
            .build()
            .is_ok());
    }
}
