//! Row-aligned detector outputs.

use super::FeatureTable;
use crate::error::{OutlierError, Result};

/// One anomaly score per row. The sign convention belongs to the detector.
pub type ScoreVector = Vec<f64>;

/// One boolean per row, aligned by position with the table it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagVector {
    index: Vec<usize>,
    flags: Vec<bool>,
}

impl FlagVector {
    /// Pair flags with the row index they describe.
    pub fn new(index: Vec<usize>, flags: Vec<bool>) -> Result<Self> {
        if index.len() != flags.len() {
            return Err(OutlierError::AlignmentMismatch {
                method: "row index".to_string(),
                expected: index.len(),
                got: flags.len(),
            });
        }
        Ok(Self { index, flags })
    }

    /// Flags for a table, taking over its row index.
    pub fn for_table(table: &FeatureTable, flags: Vec<bool>) -> Result<Self> {
        Self::new(table.index().to_vec(), flags)
    }

    /// Flags with a positional index `0..n`.
    pub fn from_bools(flags: Vec<bool>) -> Self {
        Self {
            index: (0..flags.len()).collect(),
            flags,
        }
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.flags
    }

    pub fn get(&self, position: usize) -> Option<bool> {
        self.flags.get(position).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.flags.iter().copied()
    }

    /// Number of flagged rows.
    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&f| f).count()
    }

    /// Flagged rows as a percentage of all rows.
    pub fn percentage(&self) -> f64 {
        percentage(self.count(), self.len())
    }

    /// Positions of flagged rows.
    pub fn outlier_positions(&self) -> Vec<usize> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .map(|(i, _)| i)
            .collect()
    }
}

/// `100 * count / total`, zero for an empty total.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * count as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn counts_and_percentages() {
        let flags = FlagVector::from_bools(vec![true, false, false, true]);
        assert_eq!(flags.len(), 4);
        assert_eq!(flags.count(), 2);
        assert_relative_eq!(flags.percentage(), 50.0);
        assert_eq!(flags.outlier_positions(), vec![0, 3]);
    }

    #[test]
    fn mismatched_index_rejected() {
        let err = FlagVector::new(vec![0, 1], vec![true]).unwrap_err();
        assert!(matches!(err, OutlierError::AlignmentMismatch { .. }));
    }

    #[test]
    fn empty_percentage_is_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert!(FlagVector::from_bools(vec![]).is_empty());
    }
}
