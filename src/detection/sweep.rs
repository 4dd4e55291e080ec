//! Typed results of a parameter sweep.

use crate::core::{percentage, FlagVector, ScoreVector};
use crate::error::OutlierError;
use crate::utils::stats::mean;

use super::Method;

/// Which end of a detector's score scale is anomalous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrientation {
    /// Larger scores are more anomalous (|z|, LOF).
    HigherIsAnomalous,
    /// Smaller scores are more anomalous (isolation forest `score_samples`).
    LowerIsAnomalous,
}

/// Outcome of one detector at one candidate parameter value.
#[derive(Debug, Clone)]
pub struct SweepResult<P, D> {
    /// The swept parameter value.
    pub parameter: P,
    /// Per-row outlier flags.
    pub flags: FlagVector,
    /// Per-row anomaly scores.
    pub scores: ScoreVector,
    /// Number of flagged rows.
    pub outlier_count: usize,
    /// Flagged rows as a percentage of the table.
    pub outlier_percentage: f64,
    /// Gap between the flagged and unflagged score means, oriented so that
    /// larger is always better.
    pub separation: f64,
    /// Detector-specific diagnostics.
    pub detail: D,
}

impl<P, D> SweepResult<P, D> {
    /// Build a result, deriving the summary statistics from flags and scores.
    pub fn new(
        parameter: P,
        flags: FlagVector,
        scores: ScoreVector,
        orientation: ScoreOrientation,
        detail: D,
    ) -> Self {
        let outlier_count = flags.count();
        let outlier_percentage = percentage(outlier_count, flags.len());
        let separation = score_separation(&scores, flags.as_slice(), orientation);
        Self {
            parameter,
            flags,
            scores,
            outlier_count,
            outlier_percentage,
            separation,
            detail,
        }
    }
}

/// A candidate that could not be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFailure<P> {
    pub parameter: P,
    pub error: OutlierError,
}

/// All results of one detector's sweep, in candidate order.
#[derive(Debug, Clone)]
pub struct Sweep<P, D> {
    pub method: Method,
    pub results: Vec<SweepResult<P, D>>,
    pub failures: Vec<CandidateFailure<P>>,
}

impl<P: PartialEq + Copy, D> Sweep<P, D> {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Result for a given parameter value, if it was evaluated successfully.
    pub fn get(&self, parameter: P) -> Option<&SweepResult<P, D>> {
        self.results.iter().find(|r| r.parameter == parameter)
    }

    /// Position of a parameter value among the successful results.
    pub fn position(&self, parameter: P) -> Option<usize> {
        self.results.iter().position(|r| r.parameter == parameter)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Mean score gap between flagged and unflagged rows.
///
/// Returns 0.0 when either group is empty.
pub fn score_separation(scores: &[f64], flags: &[bool], orientation: ScoreOrientation) -> f64 {
    let (outliers, inliers): (Vec<(f64, bool)>, Vec<(f64, bool)>) = scores
        .iter()
        .copied()
        .zip(flags.iter().copied())
        .partition(|&(_, flagged)| flagged);

    if outliers.is_empty() || inliers.is_empty() {
        return 0.0;
    }

    let outlier_mean = mean(&outliers.iter().map(|(s, _)| *s).collect::<Vec<_>>());
    let inlier_mean = mean(&inliers.iter().map(|(s, _)| *s).collect::<Vec<_>>());

    match orientation {
        ScoreOrientation::HigherIsAnomalous => outlier_mean - inlier_mean,
        ScoreOrientation::LowerIsAnomalous => inlier_mean - outlier_mean,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn separation_respects_orientation() {
        let scores = [-0.7, -0.4, -0.4, -0.4];
        let flags = [true, false, false, false];
        assert_relative_eq!(
            score_separation(&scores, &flags, ScoreOrientation::LowerIsAnomalous),
            0.3,
            epsilon = 1e-12
        );

        let scores = [9.0, 1.0, 1.0];
        let flags = [true, false, false];
        assert_relative_eq!(
            score_separation(&scores, &flags, ScoreOrientation::HigherIsAnomalous),
            8.0
        );
    }

    #[test]
    fn separation_of_one_sided_split_is_zero() {
        let scores = [1.0, 2.0];
        assert_eq!(
            score_separation(&scores, &[false, false], ScoreOrientation::HigherIsAnomalous),
            0.0
        );
        assert_eq!(
            score_separation(&scores, &[true, true], ScoreOrientation::LowerIsAnomalous),
            0.0
        );
    }

    #[test]
    fn result_derives_summary() {
        let flags = FlagVector::from_bools(vec![true, false, false, false]);
        let result = SweepResult::new(
            3.0,
            flags,
            vec![4.0, 0.5, 0.2, 0.3],
            ScoreOrientation::HigherIsAnomalous,
            (),
        );
        assert_eq!(result.outlier_count, 1);
        assert_relative_eq!(result.outlier_percentage, 25.0);
        assert!(result.separation > 3.0);
    }
}
