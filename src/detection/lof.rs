//! Local outlier factor.
//!
//! The local reachability density of a row is the inverse of its mean
//! reachability distance to its `k` nearest neighbours. The LOF of a row is
//! the mean density of its neighbours divided by its own density: values
//! near 1 sit inside a cluster, values well above 1 sit in sparser space
//! than their neighbours. A row is flagged when its LOF exceeds a fixed
//! cutoff.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::selection::{select_in_band, AcceptanceBand, BandPosition, Selection};
use super::sweep::{CandidateFailure, ScoreOrientation, Sweep, SweepResult};
use super::{Detector, Method};
use crate::core::{FeatureTable, FlagVector};
use crate::error::{OutlierError, Result};
use crate::utils::stats::{euclidean_distance, mean};

/// Floor on the mean reachability distance, so duplicate rows keep a finite density.
pub const MIN_REACH_DISTANCE: f64 = 1e-10;

/// LOF above which a row counts as a strong outlier in diagnostics.
pub const STRONG_OUTLIER_LOF: f64 = 1.5;

/// Configuration for the LOF detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LofConfig {
    /// Neighbour counts to sweep.
    pub neighbor_counts: Vec<usize>,
    /// Rows with LOF strictly above this value are flagged.
    pub cutoff: f64,
    /// Acceptable flagged percentage.
    pub band: AcceptanceBand,
    /// Neighbour count kept when the band does not decide.
    pub default_neighbors: usize,
}

impl Default for LofConfig {
    fn default() -> Self {
        Self {
            neighbor_counts: vec![10, 20, 50],
            cutoff: 1.5,
            band: AcceptanceBand::new(1.0, 5.0),
            default_neighbors: 20,
        }
    }
}

impl LofConfig {
    pub fn neighbor_counts(mut self, counts: Vec<usize>) -> Self {
        self.neighbor_counts = counts;
        self
    }

    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn band(mut self, min_pct: f64, max_pct: f64) -> Self {
        self.band = AcceptanceBand::new(min_pct, max_pct);
        self
    }

    pub fn default_neighbors(mut self, k: usize) -> Self {
        self.default_neighbors = k;
        self
    }
}

/// Diagnostics attached to each LOF sweep result.
#[derive(Debug, Clone, PartialEq)]
pub struct LofDetail {
    /// Mean LOF over flagged rows (NaN when nothing is flagged).
    pub outlier_mean: f64,
    /// Flagged rows whose LOF exceeds 1.5.
    pub strong_outliers: usize,
    pub min_lof: f64,
    pub max_lof: f64,
    /// Position of the flagged share relative to the acceptance band.
    pub assessment: BandPosition,
}

/// Nearest neighbours of every row, sorted by distance then row position.
#[derive(Debug, Clone)]
pub struct Neighborhoods {
    neighbors: Vec<Vec<(usize, f64)>>,
}

impl Neighborhoods {
    /// Compute the `k` nearest other rows of every row.
    pub fn compute(rows: &[Vec<f64>], k: usize) -> Self {
        let neighbors = (0..rows.len())
            .into_par_iter()
            .map(|i| {
                let mut dists: Vec<(usize, f64)> = rows
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(j, other)| (j, euclidean_distance(&rows[i], other)))
                    .collect();
                // (distance, position) is a total order, so partitioning
                // first and sorting the k survivors equals a full sort.
                let by_distance =
                    |a: &(usize, f64), b: &(usize, f64)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
                if k > 0 && k < dists.len() {
                    dists.select_nth_unstable_by(k - 1, by_distance);
                }
                dists.truncate(k);
                dists.sort_by(by_distance);
                dists
            })
            .collect();
        Self { neighbors }
    }

    /// LOF of every row using the first `k` neighbours.
    pub fn lof(&self, k: usize) -> Vec<f64> {
        let knn = |i: usize| &self.neighbors[i][..k];
        let k_distance: Vec<f64> = (0..self.neighbors.len())
            .map(|i| knn(i).last().map_or(0.0, |&(_, d)| d))
            .collect();

        let lrd: Vec<f64> = (0..self.neighbors.len())
            .map(|i| {
                let reach: Vec<f64> = knn(i)
                    .iter()
                    .map(|&(j, d)| k_distance[j].max(d))
                    .collect();
                1.0 / mean(&reach).max(MIN_REACH_DISTANCE)
            })
            .collect();

        (0..self.neighbors.len())
            .map(|i| {
                let neighbour_lrd: Vec<f64> = knn(i).iter().map(|&(j, _)| lrd[j]).collect();
                mean(&neighbour_lrd) / lrd[i]
            })
            .collect()
    }
}

/// Local outlier factor detector sweeping the neighbour count.
#[derive(Debug, Clone, Default)]
pub struct LofDetector {
    config: LofConfig,
}

impl LofDetector {
    pub fn new(config: LofConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LofConfig {
        &self.config
    }

    fn check_rows(table: &FeatureTable) -> Result<()> {
        if table.n_rows() < 2 {
            return Err(OutlierError::InsufficientData {
                needed: 2,
                got: table.n_rows(),
            });
        }
        Ok(())
    }

    fn flag(
        &self,
        table: &FeatureTable,
        neighborhoods: &Neighborhoods,
        k: usize,
    ) -> Result<SweepResult<usize, LofDetail>> {
        validate_neighbors(k, table.n_rows())?;

        let lof = neighborhoods.lof(k);
        if let Some(row) = lof.iter().position(|v| !v.is_finite()) {
            return Err(OutlierError::NumericOverflow {
                feature: "euclidean distance".to_string(),
                reason: format!("LOF of row {row} is {} at k = {k}", lof[row]),
            });
        }
        let flags: Vec<bool> = lof.iter().map(|&v| v > self.config.cutoff).collect();

        let flagged: Vec<f64> = lof
            .iter()
            .zip(&flags)
            .filter(|&(_, &f)| f)
            .map(|(&v, _)| v)
            .collect();

        let detail = LofDetail {
            outlier_mean: mean(&flagged),
            strong_outliers: flagged.iter().filter(|&&v| v > STRONG_OUTLIER_LOF).count(),
            min_lof: lof.iter().copied().fold(f64::INFINITY, f64::min),
            max_lof: lof.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            assessment: BandPosition::Within,
        };

        let mut result = SweepResult::new(
            k,
            FlagVector::for_table(table, flags)?,
            lof,
            ScoreOrientation::HigherIsAnomalous,
            detail,
        );
        result.detail.assessment = self.config.band.position(result.outlier_percentage);
        Ok(result)
    }
}

fn validate_neighbors(k: usize, n_rows: usize) -> Result<()> {
    if k == 0 || k >= n_rows {
        return Err(OutlierError::ParameterOutOfRange {
            parameter: "n_neighbors",
            value: k as f64,
            reason: format!("must lie within 1..{n_rows} (row count)"),
        });
    }
    Ok(())
}

impl Detector for LofDetector {
    type Param = usize;
    type Detail = LofDetail;

    fn method(&self) -> Method {
        Method::Lof
    }

    fn candidates(&self) -> &[usize] {
        &self.config.neighbor_counts
    }

    fn evaluate(&self, table: &FeatureTable, k: usize) -> Result<SweepResult<usize, LofDetail>> {
        Self::check_rows(table)?;
        validate_neighbors(k, table.n_rows())?;
        let neighborhoods = Neighborhoods::compute(&table.to_rows(), k);
        self.flag(table, &neighborhoods, k)
    }

    fn sweep(&self, table: &FeatureTable, candidates: &[usize]) -> Result<Sweep<usize, LofDetail>> {
        Self::check_rows(table)?;

        // One neighbour search at the largest valid k serves every candidate.
        let max_k = candidates
            .iter()
            .copied()
            .filter(|&k| validate_neighbors(k, table.n_rows()).is_ok())
            .max()
            .unwrap_or(0);
        let neighborhoods = Neighborhoods::compute(&table.to_rows(), max_k);
        debug!(max_k, rows = table.n_rows(), "lof neighbourhoods computed");

        let mut sweep = Sweep::new(Method::Lof);
        for &k in candidates {
            match self.flag(table, &neighborhoods, k) {
                Ok(result) => sweep.results.push(result),
                Err(error) if error.is_candidate_local() => {
                    warn!(k, %error, "lof candidate skipped");
                    sweep.failures.push(CandidateFailure {
                        parameter: k,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(sweep)
    }

    fn select(&self, sweep: &Sweep<usize, LofDetail>) -> Result<Selection<usize>> {
        select_in_band(&sweep.results, self.config.band, self.config.default_neighbors)
            .ok_or_else(|| OutlierError::NoViableCandidate {
                method: Method::Lof.name().to_string(),
            })
    }
}
