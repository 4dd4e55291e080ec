//! Isolation forest detector.
//!
//! An ensemble of random partitioning trees is grown on subsamples of the
//! joint feature matrix. Rows that are isolated in few splits get low scores.
//! Scores follow the `score_samples` convention: `-(2^(-E[h(x)] / c(ψ)))`,
//! so they lie in `[-1, 0)` and lower means more anomalous.
//!
//! For a contamination rate `c` exactly `round(c · n)` rows with the lowest
//! scores are flagged; equal scores are broken by row position.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::selection::{select_max_separation, Selection};
use super::sweep::{CandidateFailure, ScoreOrientation, Sweep, SweepResult};
use super::{Detector, Method};
use crate::core::{FeatureTable, FlagVector};
use crate::error::{OutlierError, Result};
use crate::utils::stats::{average_path_length, mean};

/// Fewest rows an isolation forest is grown on.
pub const MIN_ROWS: usize = 10;

/// Configuration for the isolation forest detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    /// Contamination candidates to sweep, each in (0, 0.5).
    pub contaminations: Vec<f64>,
    /// Number of trees, at least 1.
    pub n_estimators: usize,
    /// Subsample size per tree, at least 2 (capped at the row count).
    pub max_samples: usize,
    /// Seed of the random generator.
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            contaminations: vec![0.05, 0.10, 0.15],
            n_estimators: 100,
            max_samples: 256,
            seed: 42,
        }
    }
}

impl IsolationForestConfig {
    /// Set the contamination candidates.
    pub fn contaminations(mut self, contaminations: Vec<f64>) -> Self {
        self.contaminations = contaminations;
        self
    }

    /// Set the number of trees.
    pub fn n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set the subsample size.
    pub fn max_samples(mut self, n: usize) -> Self {
        self.max_samples = n;
        self
    }

    /// Set random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Diagnostics attached to each isolation forest sweep result.
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationDetail {
    /// Mean score of flagged rows.
    pub outlier_mean: f64,
    /// Mean score of unflagged rows.
    pub inlier_mean: f64,
    /// Lowest score in the table.
    pub min_score: f64,
    /// Highest score in the table.
    pub max_score: f64,
    /// Score of the last flagged row; rows at or below it are outliers.
    pub score_threshold: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl Node {
    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split {
                feature,
                value,
                left,
                right,
            } => {
                if row[*feature] <= *value {
                    left.path_length(row, depth + 1)
                } else {
                    right.path_length(row, depth + 1)
                }
            }
        }
    }
}

/// A fitted isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Grow the ensemble on row-major data.
    ///
    /// Tree `t` draws from its own generator seeded with `seed + t`, so the
    /// forest does not depend on how trees are scheduled across threads.
    pub fn fit(rows: &[Vec<f64>], config: &IsolationForestConfig) -> Result<Self> {
        if config.n_estimators == 0 {
            return Err(OutlierError::Config {
                field: "isolation.n_estimators".to_string(),
                message: "at least one tree is required".to_string(),
            });
        }
        if config.max_samples < 2 {
            return Err(OutlierError::Config {
                field: "isolation.max_samples".to_string(),
                message: format!("must be at least 2, got {}", config.max_samples),
            });
        }

        let n = rows.len();
        if n < MIN_ROWS {
            return Err(OutlierError::InsufficientData {
                needed: MIN_ROWS,
                got: n,
            });
        }
        if rows.iter().all(|r| r == &rows[0]) {
            return Err(OutlierError::DegenerateInput(
                "all rows are identical; nothing can be isolated".to_string(),
            ));
        }

        let all: Vec<usize> = (0..n).collect();
        for j in 0..rows[0].len() {
            let (lo, hi) = spread(rows, &all, j);
            if !(hi - lo).is_finite() {
                return Err(OutlierError::NumericOverflow {
                    feature: format!("column {j}"),
                    reason: format!("range [{lo:e}, {hi:e}] cannot be split"),
                });
            }
        }

        let sample_size = config.max_samples.min(n);
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..config.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                grow(rows, sample, 0, height_limit, &mut rng)
            })
            .collect();

        debug!(
            trees = config.n_estimators,
            sample_size, height_limit, "isolation forest grown"
        );

        Ok(Self { trees, sample_size })
    }

    /// Anomaly score per row; lower is more anomalous.
    pub fn score_samples(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let normaliser = average_path_length(self.sample_size);
        rows.par_iter()
            .map(|row| {
                let total: f64 = self.trees.iter().map(|t| t.path_length(row, 0)).sum();
                let expected = total / self.trees.len() as f64;
                -(2f64.powf(-expected / normaliser))
            })
            .collect()
    }
}

fn grow(
    rows: &[Vec<f64>],
    sample: Vec<usize>,
    depth: usize,
    height_limit: usize,
    rng: &mut StdRng,
) -> Node {
    if depth >= height_limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let n_features = rows[sample[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|j| {
            let (lo, hi) = spread(rows, &sample, j);
            (hi > lo && (hi - lo).is_finite()).then_some((j, lo, hi))
        })
        .collect();

    if splittable.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    // value < hi, so both sides keep at least one row
    let value = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        sample.into_iter().partition(|&i| rows[i][feature] <= value);

    Node::Split {
        feature,
        value,
        left: Box::new(grow(rows, left, depth + 1, height_limit, rng)),
        right: Box::new(grow(rows, right, depth + 1, height_limit, rng)),
    }
}

/// Minimum and maximum of feature `j` over the given rows.
fn spread(rows: &[Vec<f64>], sample: &[usize], j: usize) -> (f64, f64) {
    sample
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(rows[i][j]), hi.max(rows[i][j]))
        })
}

fn validate_contamination(contamination: f64) -> Result<()> {
    if !(contamination > 0.0 && contamination < 0.5) {
        return Err(OutlierError::ParameterOutOfRange {
            parameter: "contamination",
            value: contamination,
            reason: "must lie strictly within (0, 0.5)".to_string(),
        });
    }
    Ok(())
}

/// Flag the `round(c · n)` lowest-scoring rows.
fn flag_lowest(
    table: &FeatureTable,
    scores: &[f64],
    contamination: f64,
) -> Result<SweepResult<f64, IsolationDetail>> {
    validate_contamination(contamination)?;

    let n = scores.len();
    let n_outliers = ((contamination * n as f64).round() as usize).min(n);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

    let mut flags = vec![false; n];
    for &i in &order[..n_outliers] {
        flags[i] = true;
    }

    let outlier_scores: Vec<f64> = order[..n_outliers].iter().map(|&i| scores[i]).collect();
    let inlier_scores: Vec<f64> = order[n_outliers..].iter().map(|&i| scores[i]).collect();
    let detail = IsolationDetail {
        outlier_mean: mean(&outlier_scores),
        inlier_mean: mean(&inlier_scores),
        min_score: scores.iter().copied().fold(f64::INFINITY, f64::min),
        max_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        score_threshold: outlier_scores.last().copied().unwrap_or(f64::NEG_INFINITY),
    };

    Ok(SweepResult::new(
        contamination,
        FlagVector::for_table(table, flags)?,
        scores.to_vec(),
        ScoreOrientation::LowerIsAnomalous,
        detail,
    ))
}

/// Isolation forest detector sweeping the contamination rate.
#[derive(Debug, Clone, Default)]
pub struct IsolationForestDetector {
    config: IsolationForestConfig,
}

impl IsolationForestDetector {
    pub fn new(config: IsolationForestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IsolationForestConfig {
        &self.config
    }

    /// Fit the forest on the table and score every row.
    pub fn score(&self, table: &FeatureTable) -> Result<Vec<f64>> {
        let rows = table.to_rows();
        let forest = IsolationForest::fit(&rows, &self.config)?;
        Ok(forest.score_samples(&rows))
    }
}

impl Detector for IsolationForestDetector {
    type Param = f64;
    type Detail = IsolationDetail;

    fn method(&self) -> Method {
        Method::IsolationForest
    }

    fn candidates(&self) -> &[f64] {
        &self.config.contaminations
    }

    fn evaluate(
        &self,
        table: &FeatureTable,
        contamination: f64,
    ) -> Result<SweepResult<f64, IsolationDetail>> {
        validate_contamination(contamination)?;
        let scores = self.score(table)?;
        flag_lowest(table, &scores, contamination)
    }

    fn sweep(
        &self,
        table: &FeatureTable,
        candidates: &[f64],
    ) -> Result<Sweep<f64, IsolationDetail>> {
        // Contamination only moves the cut; the same seeded forest serves
        // every candidate.
        let scores = self.score(table)?;
        let mut sweep = Sweep::new(Method::IsolationForest);
        for &contamination in candidates {
            match flag_lowest(table, &scores, contamination) {
                Ok(result) => sweep.results.push(result),
                Err(error) if error.is_candidate_local() => {
                    tracing::warn!(contamination, %error, "isolation forest candidate skipped");
                    sweep.failures.push(CandidateFailure {
                        parameter: contamination,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(sweep)
    }

    fn select(&self, sweep: &Sweep<f64, IsolationDetail>) -> Result<Selection<f64>> {
        select_max_separation(&sweep.results).ok_or_else(|| OutlierError::NoViableCandidate {
            method: Method::IsolationForest.name().to_string(),
        })
    }
}
