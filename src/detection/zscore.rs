//! Univariate dispersion (z-score) detector.
//!
//! Each feature is standardized with its own mean and sample standard
//! deviation (Bessel-corrected, n-1). A row is flagged when any feature has
//! `|z| > threshold`; its score is the largest `|z|` across features.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::selection::{select_in_band, AcceptanceBand, BandPosition, Selection};
use super::sweep::{CandidateFailure, ScoreOrientation, Sweep, SweepResult};
use super::{Detector, Method};
use crate::core::{percentage, FeatureTable, FlagVector};
use crate::error::{OutlierError, Result};
use crate::utils::stats::{mean, normal_tail_percentage, std_dev};

/// Standard deviations below this are treated as zero variance.
const MIN_STD_DEV: f64 = 1e-10;

/// Configuration for the z-score detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZScoreConfig {
    /// Threshold candidates to sweep.
    pub thresholds: Vec<f64>,
    /// Acceptable share of flagged rows, in percent.
    pub band: AcceptanceBand,
    /// Canonical operating point.
    pub default_threshold: f64,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![2.5, 3.0, 3.5],
            band: AcceptanceBand::new(0.3, 2.0),
            default_threshold: 3.0,
        }
    }
}

impl ZScoreConfig {
    /// Set the threshold candidates.
    pub fn thresholds(mut self, thresholds: Vec<f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the acceptance band.
    pub fn band(mut self, min_pct: f64, max_pct: f64) -> Self {
        self.band = AcceptanceBand::new(min_pct, max_pct);
        self
    }

    /// Set the default threshold.
    pub fn default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = threshold;
        self
    }
}

/// Per-feature flags at one threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFlags {
    pub feature: String,
    pub flags: Vec<bool>,
    pub count: usize,
    pub percentage: f64,
}

/// Diagnostics attached to each z-score sweep result.
#[derive(Debug, Clone, PartialEq)]
pub struct DispersionDetail {
    /// Flags per used feature.
    pub per_feature: Vec<FeatureFlags>,
    /// Features dropped for zero variance.
    pub excluded: Vec<String>,
    /// Share of rows a normal distribution would put beyond the threshold.
    pub expected_normal_pct: f64,
    /// Position of the flagged share relative to the acceptance band.
    pub assessment: BandPosition,
}

impl DispersionDetail {
    /// One `DegenerateFeature` warning per excluded feature.
    pub fn warnings(&self) -> Vec<OutlierError> {
        self.excluded
            .iter()
            .map(|feature| OutlierError::DegenerateFeature {
                feature: feature.clone(),
            })
            .collect()
    }
}

/// Standardized features of one table.
#[derive(Debug, Clone)]
pub struct Standardized {
    index: Vec<usize>,
    features: Vec<(String, Vec<f64>)>,
    excluded: Vec<String>,
}

impl Standardized {
    /// Names of the features that survived standardization.
    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|(n, _)| n.as_str())
    }

    /// z-scores of one feature.
    pub fn z_scores(&self, feature: &str) -> Option<&[f64]> {
        self.features
            .iter()
            .find(|(n, _)| n == feature)
            .map(|(_, z)| z.as_slice())
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }
}

/// Z-score detector.
#[derive(Debug, Clone, Default)]
pub struct ZScoreDetector {
    config: ZScoreConfig,
}

impl ZScoreDetector {
    pub fn new(config: ZScoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ZScoreConfig {
        &self.config
    }

    /// Compute z-scores for every feature.
    ///
    /// Zero-variance features are excluded with a warning. Fails if no
    /// feature is left, or if a feature's moments overflow `f64`.
    pub fn standardize(&self, table: &FeatureTable) -> Result<Standardized> {
        let n = table.n_rows();
        if n < 2 {
            return Err(OutlierError::InsufficientData { needed: 2, got: n });
        }

        let mut features = Vec::with_capacity(table.n_features());
        let mut excluded = Vec::new();

        for (name, column) in table.columns() {
            let m = mean(column);
            let sd = std_dev(column);
            if !m.is_finite() || !sd.is_finite() {
                return Err(OutlierError::NumericOverflow {
                    feature: name.to_string(),
                    reason: format!("mean {m:e} or standard deviation {sd:e} is not finite"),
                });
            }
            if sd < MIN_STD_DEV {
                let warning = OutlierError::DegenerateFeature {
                    feature: name.to_string(),
                };
                warn!(%warning, "feature excluded from z-score flagging");
                excluded.push(name.to_string());
                continue;
            }
            let z = column.iter().map(|x| (x - m) / sd).collect();
            features.push((name.to_string(), z));
        }

        if features.is_empty() {
            return Err(OutlierError::DegenerateInput(format!(
                "all {} features have zero variance",
                excluded.len()
            )));
        }

        Ok(Standardized {
            index: table.index().to_vec(),
            features,
            excluded,
        })
    }

    /// Flag standardized rows at one threshold.
    pub fn flag(
        &self,
        standardized: &Standardized,
        threshold: f64,
    ) -> Result<SweepResult<f64, DispersionDetail>> {
        validate_threshold(threshold)?;

        let n = standardized.index.len();
        let mut any = vec![false; n];
        let mut max_abs = vec![0.0_f64; n];
        let mut per_feature = Vec::with_capacity(standardized.features.len());

        for (name, z) in &standardized.features {
            let flags: Vec<bool> = z.iter().map(|v| v.abs() > threshold).collect();
            for (i, (&flag, &v)) in flags.iter().zip(z).enumerate() {
                any[i] |= flag;
                max_abs[i] = max_abs[i].max(v.abs());
            }
            let count = flags.iter().filter(|&&f| f).count();
            per_feature.push(FeatureFlags {
                feature: name.clone(),
                count,
                percentage: percentage(count, n),
                flags,
            });
        }

        let flags = FlagVector::new(standardized.index.clone(), any)?;
        let pct = flags.percentage();
        let detail = DispersionDetail {
            per_feature,
            excluded: standardized.excluded.clone(),
            expected_normal_pct: normal_tail_percentage(threshold),
            assessment: self.config.band.position(pct),
        };

        Ok(SweepResult::new(
            threshold,
            flags,
            max_abs,
            ScoreOrientation::HigherIsAnomalous,
            detail,
        ))
    }
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(OutlierError::ParameterOutOfRange {
            parameter: "threshold",
            value: threshold,
            reason: "must be a positive finite number".to_string(),
        });
    }
    Ok(())
}

impl Detector for ZScoreDetector {
    type Param = f64;
    type Detail = DispersionDetail;

    fn method(&self) -> Method {
        Method::ZScore
    }

    fn candidates(&self) -> &[f64] {
        &self.config.thresholds
    }

    fn evaluate(
        &self,
        table: &FeatureTable,
        threshold: f64,
    ) -> Result<SweepResult<f64, DispersionDetail>> {
        validate_threshold(threshold)?;
        let standardized = self.standardize(table)?;
        self.flag(&standardized, threshold)
    }

    fn sweep(
        &self,
        table: &FeatureTable,
        candidates: &[f64],
    ) -> Result<Sweep<f64, DispersionDetail>> {
        // Standardize once; only the threshold varies.
        let standardized = self.standardize(table)?;
        let mut sweep = Sweep::new(Method::ZScore);
        for &threshold in candidates {
            match self.flag(&standardized, threshold) {
                Ok(result) => sweep.results.push(result),
                Err(error) if error.is_candidate_local() => {
                    warn!(threshold, %error, "z-score candidate skipped");
                    sweep.failures.push(CandidateFailure {
                        parameter: threshold,
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(sweep)
    }

    fn select(&self, sweep: &Sweep<f64, DispersionDetail>) -> Result<Selection<f64>> {
        select_in_band(&sweep.results, self.config.band, self.config.default_threshold).ok_or_else(
            || OutlierError::NoViableCandidate {
                method: Method::ZScore.name().to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FeatureTableBuilder;
    use crate::detection::SelectionReason;
    use approx::assert_relative_eq;

    /// `n_pairs` pairs of ±1 followed by a single 0: mean 0, sample std 1.
    fn unit_column(n_pairs: usize) -> Vec<f64> {
        let mut values = Vec::with_capacity(2 * n_pairs + 1);
        for _ in 0..n_pairs {
            values.push(1.0);
            values.push(-1.0);
        }
        values.push(0.0);
        values
    }

    #[test]
    fn mean_row_never_flagged() {
        let table = FeatureTableBuilder::new()
            .column("x", unit_column(50))
            .build()
            .unwrap();
        let detector = ZScoreDetector::default();
        let standardized = detector.standardize(&table).unwrap();
        for t in [0.5, 2.5, 3.0, 3.5] {
            let result = detector.flag(&standardized, t).unwrap();
            assert_eq!(result.flags.get(100), Some(false));
        }
    }

    #[test]
    fn four_sigma_flagged_at_three_not_at_four_and_a_half() {
        // ±1 pairs plus one value v. With n rows its z-score is
        // v(1 - 1/n) / sqrt(1 + v²/n); solve for z = 4.
        let n_pairs = 500;
        let n = (2 * n_pairs + 1) as f64;
        let v = 4.0 / ((1.0 - 1.0 / n).powi(2) - 16.0 / n).sqrt();
        let mut values = unit_column(n_pairs);
        values.pop();
        values.push(v);

        let mu = mean(&values);
        let sigma = std_dev(&values);
        assert_relative_eq!(v, mu + 4.0 * sigma, epsilon = 1e-9);

        let table = FeatureTableBuilder::new().column("x", values).build().unwrap();
        let detector = ZScoreDetector::default();
        let standardized = detector.standardize(&table).unwrap();
        let last = 2 * n_pairs;

        assert_eq!(detector.flag(&standardized, 3.0).unwrap().flags.get(last), Some(true));
        assert_eq!(detector.flag(&standardized, 4.5).unwrap().flags.get(last), Some(false));
    }

    #[test]
    fn extreme_row_flagged_by_threshold() {
        let mut values: Vec<f64> = (0..400).map(|i| 10.0 + (i % 10) as f64 * 0.1).collect();
        values[123] = 60.0;
        let table = FeatureTableBuilder::new()
            .column("Global_active_power", values)
            .build()
            .unwrap();

        let detector = ZScoreDetector::default();
        let standardized = detector.standardize(&table).unwrap();
        let z = standardized.z_scores("Global_active_power").unwrap()[123];
        assert!(z > 4.5);

        let strict = detector.flag(&standardized, z - 0.01).unwrap();
        assert_eq!(strict.flags.get(123), Some(true));
        let lenient = detector.flag(&standardized, z + 0.01).unwrap();
        assert_eq!(lenient.flags.get(123), Some(false));
        assert_relative_eq!(strict.scores[123], z, epsilon = 1e-12);
    }

    #[test]
    fn zero_variance_feature_excluded_with_warning_entry() {
        let mut varying: Vec<f64> = (0..100).map(|i| (i % 5) as f64).collect();
        varying[10] = 100.0;
        let table = FeatureTableBuilder::new()
            .column("Voltage", vec![240.0; 100])
            .column("Sub_metering_1", varying)
            .build()
            .unwrap();

        let run = ZScoreDetector::default().run(&table).unwrap();
        let selected = run.selected();
        assert_eq!(selected.detail.excluded, vec!["Voltage".to_string()]);
        assert_eq!(
            selected.detail.warnings(),
            vec![OutlierError::DegenerateFeature {
                feature: "Voltage".to_string()
            }]
        );
        assert_eq!(selected.detail.per_feature.len(), 1);
        assert!(selected.scores.iter().all(|s| s.is_finite()));
        assert_eq!(selected.flags.get(10), Some(true));
    }

    #[test]
    fn all_constant_features_are_degenerate() {
        let table = FeatureTableBuilder::new()
            .column("a", vec![1.0; 20])
            .column("b", vec![2.0; 20])
            .build()
            .unwrap();
        let err = ZScoreDetector::default().run(&table).unwrap_err();
        assert!(matches!(err, OutlierError::DegenerateInput(_)));
    }

    #[test]
    fn row_flag_is_or_across_features() {
        let mut a: Vec<f64> = (0..200).map(|i| (i % 4) as f64).collect();
        let mut b: Vec<f64> = (0..200).map(|i| (i % 3) as f64).collect();
        a[5] = 80.0;
        b[150] = -80.0;
        let table = FeatureTableBuilder::new()
            .column("a", a)
            .column("b", b)
            .build()
            .unwrap();

        let result = ZScoreDetector::default().evaluate(&table, 3.0).unwrap();
        assert_eq!(result.flags.outlier_positions(), vec![5, 150]);
        assert_eq!(result.detail.per_feature[0].count, 1);
        assert_eq!(result.detail.per_feature[1].count, 1);
        assert_eq!(result.outlier_count, 2);
    }

    #[test]
    fn sweep_without_outliers_returns_default_threshold() {
        let values: Vec<f64> = (0..300).map(|i| (i % 2) as f64).collect();
        let table = FeatureTableBuilder::new().column("x", values).build().unwrap();

        let detector = ZScoreDetector::default();
        let run = detector.run(&table).unwrap();
        assert!(run.sweep.results.iter().all(|r| r.outlier_count == 0));
        assert_eq!(run.selection.parameter, 3.0);
        assert_eq!(run.selection.reason, SelectionReason::DefaultFallback);
    }

    #[test]
    fn invalid_threshold_only_skips_its_candidate() {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let table = FeatureTableBuilder::new().column("x", values).build().unwrap();
        let detector = ZScoreDetector::new(ZScoreConfig::default().thresholds(vec![-1.0, 3.0]));

        let sweep = detector.sweep(&table, detector.candidates()).unwrap();
        assert_eq!(sweep.results.len(), 1);
        assert_eq!(sweep.failures.len(), 1);
        assert_eq!(sweep.failures[0].parameter, -1.0);
    }

    #[test]
    fn expected_normal_share_reported() {
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let table = FeatureTableBuilder::new().column("x", values).build().unwrap();
        let result = ZScoreDetector::default().evaluate(&table, 3.0).unwrap();
        assert_relative_eq!(result.detail.expected_normal_pct, 0.27, epsilon = 0.01);
    }

    #[test]
    fn overflowing_moments_fail_instead_of_excluding() {
        // spread 2e200 fits in f64, its square does not
        let mut values: Vec<f64> = (0..100).map(|i| (i % 7) as f64).collect();
        values[0] = -1e200;
        values[1] = 1e200;
        let table = FeatureTableBuilder::new()
            .column("Global_active_power", values)
            .column("Voltage", (0..100).map(|i| 240.0 + (i % 3) as f64).collect())
            .build()
            .unwrap();

        let err = ZScoreDetector::default().run(&table).unwrap_err();
        assert!(matches!(
            err,
            OutlierError::NumericOverflow { ref feature, .. } if feature == "Global_active_power"
        ));
    }
}
