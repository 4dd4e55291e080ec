//! Pipeline configuration.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied via [`PipelineConfig::apply_cli_overrides`])
//! 2. TOML config file
//! 3. Compiled defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detection::{AcceptanceBand, IsolationForestConfig, LofConfig, ZScoreConfig};
use crate::error::{OutlierError, Result};
use crate::features::FeatureConfig;

/// Input and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Cleaned input table.
    pub input: PathBuf,
    /// Directory for flag, comparison and summary tables.
    pub output_dir: PathBuf,
    /// Directory for text reports.
    pub report_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/processed/household_power_consumption_cleaned.csv"),
            output_dir: PathBuf::from("outputs/phase2"),
            report_dir: PathBuf::from("reports/phase2"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub features: FeatureConfig,
    pub zscore: ZScoreConfig,
    pub isolation: IsolationForestConfig,
    pub lof: LofConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub seed: Option<u64>,
}

fn invalid(field: &str, message: &str) -> OutlierError {
    OutlierError::Config {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate_band(field: &str, band: &AcceptanceBand) -> Result<()> {
    let ordered = band.min_pct.is_finite()
        && band.max_pct.is_finite()
        && 0.0 <= band.min_pct
        && band.min_pct <= band.max_pct
        && band.max_pct <= 100.0;
    if !ordered {
        return Err(invalid(field, "must satisfy 0 <= min_pct <= max_pct <= 100"));
    }
    Ok(())
}

impl PipelineConfig {
    /// Load configuration from an optional TOML file, then apply CLI overrides.
    pub fn load(path: Option<&Path>, cli_overrides: Option<&CliOverrides>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| OutlierError::Io(format!("{}: {e}", path.display())))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        if let Some(cli) = cli_overrides {
            config.apply_cli_overrides(cli);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| OutlierError::Config {
            field: "<toml>".to_string(),
            message: e.to_string(),
        })
    }

    /// Apply CLI flags on top of the loaded values.
    pub fn apply_cli_overrides(&mut self, cli: &CliOverrides) {
        if let Some(input) = &cli.input {
            self.paths.input = input.clone();
        }
        if let Some(output_dir) = &cli.output_dir {
            self.paths.output_dir = output_dir.clone();
        }
        if let Some(report_dir) = &cli.report_dir {
            self.paths.report_dir = report_dir.clone();
        }
        if let Some(seed) = cli.seed {
            self.isolation.seed = seed;
        }
    }

    /// Validate the configuration values.
    ///
    /// Individual sweep candidates are not range-checked here; an
    /// out-of-range candidate only fails its own evaluation.
    pub fn validate(&self) -> Result<()> {
        if self.zscore.thresholds.is_empty() {
            return Err(invalid("zscore.thresholds", "must not be empty"));
        }
        validate_band("zscore.band", &self.zscore.band)?;
        if !(self.zscore.default_threshold.is_finite() && self.zscore.default_threshold > 0.0) {
            return Err(invalid("zscore.default_threshold", "must be a positive number"));
        }

        if self.isolation.contaminations.is_empty() {
            return Err(invalid("isolation.contaminations", "must not be empty"));
        }
        if self.isolation.n_estimators == 0 {
            return Err(invalid("isolation.n_estimators", "must be greater than 0"));
        }
        if self.isolation.max_samples < 2 {
            return Err(invalid("isolation.max_samples", "must be at least 2"));
        }

        if self.lof.neighbor_counts.is_empty() {
            return Err(invalid("lof.neighbor_counts", "must not be empty"));
        }
        if !(self.lof.cutoff.is_finite() && self.lof.cutoff > 0.0) {
            return Err(invalid("lof.cutoff", "must be a positive number"));
        }
        validate_band("lof.band", &self.lof.band)?;
        if self.lof.default_neighbors == 0 {
            return Err(invalid("lof.default_neighbors", "must be greater than 0"));
        }

        if let Some(include) = &self.features.include {
            if include.is_empty() {
                return Err(invalid("features.include", "must not be empty when set"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_operating_points() {
        let config = PipelineConfig::default();
        assert_eq!(config.zscore.thresholds, vec![2.5, 3.0, 3.5]);
        assert_eq!(config.zscore.default_threshold, 3.0);
        assert_eq!(config.isolation.contaminations, vec![0.05, 0.10, 0.15]);
        assert_eq!(config.isolation.seed, 42);
        assert_eq!(config.lof.neighbor_counts, vec![10, 20, 50]);
        assert_eq!(config.lof.default_neighbors, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [isolation]
            seed = 7

            [lof]
            neighbor_counts = [5, 15]

            [features]
            include = ["Voltage", "Global_intensity"]
            "#,
        )
        .unwrap();
        assert_eq!(config.isolation.seed, 7);
        assert_eq!(config.isolation.n_estimators, 100);
        assert_eq!(config.lof.neighbor_counts, vec![5, 15]);
        assert_eq!(config.lof.cutoff, 1.5);
        assert_eq!(
            config.features.include.as_deref(),
            Some(&["Voltage".to_string(), "Global_intensity".to_string()][..])
        );
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = PipelineConfig::default();
        config.apply_cli_overrides(&CliOverrides {
            output_dir: Some(PathBuf::from("/tmp/out")),
            seed: Some(99),
            ..Default::default()
        });
        assert_eq!(config.paths.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.isolation.seed, 99);
        assert_eq!(config.paths.report_dir, PathBuf::from("reports/phase2"));
    }

    #[test]
    fn invalid_values_name_their_field() {
        let config = PipelineConfig::from_toml("[lof]\nband = { min_pct = 5.0, max_pct = 1.0 }").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, OutlierError::Config { ref field, .. } if field == "lof.band"));

        let err = PipelineConfig::from_toml("[zscore]\nthresholds = []")
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("zscore.thresholds"));
    }

    #[test]
    fn out_of_range_candidates_pass_validation() {
        let config = PipelineConfig::from_toml("[isolation]\ncontaminations = [0.05, 0.6]").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml("[zscore\nthresholds = 1").unwrap_err();
        assert!(matches!(err, OutlierError::Config { .. }));
    }
}
