//! Outlier detectors and their parameter-selection policies.
//!
//! Three independent methods are provided, each sweeping one parameter:
//! - [`ZScoreDetector`]: per-feature standardized deviation, sweeps the |z| threshold
//! - [`IsolationForestDetector`]: random partitioning ensemble, sweeps contamination
//! - [`LofDetector`]: local outlier factor, sweeps the neighbour count
//!
//! # Example
//!
//! ```
//! use outlier_consensus::core::FeatureTableBuilder;
//! use outlier_consensus::detection::{Detector, ZScoreDetector, ZScoreConfig};
//!
//! let mut values: Vec<f64> = (0..200).map(|i| 10.0 + (i % 7) as f64 * 0.1).collect();
//! values[42] = 100.0;
//! let table = FeatureTableBuilder::new().column("Voltage", values).build().unwrap();
//!
//! let detector = ZScoreDetector::new(ZScoreConfig::default());
//! let run = detector.run(&table).unwrap();
//! assert_eq!(run.selection.parameter, 3.0);
//! assert_eq!(run.selected().flags.get(42), Some(true));
//! ```

use std::fmt;

pub mod isolation;
pub mod lof;
pub mod selection;
pub mod sweep;
mod traits;
pub mod zscore;

pub use isolation::{IsolationDetail, IsolationForest, IsolationForestConfig, IsolationForestDetector};
pub use lof::{LofConfig, LofDetail, LofDetector};
pub use selection::{
    select_in_band, select_max_separation, AcceptanceBand, BandPosition, ParamValue, Selection,
    SelectionReason,
};
pub use sweep::{score_separation, CandidateFailure, ScoreOrientation, Sweep, SweepResult};
pub use traits::{Detector, DetectorRun};
pub use zscore::{DispersionDetail, FeatureFlags, ZScoreConfig, ZScoreDetector};

/// Outlier detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Univariate standardized deviation.
    ZScore,
    /// Isolation forest.
    IsolationForest,
    /// Local outlier factor.
    Lof,
}

impl Method {
    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Method::ZScore => "Z-Score",
            Method::IsolationForest => "Isolation Forest",
            Method::Lof => "LOF",
        }
    }

    /// Short key used in column and file names.
    pub fn key(&self) -> &'static str {
        match self {
            Method::ZScore => "zscore",
            Method::IsolationForest => "iforest",
            Method::Lof => "lof",
        }
    }

    /// Flag column name in output tables.
    pub fn flag_column(&self) -> String {
        format!("outlier_{}", self.key())
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
