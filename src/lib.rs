//! # outlier-consensus
//!
//! Outlier detection for household power-consumption tables.
//!
//! Three independent detectors (z-score, isolation forest, local outlier
//! factor) each sweep one parameter and pick an operating point with a
//! deterministic policy. The consensus engine then combines their selected
//! flags row by row into vote counts, consensus flags and seven overlap
//! categories.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod config;
pub mod consensus;
pub mod core;
pub mod detection;
pub mod error;
pub mod features;
pub mod io;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{OutlierError, Result};

pub mod prelude {
    pub use crate::consensus::{compare, ConsensusTable, MethodFlags, OverlapSummary};
    pub use crate::core::{FeatureTable, FeatureTableBuilder, FlagVector};
    pub use crate::detection::{
        Detector, DetectorRun, IsolationForestDetector, LofDetector, Method, ZScoreDetector,
    };
    pub use crate::error::{OutlierError, Result};
}
