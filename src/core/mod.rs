//! Core data structures shared by detectors and the consensus engine.

mod flags;
mod table;

pub use flags::{percentage, FlagVector, ScoreVector};
pub use table::{FeatureTable, FeatureTableBuilder};
