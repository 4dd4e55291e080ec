//! Statistical helpers shared by the detectors.

pub mod stats;

pub use stats::{
    average_path_length, euclidean_distance, mean, normal_tail_percentage, std_dev, variance,
};
