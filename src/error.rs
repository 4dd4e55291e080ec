//! Error types for the outlier-consensus library.

use thiserror::Error;

/// Result type alias for detection and consensus operations.
pub type Result<T> = std::result::Result<T, OutlierError>;

/// Errors that can occur while detecting outliers or reconciling detectors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OutlierError {
    /// Input table has no rows or no features.
    #[error("empty input data")]
    EmptyData,

    /// A required feature column is absent from the input.
    #[error("missing feature column: {feature}")]
    MissingFeature { feature: String },

    /// A cell in a numeric feature could not be parsed as a number.
    #[error("non-numeric value {value:?} in feature {feature} at row {row}")]
    NonNumeric {
        row: usize,
        feature: String,
        value: String,
    },

    /// A value is NaN or infinite; upstream cleaning must remove these.
    #[error("non-finite value in feature {feature} at row {row}")]
    NonFinite { row: usize, feature: String },

    /// Feature columns of different lengths were supplied.
    #[error("ragged table: feature {feature} has {got} rows, expected {expected}")]
    RaggedTable {
        feature: String,
        expected: usize,
        got: usize,
    },

    /// Two feature columns share a name.
    #[error("duplicate feature column: {feature}")]
    DuplicateFeature { feature: String },

    /// Values of a feature are too far apart for finite arithmetic.
    #[error("numeric overflow in feature {feature}: {reason}")]
    NumericOverflow { feature: String, reason: String },

    /// Insufficient rows for the detector.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A single feature has zero variance.
    #[error("degenerate feature {feature}: zero variance")]
    DegenerateFeature { feature: String },

    /// The whole input is degenerate for the detector (e.g. every row identical).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// A swept parameter lies outside its valid domain.
    #[error("parameter {parameter} = {value} out of range: {reason}")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        reason: String,
    },

    /// Every candidate of a sweep failed.
    #[error("no viable candidate in {method} sweep")]
    NoViableCandidate { method: String },

    /// Flag vectors of different lengths were handed to the consensus engine.
    #[error("alignment mismatch for {method}: expected {expected} rows, got {got}")]
    AlignmentMismatch {
        method: String,
        expected: usize,
        got: usize,
    },

    /// Flag vectors refer to rows in a different order.
    #[error("row order mismatch for {method} at position {position}: expected row {expected}, got {got}")]
    RowOrderMismatch {
        method: String,
        position: usize,
        expected: usize,
        got: usize,
    },

    /// Overlap categories do not partition the flagged rows.
    #[error("overlap categories cover {categorized} rows but {flagged} rows are flagged")]
    ReconciliationFailed { categorized: usize, flagged: usize },

    /// Invalid configuration value.
    #[error("invalid config {field}: {message}")]
    Config { field: String, message: String },

    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(String),

    /// CSV read or write failure.
    #[error("csv error: {0}")]
    Csv(String),
}

impl OutlierError {
    /// Whether the error only invalidates one sweep candidate rather than the whole sweep.
    pub fn is_candidate_local(&self) -> bool {
        matches!(self, OutlierError::ParameterOutOfRange { .. })
    }
}

impl From<std::io::Error> for OutlierError {
    fn from(err: std::io::Error) -> Self {
        OutlierError::Io(err.to_string())
    }
}

impl From<csv::Error> for OutlierError {
    fn from(err: csv::Error) -> Self {
        OutlierError::Csv(err.to_string())
    }
}
