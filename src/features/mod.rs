//! Feature selection for the cleaned power-consumption table.
//!
//! The cleaned table mixes measurements with calendar and categorical
//! columns. Detectors only see numeric measurement columns; calendar
//! columns are dropped by name even when they happen to be numeric.
//! Canonical measurement columns are always kept, so a stray non-numeric
//! cell in one of them fails the read instead of silently dropping it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{OutlierError, Result};

/// Columns never used as detector features.
pub const EXCLUDED_COLUMNS: [&str; 9] = [
    "DateTime",
    "Date",
    "Time",
    "DayName",
    "MonthName",
    "Season",
    "TimeOfDay",
    "Power_Level",
    "Voltage_Level",
];

/// Measurement and derived features produced by the cleaning stage.
pub const CANONICAL_FEATURES: [&str; 15] = [
    "Global_active_power",
    "Global_reactive_power",
    "Voltage",
    "Global_intensity",
    "Sub_metering_1",
    "Sub_metering_2",
    "Sub_metering_3",
    "Sub_metering_4",
    "Total_Sub_metering",
    "Energy_per_minute",
    "Intensity_ratio",
    "Power_1h_avg",
    "Power_24h_avg",
    "Power_change_1h",
    "Is_weekend",
];

/// How detector features are chosen from the input header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Explicit feature list. When absent, every canonical or numeric column
    /// not excluded is used.
    pub include: Option<Vec<String>>,
    /// Extra columns to drop on top of [`EXCLUDED_COLUMNS`].
    pub exclude: Vec<String>,
}

impl FeatureConfig {
    /// Use exactly these features.
    pub fn explicit<S: Into<String>>(features: impl IntoIterator<Item = S>) -> Self {
        Self {
            include: Some(features.into_iter().map(Into::into).collect()),
            exclude: Vec::new(),
        }
    }

    fn is_excluded(&self, column: &str) -> bool {
        EXCLUDED_COLUMNS.contains(&column) || self.exclude.iter().any(|c| c == column)
    }

    /// Resolve the feature list against a header.
    ///
    /// `is_numeric(j)` reports whether column `j` holds only numbers. An
    /// explicit list must name existing columns. Without one, canonical
    /// measurements are selected whatever they hold, and other columns only
    /// when numeric. Type errors in selected columns are reported by the
    /// reader with row context.
    pub fn resolve(
        &self,
        headers: &[String],
        is_numeric: impl Fn(usize) -> bool,
    ) -> Result<Vec<String>> {
        let features = match &self.include {
            Some(include) => {
                for feature in include {
                    if !headers.contains(feature) {
                        return Err(OutlierError::MissingFeature {
                            feature: feature.clone(),
                        });
                    }
                }
                include.clone()
            }
            None => headers
                .iter()
                .enumerate()
                .filter(|(_, name)| !self.is_excluded(name))
                .filter(|(j, name)| {
                    let keep = is_canonical(name) || is_numeric(*j);
                    if !keep {
                        warn!(column = %name, "non-numeric column dropped from features");
                    }
                    keep
                })
                .map(|(_, name)| name.clone())
                .collect(),
        };

        if features.is_empty() {
            return Err(OutlierError::EmptyData);
        }
        Ok(features)
    }
}

/// Default feature selection of a header, in header order: canonical
/// measurements plus any other numeric, non-calendar column.
pub fn numeric_features(headers: &[String], is_numeric: impl Fn(usize) -> bool) -> Vec<String> {
    FeatureConfig::default()
        .resolve(headers, is_numeric)
        .unwrap_or_default()
}

/// Whether a column name is one of the measurements the cleaning stage produces.
pub fn is_canonical(column: &str) -> bool {
    CANONICAL_FEATURES.contains(&column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn calendar_columns_dropped_even_if_numeric() {
        let h = headers(&["DateTime", "Global_active_power", "Season", "Voltage"]);
        let features = numeric_features(&h, |_| true);
        assert_eq!(features, vec!["Global_active_power", "Voltage"]);
    }

    #[test]
    fn text_columns_dropped() {
        let h = headers(&["Global_active_power", "Notes", "Voltage"]);
        let features = numeric_features(&h, |j| j != 1);
        assert_eq!(features, vec!["Global_active_power", "Voltage"]);
    }

    #[test]
    fn canonical_columns_kept_even_if_not_numeric() {
        let h = headers(&["DateTime", "Global_active_power", "Voltage", "Notes"]);
        // Voltage holds a stray "?" somewhere
        let features = numeric_features(&h, |j| j == 1);
        assert_eq!(features, vec!["Global_active_power", "Voltage"]);
    }

    #[test]
    fn excluded_canonical_column_stays_out() {
        let h = headers(&["Voltage", "Is_weekend"]);
        let config = FeatureConfig {
            include: None,
            exclude: vec!["Voltage".to_string()],
        };
        assert_eq!(config.resolve(&h, |_| false).unwrap(), vec!["Is_weekend"]);
    }

    #[test]
    fn explicit_list_must_exist() {
        let h = headers(&["Voltage"]);
        let err = FeatureConfig::explicit(["Voltage", "Sub_metering_4"])
            .resolve(&h, |_| true)
            .unwrap_err();
        assert_eq!(
            err,
            OutlierError::MissingFeature {
                feature: "Sub_metering_4".to_string()
            }
        );
    }

    #[test]
    fn extra_exclusions_apply() {
        let h = headers(&["Voltage", "Is_weekend"]);
        let config = FeatureConfig {
            include: None,
            exclude: vec!["Is_weekend".to_string()],
        };
        assert_eq!(config.resolve(&h, |_| true).unwrap(), vec!["Voltage"]);
    }

    #[test]
    fn nothing_selected_is_empty_data() {
        let h = headers(&["Date", "Time"]);
        let err = FeatureConfig::default().resolve(&h, |_| true).unwrap_err();
        assert_eq!(err, OutlierError::EmptyData);
        assert!(is_canonical("Sub_metering_4"));
    }
}
