//! CSV input and output.
//!
//! Flag tables use `true`/`false` cells and floats use the shortest
//! round-trip formatting, so a rerun on the same input writes the same bytes.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use tracing::debug;

use crate::consensus::{ConsensusTable, OverlapSummary};
use crate::core::{FeatureTable, FlagVector};
use crate::detection::{DispersionDetail, Method, SweepResult};
use crate::error::{OutlierError, Result};
use crate::features::FeatureConfig;

/// Name of the row index column in every output table.
pub const ROW_COLUMN: &str = "row";

/// Row flag column of the z-score table (OR across features).
pub const ZSCORE_ANY_COLUMN: &str = "outlier_any";

/// Read the cleaned table from a CSV file with a header row.
pub fn read_table(path: &Path, features: &FeatureConfig) -> Result<FeatureTable> {
    let file = File::open(path)
        .map_err(|e| OutlierError::Io(format!("{}: {e}", path.display())))?;
    let table = read_table_from(file, features)?;
    debug!(
        path = %path.display(),
        rows = table.n_rows(),
        features = table.n_features(),
        "table loaded"
    );
    Ok(table)
}

/// Read a table from any CSV source.
///
/// Columns are chosen by [`FeatureConfig::resolve`]. A cell in a chosen
/// column that does not parse as a number fails with its row and feature.
pub fn read_table_from<R: Read>(reader: R, features: &FeatureConfig) -> Result<FeatureTable> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let records = reader
        .records()
        .collect::<std::result::Result<Vec<csv::StringRecord>, csv::Error>>()?;
    if records.is_empty() {
        return Err(OutlierError::EmptyData);
    }

    let is_numeric = |j: usize| {
        records
            .iter()
            .all(|r| r.get(j).is_some_and(|cell| cell.trim().parse::<f64>().is_ok()))
    };
    let selected = features.resolve(&headers, is_numeric)?;

    let mut columns = Vec::with_capacity(selected.len());
    for feature in &selected {
        let j = headers
            .iter()
            .position(|h| h == feature)
            .ok_or_else(|| OutlierError::MissingFeature {
                feature: feature.clone(),
            })?;
        let column = records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let cell = record.get(j).unwrap_or("");
                cell.trim()
                    .parse::<f64>()
                    .map_err(|_| OutlierError::NonNumeric {
                        row,
                        feature: feature.clone(),
                        value: cell.to_string(),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;
        columns.push(column);
    }

    FeatureTable::new(selected, columns)
}

/// Create a CSV file, making its parent directory as needed.
pub fn create_writer(path: &Path) -> Result<csv::Writer<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(csv::Writer::from_path(path)?)
}

fn bool_cell(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

/// Write the z-score flags: one column per feature, their OR, and max |z|.
pub fn write_zscore_flags<W: Write>(
    writer: &mut csv::Writer<W>,
    result: &SweepResult<f64, DispersionDetail>,
) -> Result<()> {
    let mut header = vec![ROW_COLUMN.to_string()];
    header.extend(
        result
            .detail
            .per_feature
            .iter()
            .map(|f| format!("outlier_{}", f.feature)),
    );
    header.push(ZSCORE_ANY_COLUMN.to_string());
    header.push("max_abs_zscore".to_string());
    writer.write_record(&header)?;

    for (i, &row) in result.flags.index().iter().enumerate() {
        let mut record = vec![row.to_string()];
        record.extend(
            result
                .detail
                .per_feature
                .iter()
                .map(|f| bool_cell(f.flags[i]).to_string()),
        );
        record.push(bool_cell(result.flags.as_slice()[i]).to_string());
        record.push(result.scores[i].to_string());
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write single-flag results: `row, outlier_<key>, <key>_score`.
pub fn write_method_flags<W: Write>(
    writer: &mut csv::Writer<W>,
    method: Method,
    flags: &FlagVector,
    scores: &[f64],
) -> Result<()> {
    if scores.len() != flags.len() {
        return Err(OutlierError::AlignmentMismatch {
            method: method.name().to_string(),
            expected: flags.len(),
            got: scores.len(),
        });
    }

    writer.write_record([
        ROW_COLUMN.to_string(),
        method.flag_column(),
        format!("{}_score", method.key()),
    ])?;
    for ((row, flag), score) in flags.index().iter().zip(flags.iter()).zip(scores) {
        writer.write_record([row.to_string(), bool_cell(flag).to_string(), score.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the row-aligned comparison table.
pub fn write_consensus<W: Write>(writer: &mut csv::Writer<W>, table: &ConsensusTable) -> Result<()> {
    let mut header = vec![ROW_COLUMN.to_string()];
    header.extend(table.methods().iter().map(|m| m.flag_column()));
    header.extend(["vote_count", "consensus", "all_three"].map(str::to_string));
    writer.write_record(&header)?;

    for record in table.records() {
        let mut cells = vec![record.row.to_string()];
        cells.extend(record.flags.iter().map(|&f| bool_cell(f).to_string()));
        cells.push(record.vote_count.to_string());
        cells.push(bool_cell(record.consensus).to_string());
        cells.push(bool_cell(record.all_three).to_string());
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the overlap summary: the seven categories, then the consensus row.
pub fn write_overlap_summary<W: Write>(
    writer: &mut csv::Writer<W>,
    summary: &OverlapSummary,
) -> Result<()> {
    writer.write_record(["key", "category", "count", "percentage"])?;
    for category in &summary.categories {
        writer.write_record([
            category.key.clone(),
            category.label.clone(),
            category.count.to_string(),
            category.percentage.to_string(),
        ])?;
    }
    writer.write_record([
        "consensus".to_string(),
        "Consensus (2+ methods)".to_string(),
        summary.consensus_count.to_string(),
        summary.consensus_percentage().to_string(),
    ])?;
    writer.flush()?;
    Ok(())
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim() {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

/// Read one flag column back, keyed by the `row` column.
pub fn read_flags<R: Read>(reader: R, column: &str) -> Result<FlagVector> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| OutlierError::MissingFeature {
                feature: name.to_string(),
            })
    };
    let row_col = position(ROW_COLUMN)?;
    let flag_col = position(column)?;

    let mut index = Vec::new();
    let mut flags = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row_cell = record.get(row_col).unwrap_or("");
        let row = row_cell
            .trim()
            .parse::<usize>()
            .map_err(|_| OutlierError::NonNumeric {
                row: i,
                feature: ROW_COLUMN.to_string(),
                value: row_cell.to_string(),
            })?;
        let flag_cell = record.get(flag_col).unwrap_or("");
        let flag = parse_bool(flag_cell).ok_or_else(|| {
            OutlierError::Csv(format!("row {i}: {column} = {flag_cell:?} is not a boolean"))
        })?;
        index.push(row);
        flags.push(flag);
    }

    FlagVector::new(index, flags)
}

/// Read one flag column from a file.
pub fn read_flags_file(path: &Path, column: &str) -> Result<FlagVector> {
    let file = File::open(path)
        .map_err(|e| OutlierError::Io(format!("{}: {e}", path.display())))?;
    read_flags(file, column)
}
