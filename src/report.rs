//! Plain-text reports built from finished runs.
//!
//! Reports only read structured results; nothing here feeds back into
//! detection or consensus.

use chrono::{DateTime, Local};

use crate::consensus::OverlapSummary;
use crate::detection::{
    BandPosition, DetectorRun, DispersionDetail, IsolationDetail, LofDetail, Method,
};

const WIDTH: usize = 70;

/// Line buffer with the section layout shared by all reports.
#[derive(Debug, Default)]
struct Report {
    lines: Vec<String>,
}

impl Report {
    fn line(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }

    fn rule(&mut self, c: char) {
        self.lines.push(c.to_string().repeat(WIDTH));
    }

    fn section(&mut self, title: &str) {
        self.rule('=');
        self.line(format!(" {title}"));
        self.rule('=');
        self.blank();
    }

    fn finish(mut self, generated: DateTime<Local>) -> String {
        self.blank();
        self.line(format!(
            "Analysis completed: {}",
            generated.format("%Y-%m-%d %H:%M:%S")
        ));
        self.rule('=');
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Sweep assessment label of the z-score detector.
pub fn zscore_assessment(position: BandPosition) -> &'static str {
    match position {
        BandPosition::Above => "Too strict",
        BandPosition::Below => "Too lenient",
        BandPosition::Within => "Balanced",
    }
}

/// Sweep assessment label of the LOF detector.
pub fn lof_assessment(position: BandPosition) -> &'static str {
    match position {
        BandPosition::Below => "Too conservative",
        BandPosition::Above => "Too aggressive",
        BandPosition::Within => "Balanced",
    }
}

fn selection_block<P: std::fmt::Display>(
    report: &mut Report,
    method: Method,
    parameter: P,
    reason: impl std::fmt::Display,
    count: usize,
    pct: f64,
) {
    report.section(&format!("SELECTED {}: {parameter}", method.name().to_uppercase()));
    report.line(format!("Reason: {reason}"));
    report.line(format!("Total outliers: {count}"));
    report.line(format!("Percentage: {pct:.2}%"));
}

fn failures_block<P: std::fmt::Display>(
    report: &mut Report,
    failures: &[crate::detection::CandidateFailure<P>],
) {
    if failures.is_empty() {
        return;
    }
    report.blank();
    report.line("SKIPPED CANDIDATES:");
    for failure in failures {
        report.line(format!("  {}: {}", failure.parameter, failure.error));
    }
}

/// Report for a z-score run.
pub fn zscore_report(run: &DetectorRun<f64, DispersionDetail>, generated: DateTime<Local>) -> String {
    let mut report = Report::default();
    report.section("Z-SCORE OUTLIER DETECTION - ANALYSIS");
    report.line("METHOD:");
    report.line("Standardized deviation from the feature mean, Z = (X - mean) / std");
    report.line("Sample standard deviation; a row is flagged when any feature has |Z| > threshold.");
    report.blank();

    report.section("PARAMETER EXPERIMENTATION");
    report.line(format!(
        "{:<12} {:>10} {:>11} {:>14}  {}",
        "Threshold", "Outliers", "Percentage", "Normal tail", "Assessment"
    ));
    report.rule('-');
    for result in &run.sweep.results {
        report.line(format!(
            "|Z| > {:<6} {:>10} {:>10.2}% {:>13.2}%  {}",
            result.parameter,
            result.outlier_count,
            result.outlier_percentage,
            result.detail.expected_normal_pct,
            zscore_assessment(result.detail.assessment)
        ));
    }
    failures_block(&mut report, &run.sweep.failures);
    report.blank();

    let selected = run.selected();
    selection_block(
        &mut report,
        Method::ZScore,
        format!("|Z| > {}", run.selection.parameter),
        run.selection.reason,
        selected.outlier_count,
        selected.outlier_percentage,
    );
    report.blank();
    report.line("OUTLIERS PER FEATURE:");
    report.rule('-');
    for feature in &selected.detail.per_feature {
        report.line(format!(
            "  {:<30} {:>8}  ({:>5.2}%)",
            feature.feature, feature.count, feature.percentage
        ));
    }
    let warnings = selected.detail.warnings();
    if !warnings.is_empty() {
        report.blank();
        report.line("WARNINGS:");
        for warning in &warnings {
            report.line(format!("  {warning}, excluded from scoring"));
        }
    }
    report.finish(generated)
}

/// Report for an isolation forest run.
pub fn isolation_report(
    run: &DetectorRun<f64, IsolationDetail>,
    n_estimators: usize,
    seed: u64,
    generated: DateTime<Local>,
) -> String {
    let mut report = Report::default();
    report.section("ISOLATION FOREST OUTLIER DETECTION - ANALYSIS");
    report.line("METHOD:");
    report.line("Random partitioning trees; rows isolated in few splits score lower.");
    report.line(format!("Trees: {n_estimators}, seed: {seed}"));
    report.blank();

    report.section("PARAMETER EXPERIMENTATION");
    report.line(format!(
        "{:<15} {:>10} {:>11} {:>12} {:>12} {:>11}",
        "Contamination", "Outliers", "Percentage", "Outlier mean", "Inlier mean", "Separation"
    ));
    report.rule('-');
    for result in &run.sweep.results {
        report.line(format!(
            "{:<15} {:>10} {:>10.2}% {:>12.4} {:>12.4} {:>11.4}",
            result.parameter,
            result.outlier_count,
            result.outlier_percentage,
            result.detail.outlier_mean,
            result.detail.inlier_mean,
            result.separation
        ));
    }
    failures_block(&mut report, &run.sweep.failures);
    report.blank();

    let selected = run.selected();
    selection_block(
        &mut report,
        Method::IsolationForest,
        format!("contamination = {}", run.selection.parameter),
        run.selection.reason,
        selected.outlier_count,
        selected.outlier_percentage,
    );
    report.line(format!(
        "Score range: [{:.4}, {:.4}]",
        selected.detail.min_score, selected.detail.max_score
    ));
    report.line(format!("Score cut: {:.4}", selected.detail.score_threshold));
    report.finish(generated)
}

/// Report for a LOF run.
pub fn lof_report(run: &DetectorRun<usize, LofDetail>, cutoff: f64, generated: DateTime<Local>) -> String {
    let mut report = Report::default();
    report.section("LOCAL OUTLIER FACTOR DETECTION - ANALYSIS");
    report.line("METHOD:");
    report.line("Density of each row relative to its k nearest neighbours (Euclidean).");
    report.line(format!("A row is flagged when LOF > {cutoff}."));
    report.blank();

    report.section("PARAMETER EXPERIMENTATION");
    report.line(format!(
        "{:<15} {:>10} {:>11} {:>10} {:>10}  {}",
        "n_neighbors", "Outliers", "Percentage", "Mean LOF", "LOF > 1.5", "Assessment"
    ));
    report.rule('-');
    for result in &run.sweep.results {
        report.line(format!(
            "{:<15} {:>10} {:>10.2}% {:>10.4} {:>10}  {}",
            result.parameter,
            result.outlier_count,
            result.outlier_percentage,
            result.detail.outlier_mean,
            result.detail.strong_outliers,
            lof_assessment(result.detail.assessment)
        ));
    }
    failures_block(&mut report, &run.sweep.failures);
    report.blank();

    let selected = run.selected();
    selection_block(
        &mut report,
        Method::Lof,
        format!("n_neighbors = {}", run.selection.parameter),
        run.selection.reason,
        selected.outlier_count,
        selected.outlier_percentage,
    );
    report.line(format!("Average LOF of outliers: {:.4}", selected.detail.outlier_mean));
    report.line(format!(
        "LOF range: [{:.4}, {:.4}]",
        selected.detail.min_lof, selected.detail.max_lof
    ));
    report.finish(generated)
}

/// Report comparing the three methods.
pub fn comparison_report(summary: &OverlapSummary, generated: DateTime<Local>) -> String {
    let mut report = Report::default();
    report.section("OUTLIER METHOD COMPARISON");
    report.line(format!("Total rows: {}", summary.total_rows));
    report.blank();

    report.line("Individual Methods:");
    report.rule('-');
    for (position, method) in summary.methods.iter().enumerate() {
        report.line(format!(
            "{}: {} ({:.2}%)",
            method.name,
            summary.per_method[position],
            summary.method_percentage(position)
        ));
    }
    report.blank();

    report.line("Overlap Analysis:");
    report.rule('-');
    for category in &summary.categories {
        report.line(format!(
            "{}: {} ({:.2}%)",
            category.label, category.count, category.percentage
        ));
    }
    report.blank();
    report.line(format!(
        "Consensus Outliers (2+ methods agree): {} ({:.2}%)",
        summary.consensus_count,
        summary.consensus_percentage()
    ));
    report.blank();

    report.line("Key Findings:");
    report.line(format!(
        "- {} outliers detected by all 3 methods (high confidence)",
        summary.all_three_count
    ));
    report.line(format!(
        "- {} outliers detected by at least 2 methods (moderate-high confidence)",
        summary.consensus_count
    ));
    report.line(format!(
        "- {} rows flagged by at least one method",
        summary.any_count
    ));
    report.finish(generated)
}
