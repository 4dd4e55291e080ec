//! End-to-end scenarios: a tight cluster with ten far outliers, run through
//! the detectors, the consensus engine and the CSV phases.

use std::fs;
use std::path::Path;

use outlier_consensus::config::PipelineConfig;
use outlier_consensus::core::{FeatureTable, FeatureTableBuilder};
use outlier_consensus::detection::{Detector, IsolationForestDetector, LofDetector, ZScoreDetector};
use outlier_consensus::pipeline::{
    Phase, Pipeline, COMPARISON_FILE, IFOREST_FLAGS_FILE, LOF_FLAGS_FILE, OVERLAP_SUMMARY_FILE,
    ZSCORE_FLAGS_FILE,
};
use tempfile::TempDir;

const FEATURES: [&str; 4] = [
    "Global_active_power",
    "Global_reactive_power",
    "Voltage",
    "Global_intensity",
];
const N_CLUSTER: usize = 990;
const N_OUTLIERS: usize = 10;

/// Value of feature `j` at row `i`.
///
/// Rows 0..990 repeat 18 nearby lattice points 55 times each; rows 990..1000
/// sit far away in every feature at once.
fn value(i: usize, j: usize) -> f64 {
    if i < N_CLUSTER {
        let point = i % 18;
        1.0 + 0.01 * point as f64 + 0.1 * j as f64
    } else {
        let r = i - N_CLUSTER;
        100.0 + 10.0 * r as f64 + j as f64
    }
}

fn scenario_table() -> FeatureTable {
    let n = N_CLUSTER + N_OUTLIERS;
    FEATURES
        .iter()
        .enumerate()
        .fold(FeatureTableBuilder::new(), |builder, (j, name)| {
            builder.column(*name, (0..n).map(|i| value(i, j)).collect())
        })
        .build()
        .unwrap()
}

fn write_scenario_csv(path: &Path) {
    let mut text = format!("DateTime,{},DayName\n", FEATURES.join(","));
    for i in 0..N_CLUSTER + N_OUTLIERS {
        let cells: Vec<String> = (0..FEATURES.len()).map(|j| value(i, j).to_string()).collect();
        text.push_str(&format!(
            "2007-01-01 {:02}:{:02}:00,{},Monday\n",
            (i / 60) % 24,
            i % 60,
            cells.join(",")
        ));
    }
    fs::write(path, text).unwrap();
}

fn pipeline_in(dir: &Path, input: &Path) -> Pipeline {
    let mut config = PipelineConfig::default();
    config.paths.input = input.to_path_buf();
    config.paths.output_dir = dir.join("outputs");
    config.paths.report_dir = dir.join("reports");
    Pipeline::new(config)
}

fn outlier_rows() -> Vec<usize> {
    (N_CLUSTER..N_CLUSTER + N_OUTLIERS).collect()
}

#[test]
fn zscore_flags_exactly_the_far_rows() {
    let run = ZScoreDetector::default().run(&scenario_table()).unwrap();
    assert_eq!(run.selection.parameter, 3.0);
    assert_eq!(run.selected().flags.outlier_positions(), outlier_rows());
}

#[test]
fn lof_flags_exactly_the_far_rows() {
    let run = LofDetector::default().run(&scenario_table()).unwrap();
    assert_eq!(run.selection.parameter, 20);
    assert_eq!(run.selected().flags.outlier_positions(), outlier_rows());
}

#[test]
fn isolation_forest_flags_every_far_row() {
    let run = IsolationForestDetector::default()
        .run(&scenario_table())
        .unwrap();
    let flags = &run.selected().flags;
    for row in outlier_rows() {
        assert_eq!(flags.get(row), Some(true), "row {row} not flagged");
    }
    assert!(flags.count() >= N_OUTLIERS);
}

#[test]
fn all_three_agree_on_the_far_rows() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let detections = pipeline.detect(&scenario_table()).unwrap();
    let table = detections.compare().unwrap();
    let summary = table.summary();

    assert_eq!(table.all_three_count(), 10);
    assert_eq!(table.consensus_count(), 10);
    assert!(summary.reconciles());
    assert_eq!(summary.per_method[0], 10);
    assert_eq!(summary.per_method[2], 10);

    let unanimous: Vec<usize> = table
        .records()
        .iter()
        .filter(|r| r.all_three)
        .map(|r| r.row)
        .collect();
    assert_eq!(unanimous, outlier_rows());
}

#[test]
fn rerun_writes_identical_tables() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cleaned.csv");
    write_scenario_csv(&input);

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    pipeline_in(&first, &input).run(Phase::All).unwrap();
    pipeline_in(&second, &input).run(Phase::All).unwrap();

    for file in [
        ZSCORE_FLAGS_FILE,
        IFOREST_FLAGS_FILE,
        LOF_FLAGS_FILE,
        COMPARISON_FILE,
        OVERLAP_SUMMARY_FILE,
    ] {
        let a = fs::read(first.join("outputs").join(file)).unwrap();
        let b = fs::read(second.join("outputs").join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between runs");
    }
}

#[test]
fn separate_phases_match_the_combined_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cleaned.csv");
    write_scenario_csv(&input);

    let staged = pipeline_in(&dir.path().join("staged"), &input);
    for phase in [Phase::ZScore, Phase::IsolationForest, Phase::Lof] {
        staged.run(phase).unwrap();
    }
    let outcome = staged.run(Phase::Compare).unwrap();
    let summary = outcome.summary.unwrap();
    assert_eq!(summary.all_three_count, 10);
    assert_eq!(summary.consensus_count, 10);

    let combined = pipeline_in(&dir.path().join("combined"), &input);
    combined.run(Phase::All).unwrap();

    let staged_table = fs::read_to_string(dir.path().join("staged/outputs").join(COMPARISON_FILE)).unwrap();
    let combined_table =
        fs::read_to_string(dir.path().join("combined/outputs").join(COMPARISON_FILE)).unwrap();
    assert_eq!(staged_table, combined_table);
    assert!(staged_table.starts_with(
        "row,outlier_zscore,outlier_iforest,outlier_lof,vote_count,consensus,all_three\n"
    ));
}

#[test]
fn phase_writes_flags_and_report() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cleaned.csv");
    write_scenario_csv(&input);

    let outcome = pipeline_in(dir.path(), &input).run(Phase::ZScore).unwrap();
    assert_eq!(outcome.written.len(), 2);

    let flags = fs::read_to_string(dir.path().join("outputs").join(ZSCORE_FLAGS_FILE)).unwrap();
    let header = flags.lines().next().unwrap();
    assert_eq!(
        header,
        "row,outlier_Global_active_power,outlier_Global_reactive_power,outlier_Voltage,\
         outlier_Global_intensity,outlier_any,max_abs_zscore"
    );
    assert_eq!(flags.lines().count(), 1 + N_CLUSTER + N_OUTLIERS);

    let report = fs::read_to_string(dir.path().join("reports/outlier_zscore_report.txt")).unwrap();
    assert!(report.contains("SELECTED Z-SCORE: |Z| > 3"));
}

#[test]
fn compare_without_flag_files_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cleaned.csv");
    let err = pipeline_in(dir.path(), &input).run(Phase::Compare).unwrap_err();
    assert!(err.to_string().contains(ZSCORE_FLAGS_FILE));
}

#[test]
fn config_file_drives_the_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cleaned.csv");
    write_scenario_csv(&input);

    let config_path = dir.path().join("pipeline.toml");
    fs::write(
        &config_path,
        format!(
            "[paths]\ninput = {:?}\noutput_dir = {:?}\nreport_dir = {:?}\n\n\
             [features]\ninclude = [\"Voltage\", \"Global_intensity\"]\n",
            input.display().to_string(),
            dir.path().join("out").display().to_string(),
            dir.path().join("rep").display().to_string(),
        ),
    )
    .unwrap();

    let config = PipelineConfig::load(Some(&config_path), None).unwrap();
    let pipeline = Pipeline::new(config);
    let table = pipeline.load_table().unwrap();
    assert_eq!(table.feature_names(), &["Voltage", "Global_intensity"]);

    pipeline.run(Phase::Lof).unwrap();
    assert!(dir.path().join("out").join(LOF_FLAGS_FILE).exists());
    assert!(dir.path().join("rep/outlier_lof_report.txt").exists());
}
