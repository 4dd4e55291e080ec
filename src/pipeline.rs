//! Batch phases: run a detector, or compare the three, reading and writing
//! the flat files each phase hands to the next.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::config::PipelineConfig;
use crate::consensus::{compare, ConsensusTable, MethodFlags, OverlapSummary};
use crate::core::FeatureTable;
use crate::detection::{
    Detector, DetectorRun, DispersionDetail, IsolationDetail, IsolationForestDetector, LofDetail,
    LofDetector, Method, ZScoreDetector,
};
use crate::error::Result;
use crate::io;
use crate::report;

pub const ZSCORE_FLAGS_FILE: &str = "outliers_zscore_flags.csv";
pub const IFOREST_FLAGS_FILE: &str = "outliers_iforest_flags.csv";
pub const LOF_FLAGS_FILE: &str = "outliers_lof_flags.csv";
pub const COMPARISON_FILE: &str = "outlier_method_comparison.csv";
pub const OVERLAP_SUMMARY_FILE: &str = "outlier_overlap_summary.csv";
pub const COMPARISON_REPORT_FILE: &str = "outlier_method_comparison_report.txt";

/// Report file of a detector, e.g. `outlier_lof_report.txt`.
pub fn report_file(method: Method) -> String {
    format!("outlier_{}_report.txt", method.key())
}

/// One batch phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ZScore,
    IsolationForest,
    Lof,
    /// Compare the flag files written by the three detector phases.
    Compare,
    /// All detectors in parallel, then the comparison.
    All,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::ZScore => "zscore",
            Phase::IsolationForest => "iforest",
            Phase::Lof => "lof",
            Phase::Compare => "compare",
            Phase::All => "all",
        };
        f.write_str(name)
    }
}

/// Selected runs of all three detectors on one table.
#[derive(Debug, Clone)]
pub struct Detections {
    pub zscore: DetectorRun<f64, DispersionDetail>,
    pub isolation: DetectorRun<f64, IsolationDetail>,
    pub lof: DetectorRun<usize, LofDetail>,
}

impl Detections {
    /// Consensus of the three selected flag vectors.
    pub fn compare(&self) -> Result<ConsensusTable> {
        compare([
            self.zscore.method_flags(),
            self.isolation.method_flags(),
            self.lof.method_flags(),
        ])
    }
}

/// What a phase produced.
#[derive(Debug, Clone, Default)]
pub struct PhaseOutcome {
    /// Files written, in write order.
    pub written: Vec<PathBuf>,
    /// Overlap summary, for phases that compare.
    pub summary: Option<OverlapSummary>,
}

/// Runs phases against one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn output(&self, file: &str) -> PathBuf {
        self.config.paths.output_dir.join(file)
    }

    fn report(&self, file: &str) -> PathBuf {
        self.config.paths.report_dir.join(file)
    }

    /// Read the input table with the configured feature selection.
    pub fn load_table(&self) -> Result<FeatureTable> {
        let table = io::read_table(&self.config.paths.input, &self.config.features)?;
        info!(
            rows = table.n_rows(),
            features = table.n_features(),
            "input loaded"
        );
        Ok(table)
    }

    pub fn zscore(&self) -> ZScoreDetector {
        ZScoreDetector::new(self.config.zscore.clone())
    }

    pub fn isolation_forest(&self) -> IsolationForestDetector {
        IsolationForestDetector::new(self.config.isolation.clone())
    }

    pub fn lof(&self) -> LofDetector {
        LofDetector::new(self.config.lof.clone())
    }

    /// Run the three detectors concurrently on the same table.
    pub fn detect(&self, table: &FeatureTable) -> Result<Detections> {
        let (zscore, (isolation, lof)) = rayon::join(
            || self.zscore().run(table),
            || {
                rayon::join(
                    || self.isolation_forest().run(table),
                    || self.lof().run(table),
                )
            },
        );
        Ok(Detections {
            zscore: zscore?,
            isolation: isolation?,
            lof: lof?,
        })
    }

    /// Run one phase end to end.
    pub fn run(&self, phase: Phase) -> Result<PhaseOutcome> {
        info!(%phase, "phase started");
        let mut outcome = PhaseOutcome::default();
        match phase {
            Phase::ZScore => {
                let table = self.load_table()?;
                let run = self.zscore().run(&table)?;
                self.write_zscore(&run, &mut outcome)?;
            }
            Phase::IsolationForest => {
                let table = self.load_table()?;
                let run = self.isolation_forest().run(&table)?;
                self.write_isolation(&run, &mut outcome)?;
            }
            Phase::Lof => {
                let table = self.load_table()?;
                let run = self.lof().run(&table)?;
                self.write_lof(&run, &mut outcome)?;
            }
            Phase::Compare => {
                let zscore = io::read_flags_file(&self.output(ZSCORE_FLAGS_FILE), io::ZSCORE_ANY_COLUMN)?;
                let isolation = io::read_flags_file(
                    &self.output(IFOREST_FLAGS_FILE),
                    &Method::IsolationForest.flag_column(),
                )?;
                let lof = io::read_flags_file(&self.output(LOF_FLAGS_FILE), &Method::Lof.flag_column())?;
                let table = compare([
                    method_flags(Method::ZScore, &zscore),
                    method_flags(Method::IsolationForest, &isolation),
                    method_flags(Method::Lof, &lof),
                ])?;
                self.write_comparison(&table, &mut outcome)?;
            }
            Phase::All => {
                let table = self.load_table()?;
                let detections = self.detect(&table)?;
                self.write_zscore(&detections.zscore, &mut outcome)?;
                self.write_isolation(&detections.isolation, &mut outcome)?;
                self.write_lof(&detections.lof, &mut outcome)?;
                let consensus = detections.compare()?;
                self.write_comparison(&consensus, &mut outcome)?;
            }
        }
        info!(%phase, files = outcome.written.len(), "phase finished");
        Ok(outcome)
    }

    fn write_zscore(
        &self,
        run: &DetectorRun<f64, DispersionDetail>,
        outcome: &mut PhaseOutcome,
    ) -> Result<()> {
        let path = self.output(ZSCORE_FLAGS_FILE);
        io::write_zscore_flags(&mut io::create_writer(&path)?, run.selected())?;
        outcome.written.push(path);

        let text = report::zscore_report(run, Local::now());
        outcome.written.push(self.write_report(&report_file(Method::ZScore), &text)?);
        Ok(())
    }

    fn write_isolation(
        &self,
        run: &DetectorRun<f64, IsolationDetail>,
        outcome: &mut PhaseOutcome,
    ) -> Result<()> {
        let path = self.output(IFOREST_FLAGS_FILE);
        let selected = run.selected();
        io::write_method_flags(
            &mut io::create_writer(&path)?,
            Method::IsolationForest,
            &selected.flags,
            &selected.scores,
        )?;
        outcome.written.push(path);

        let text = report::isolation_report(
            run,
            self.config.isolation.n_estimators,
            self.config.isolation.seed,
            Local::now(),
        );
        outcome
            .written
            .push(self.write_report(&report_file(Method::IsolationForest), &text)?);
        Ok(())
    }

    fn write_lof(&self, run: &DetectorRun<usize, LofDetail>, outcome: &mut PhaseOutcome) -> Result<()> {
        let path = self.output(LOF_FLAGS_FILE);
        let selected = run.selected();
        io::write_method_flags(
            &mut io::create_writer(&path)?,
            Method::Lof,
            &selected.flags,
            &selected.scores,
        )?;
        outcome.written.push(path);

        let text = report::lof_report(run, self.config.lof.cutoff, Local::now());
        outcome.written.push(self.write_report(&report_file(Method::Lof), &text)?);
        Ok(())
    }

    fn write_comparison(&self, table: &ConsensusTable, outcome: &mut PhaseOutcome) -> Result<()> {
        let path = self.output(COMPARISON_FILE);
        io::write_consensus(&mut io::create_writer(&path)?, table)?;
        outcome.written.push(path);

        let summary = table.summary();
        let path = self.output(OVERLAP_SUMMARY_FILE);
        io::write_overlap_summary(&mut io::create_writer(&path)?, &summary)?;
        outcome.written.push(path);

        let text = report::comparison_report(&summary, Local::now());
        outcome.written.push(self.write_report(COMPARISON_REPORT_FILE, &text)?);

        outcome.summary = Some(summary);
        Ok(())
    }

    fn write_report(&self, file: &str, text: &str) -> Result<PathBuf> {
        let path = self.report(file);
        write_text(&path, text)?;
        Ok(path)
    }
}

fn method_flags(method: Method, flags: &crate::core::FlagVector) -> MethodFlags<'_> {
    MethodFlags::new(method.name(), method.key(), flags)
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}
