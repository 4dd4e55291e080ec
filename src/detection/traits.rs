//! Detector trait defining the common interface for all outlier methods.

use tracing::{debug, info, warn};

use super::selection::{ParamValue, Selection};
use super::sweep::{CandidateFailure, Sweep, SweepResult};
use super::Method;
use crate::consensus::MethodFlags;
use crate::core::FeatureTable;
use crate::error::{OutlierError, Result};

/// Common interface for the outlier detectors.
///
/// A detector evaluates one parameter value at a time, sweeps a list of
/// candidates and picks a single operating point from its sweep. The
/// consensus engine only sees the flags a [`DetectorRun`] exposes.
pub trait Detector {
    /// The swept parameter (threshold, contamination, neighbour count).
    type Param: ParamValue;
    /// Detector-specific diagnostics kept with every sweep result.
    type Detail: Clone + std::fmt::Debug;

    /// Which method this detector implements.
    fn method(&self) -> Method;

    /// Configured candidate values, in sweep order.
    fn candidates(&self) -> &[Self::Param];

    /// Evaluate a single candidate.
    fn evaluate(
        &self,
        table: &FeatureTable,
        parameter: Self::Param,
    ) -> Result<SweepResult<Self::Param, Self::Detail>>;

    /// Pick the operating point from a sweep.
    fn select(&self, sweep: &Sweep<Self::Param, Self::Detail>) -> Result<Selection<Self::Param>>;

    /// Evaluate every candidate.
    ///
    /// A candidate with an out-of-range parameter is recorded as a failure and
    /// the sweep continues; any other error aborts the sweep.
    fn sweep(
        &self,
        table: &FeatureTable,
        candidates: &[Self::Param],
    ) -> Result<Sweep<Self::Param, Self::Detail>> {
        let mut sweep = Sweep::new(self.method());
        for &parameter in candidates {
            match self.evaluate(table, parameter) {
                Ok(result) => {
                    debug!(
                        method = self.method().name(),
                        %parameter,
                        outliers = result.outlier_count,
                        pct = result.outlier_percentage,
                        "candidate evaluated"
                    );
                    sweep.results.push(result);
                }
                Err(error) if error.is_candidate_local() => {
                    warn!(method = self.method().name(), %parameter, %error, "candidate skipped");
                    sweep.failures.push(CandidateFailure { parameter, error });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(sweep)
    }

    /// Sweep the configured candidates and select an operating point.
    fn run(&self, table: &FeatureTable) -> Result<DetectorRun<Self::Param, Self::Detail>> {
        let sweep = self.sweep(table, self.candidates())?;
        if sweep.is_empty() {
            return Err(OutlierError::NoViableCandidate {
                method: self.method().name().to_string(),
            });
        }

        let selection = self.select(&sweep)?;
        let selected = sweep.position(selection.parameter).ok_or_else(|| {
            OutlierError::NoViableCandidate {
                method: self.method().name().to_string(),
            }
        })?;

        let run = DetectorRun {
            sweep,
            selection,
            selected,
        };
        info!(
            method = self.method().name(),
            parameter = %run.selection.parameter,
            reason = %run.selection.reason,
            outliers = run.selected().outlier_count,
            pct = run.selected().outlier_percentage,
            "operating point selected"
        );
        Ok(run)
    }
}

/// A finished sweep together with its selected operating point.
#[derive(Debug, Clone)]
pub struct DetectorRun<P, D> {
    pub sweep: Sweep<P, D>,
    pub selection: Selection<P>,
    selected: usize,
}

impl<P, D> DetectorRun<P, D> {
    pub fn method(&self) -> Method {
        self.sweep.method
    }

    /// The sweep result at the selected operating point.
    pub fn selected(&self) -> &SweepResult<P, D> {
        &self.sweep.results[self.selected]
    }

    /// Selected flags labelled for the consensus engine.
    pub fn method_flags(&self) -> MethodFlags<'_> {
        MethodFlags::new(
            self.method().name(),
            self.method().key(),
            &self.selected().flags,
        )
    }
}
