//! Operating-point selection policies.
//!
//! Each policy is a pure function over a sequence of sweep results and always
//! returns a parameter when at least one candidate succeeded. A policy that
//! finds nothing acceptable falls back to the detector's documented default.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::sweep::SweepResult;

/// Numeric view of a swept parameter.
pub trait ParamValue: Copy + PartialEq + fmt::Debug + fmt::Display {
    fn as_f64(self) -> f64;
}

impl ParamValue for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

impl ParamValue for usize {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// Acceptable range of flagged-row percentages, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceBand {
    pub min_pct: f64,
    pub max_pct: f64,
}

/// Where a flagged percentage lies relative to an acceptance band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandPosition {
    Below,
    Within,
    Above,
}

impl AcceptanceBand {
    pub fn new(min_pct: f64, max_pct: f64) -> Self {
        Self { min_pct, max_pct }
    }

    pub fn position(&self, pct: f64) -> BandPosition {
        if pct < self.min_pct {
            BandPosition::Below
        } else if pct > self.max_pct {
            BandPosition::Above
        } else {
            BandPosition::Within
        }
    }

    pub fn contains(&self, pct: f64) -> bool {
        self.position(pct) == BandPosition::Within
    }
}

/// Why a policy picked its parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionReason {
    /// Exactly one candidate landed in the acceptance band.
    OnlyInBand,
    /// Several candidates qualified, including the default.
    DefaultInBand,
    /// Several candidates qualified; the most conservative one won.
    LowestInBand,
    /// No candidate qualified; the default was kept.
    DefaultFallback,
    /// No candidate qualified and the default failed; the nearest candidate was used.
    NearestToDefault,
    /// Largest score separation.
    MaxSeparation,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SelectionReason::OnlyInBand => "only candidate inside the acceptance band",
            SelectionReason::DefaultInBand => {
                "several candidates inside the band; canonical default kept"
            }
            SelectionReason::LowestInBand => {
                "several candidates inside the band; lowest flagged share kept"
            }
            SelectionReason::DefaultFallback => "no candidate inside the band; canonical default kept",
            SelectionReason::NearestToDefault => {
                "no candidate inside the band and default unavailable; nearest candidate kept"
            }
            SelectionReason::MaxSeparation => "largest inlier/outlier score separation",
        };
        f.write_str(text)
    }
}

/// A chosen operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<P> {
    pub parameter: P,
    pub reason: SelectionReason,
}

/// Pick a parameter whose flagged percentage falls inside `band`.
///
/// * one qualifying candidate: it wins;
/// * several: `default` if it qualifies, otherwise the one flagging the fewest
///   rows (ties go to the larger parameter);
/// * none: `default`, or the successful candidate nearest to it when the
///   default itself was not evaluated.
///
/// Returns `None` only when `results` is empty.
pub fn select_in_band<P: ParamValue, D>(
    results: &[SweepResult<P, D>],
    band: AcceptanceBand,
    default: P,
) -> Option<Selection<P>> {
    if results.is_empty() {
        return None;
    }

    let qualifying: Vec<&SweepResult<P, D>> = results
        .iter()
        .filter(|r| band.contains(r.outlier_percentage))
        .collect();

    let has_default = |rs: &[&SweepResult<P, D>]| rs.iter().any(|r| r.parameter == default);

    match qualifying.len() {
        0 => {
            if results.iter().any(|r| r.parameter == default) {
                Some(Selection {
                    parameter: default,
                    reason: SelectionReason::DefaultFallback,
                })
            } else {
                nearest_to(results, default).map(|parameter| Selection {
                    parameter,
                    reason: SelectionReason::NearestToDefault,
                })
            }
        }
        1 => Some(Selection {
            parameter: qualifying[0].parameter,
            reason: SelectionReason::OnlyInBand,
        }),
        _ if has_default(&qualifying) => Some(Selection {
            parameter: default,
            reason: SelectionReason::DefaultInBand,
        }),
        _ => qualifying
            .iter()
            .min_by(|a, b| {
                a.outlier_percentage
                    .total_cmp(&b.outlier_percentage)
                    .then(b.parameter.as_f64().total_cmp(&a.parameter.as_f64()))
            })
            .map(|r| Selection {
                parameter: r.parameter,
                reason: SelectionReason::LowestInBand,
            }),
    }
}

/// Pick the parameter with the largest score separation.
///
/// Separations within `1e-12` of each other tie; ties go to the smaller
/// parameter.
pub fn select_max_separation<P: ParamValue, D>(
    results: &[SweepResult<P, D>],
) -> Option<Selection<P>> {
    const TIE_TOLERANCE: f64 = 1e-12;

    let mut best: Option<&SweepResult<P, D>> = None;
    for result in results {
        best = match best {
            None => Some(result),
            Some(current) => {
                let gap = result.separation - current.separation;
                let better = gap > TIE_TOLERANCE
                    || (gap.abs() <= TIE_TOLERANCE
                        && result.parameter.as_f64() < current.parameter.as_f64());
                Some(if better { result } else { current })
            }
        };
    }

    best.map(|r| Selection {
        parameter: r.parameter,
        reason: SelectionReason::MaxSeparation,
    })
}

fn nearest_to<P: ParamValue, D>(results: &[SweepResult<P, D>], target: P) -> Option<P> {
    results
        .iter()
        .min_by(|a, b| {
            let da = (a.parameter.as_f64() - target.as_f64()).abs();
            let db = (b.parameter.as_f64() - target.as_f64()).abs();
            da.total_cmp(&db)
                .then(a.parameter.as_f64().total_cmp(&b.parameter.as_f64()))
        })
        .map(|r| r.parameter)
}
