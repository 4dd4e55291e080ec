//! Cross-method consensus.
//!
//! Combines the selected flags of the three detectors row by row: vote
//! count, `consensus` (at least two votes), `all_three` (three votes) and the
//! seven mutually exclusive overlap categories. Every flagged row falls into
//! exactly one category; rows nobody flagged fall into none.

use tracing::{debug, info};

use crate::core::{percentage, FlagVector};
use crate::error::{OutlierError, Result};

/// Number of methods compared.
pub const N_METHODS: usize = 3;

/// The selected flags of one method, labelled for the comparison.
#[derive(Debug, Clone, Copy)]
pub struct MethodFlags<'a> {
    pub name: &'a str,
    pub key: &'a str,
    pub flags: &'a FlagVector,
}

impl<'a> MethodFlags<'a> {
    pub fn new(name: &'a str, key: &'a str, flags: &'a FlagVector) -> Self {
        Self { name, key, flags }
    }
}

/// Name and key of a compared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodLabel {
    pub name: String,
    pub key: String,
}

impl MethodLabel {
    /// Flag column name in the comparison table.
    pub fn flag_column(&self) -> String {
        format!("outlier_{}", self.key)
    }
}

/// One row of the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusRecord {
    /// Row index shared by all three flag vectors.
    pub row: usize,
    /// Flags in method order.
    pub flags: [bool; N_METHODS],
    pub vote_count: u8,
    pub consensus: bool,
    pub all_three: bool,
}

impl ConsensusRecord {
    fn new(row: usize, flags: [bool; N_METHODS]) -> Self {
        let vote_count = flags.iter().filter(|&&f| f).count() as u8;
        Self {
            row,
            flags,
            vote_count,
            consensus: vote_count >= 2,
            all_three: vote_count as usize == N_METHODS,
        }
    }

    /// Membership bitmask; bit `i` is set when method `i` flagged the row.
    pub fn mask(&self) -> u8 {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &f)| f)
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }

    /// Overlap category of the row, `None` when no method flagged it.
    pub fn category(&self) -> Option<OverlapCategory> {
        OverlapCategory::from_mask(self.mask())
    }
}

/// One of the seven non-empty method subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlapCategory {
    mask: u8,
}

impl OverlapCategory {
    /// All categories in reporting order: singles, pairs, then all three.
    pub const ALL: [OverlapCategory; 7] = [
        OverlapCategory { mask: 0b001 },
        OverlapCategory { mask: 0b010 },
        OverlapCategory { mask: 0b100 },
        OverlapCategory { mask: 0b011 },
        OverlapCategory { mask: 0b101 },
        OverlapCategory { mask: 0b110 },
        OverlapCategory { mask: 0b111 },
    ];

    pub fn from_mask(mask: u8) -> Option<Self> {
        (1..=0b111).contains(&mask).then_some(Self { mask })
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    /// Positions of the member methods.
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        (0..N_METHODS).filter(move |i| self.mask & (1 << i) != 0)
    }

    /// Display label, e.g. `Only LOF` or `Z-Score + Isolation Forest`.
    pub fn label(&self, methods: &[MethodLabel; N_METHODS]) -> String {
        let names: Vec<&str> = self.members().map(|i| methods[i].name.as_str()).collect();
        match names.len() {
            1 => format!("Only {}", names[0]),
            N_METHODS => format!("All {N_METHODS} Methods"),
            _ => names.join(" + "),
        }
    }

    /// Machine key, e.g. `only_lof` or `zscore_iforest`.
    pub fn key(&self, methods: &[MethodLabel; N_METHODS]) -> String {
        let keys: Vec<&str> = self.members().map(|i| methods[i].key.as_str()).collect();
        match keys.len() {
            1 => format!("only_{}", keys[0]),
            N_METHODS => "all_three".to_string(),
            _ => keys.join("_"),
        }
    }
}

/// Row-aligned comparison of three methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusTable {
    methods: [MethodLabel; N_METHODS],
    records: Vec<ConsensusRecord>,
}

impl ConsensusTable {
    pub fn methods(&self) -> &[MethodLabel; N_METHODS] {
        &self.methods
    }

    pub fn records(&self) -> &[ConsensusRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows flagged by at least two methods.
    pub fn consensus_count(&self) -> usize {
        self.records.iter().filter(|r| r.consensus).count()
    }

    /// Rows flagged by every method.
    pub fn all_three_count(&self) -> usize {
        self.records.iter().filter(|r| r.all_three).count()
    }

    /// Rows flagged by any method.
    pub fn any_count(&self) -> usize {
        self.records.iter().filter(|r| r.vote_count > 0).count()
    }

    /// Aggregate counts and percentages.
    pub fn summary(&self) -> OverlapSummary {
        let total_rows = self.records.len();

        let mut by_mask = [0usize; 8];
        let mut per_method = [0usize; N_METHODS];
        for record in &self.records {
            by_mask[record.mask() as usize] += 1;
            for (count, &flag) in per_method.iter_mut().zip(&record.flags) {
                *count += usize::from(flag);
            }
        }

        let categories = OverlapCategory::ALL
            .iter()
            .map(|&category| {
                let count = by_mask[category.mask() as usize];
                CategoryCount {
                    label: category.label(&self.methods),
                    key: category.key(&self.methods),
                    category,
                    count,
                    percentage: percentage(count, total_rows),
                }
            })
            .collect();

        OverlapSummary {
            total_rows,
            methods: self.methods.clone(),
            categories,
            per_method,
            any_count: self.any_count(),
            consensus_count: self.consensus_count(),
            all_three_count: self.all_three_count(),
        }
    }
}

/// Count of rows in one overlap category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: OverlapCategory,
    pub label: String,
    pub key: String,
    pub count: usize,
    pub percentage: f64,
}

/// Category counts plus headline figures of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapSummary {
    pub total_rows: usize,
    pub methods: [MethodLabel; N_METHODS],
    /// The seven categories in reporting order.
    pub categories: Vec<CategoryCount>,
    /// Flagged rows per method, in method order.
    pub per_method: [usize; N_METHODS],
    pub any_count: usize,
    pub consensus_count: usize,
    pub all_three_count: usize,
}

impl OverlapSummary {
    /// Sum of the seven category counts.
    pub fn categorized(&self) -> usize {
        self.categories.iter().map(|c| c.count).sum()
    }

    /// True when the categories partition the flagged rows exactly.
    pub fn reconciles(&self) -> bool {
        self.categorized() == self.any_count
    }

    pub fn consensus_percentage(&self) -> f64 {
        percentage(self.consensus_count, self.total_rows)
    }

    pub fn all_three_percentage(&self) -> f64 {
        percentage(self.all_three_count, self.total_rows)
    }

    pub fn method_percentage(&self, position: usize) -> f64 {
        self.per_method
            .get(position)
            .map_or(0.0, |&count| percentage(count, self.total_rows))
    }
}

/// Combine three aligned flag vectors.
///
/// All vectors must have the same length and the same row index as the
/// first; anything else is an upstream wiring error and is rejected.
pub fn compare(methods: [MethodFlags<'_>; N_METHODS]) -> Result<ConsensusTable> {
    let reference = methods[0].flags;
    for method in &methods[1..] {
        if method.flags.len() != reference.len() {
            return Err(OutlierError::AlignmentMismatch {
                method: method.name.to_string(),
                expected: reference.len(),
                got: method.flags.len(),
            });
        }
        if let Some(position) = reference
            .index()
            .iter()
            .zip(method.flags.index())
            .position(|(a, b)| a != b)
        {
            return Err(OutlierError::RowOrderMismatch {
                method: method.name.to_string(),
                position,
                expected: reference.index()[position],
                got: method.flags.index()[position],
            });
        }
    }

    let records = (0..reference.len())
        .map(|i| {
            let mut flags = [false; N_METHODS];
            for (flag, method) in flags.iter_mut().zip(&methods) {
                *flag = method.flags.as_slice()[i];
            }
            ConsensusRecord::new(reference.index()[i], flags)
        })
        .collect();

    let table = ConsensusTable {
        methods: methods.map(|m| MethodLabel {
            name: m.name.to_string(),
            key: m.key.to_string(),
        }),
        records,
    };

    let summary = table.summary();
    if !summary.reconciles() {
        return Err(OutlierError::ReconciliationFailed {
            categorized: summary.categorized(),
            flagged: summary.any_count,
        });
    }
    debug!(rows = table.len(), "overlap categories reconciled");
    info!(
        rows = table.len(),
        flagged = summary.any_count,
        consensus = summary.consensus_count,
        all_three = summary.all_three_count,
        "methods compared"
    );

    Ok(table)
}
