//! Typed audit diffs
//!
//! One variant per kind of change. Numeric constructors route non-finite or
//! missing inputs into `Diff::Error` so a failed measurement shows up as a
//! data-quality signal rather than a bogus delta.

use serde::Serialize;
use thiserror::Error;

/// Precondition violations raised while building diffs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiffError {
    #[error("item delta for {audit_id}.{item_key} has neither a base nor a compare row index")]
    MissingItemIndex { audit_id: String, item_key: String },

    #[error("audit ids did not match: {base} != {compare}")]
    AuditIdMismatch { base: String, compare: String },
}

/// Result type for diff construction
pub type Result<T> = std::result::Result<T, DiffError>;

/// Discriminant of [`Diff`], also used as the attempted kind of an error diff
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum DiffKind {
    Error,
    Score,
    NumericValue,
    DisplayValue,
    ItemCount,
    ItemAddition,
    ItemRemoval,
    ItemDelta,
}

/// How one audit changed between a base and a compare report
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Diff {
    /// A numeric comparison was attempted but one side was missing or non-finite
    Error {
        audit_id: String,
        attempted_type: DiffKind,
        base_value: Option<f64>,
        compare_value: Option<f64>,
    },
    Score {
        audit_id: String,
        base_value: f64,
        compare_value: f64,
    },
    NumericValue {
        audit_id: String,
        base_value: f64,
        compare_value: f64,
    },
    DisplayValue {
        audit_id: String,
        base_value: String,
        compare_value: String,
    },
    ItemCount {
        audit_id: String,
        base_value: usize,
        compare_value: usize,
    },
    ItemAddition {
        audit_id: String,
        compare_item_index: usize,
    },
    ItemRemoval {
        audit_id: String,
        base_item_index: usize,
    },
    /// Change of one numeric cell of a matched (or synthesized) row
    ItemDelta {
        audit_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        base_item_index: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        compare_item_index: Option<usize>,
        item_key: String,
        base_value: f64,
        compare_value: f64,
    },
}

/// Delta measures for numeric diffs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaStats {
    pub delta: f64,
    pub absolute_delta: f64,
    /// `delta / |base|`; a change away from a zero base counts as 100%
    pub percent_delta: f64,
    pub percent_absolute_delta: f64,
}

impl DeltaStats {
    pub fn new(base: f64, compare: f64) -> Self {
        let delta = compare - base;
        let percent_delta = if base == 0.0 {
            if delta == 0.0 {
                0.0
            } else {
                delta.signum()
            }
        } else {
            delta / base.abs()
        };

        Self {
            delta,
            absolute_delta: delta.abs(),
            percent_delta,
            percent_absolute_delta: percent_delta.abs(),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl Diff {
    fn checked(
        audit_id: &str,
        attempted_type: DiffKind,
        base: Option<f64>,
        compare: Option<f64>,
        build: impl FnOnce(String, f64, f64) -> Diff,
    ) -> Diff {
        match (finite(base), finite(compare)) {
            (Some(b), Some(c)) => build(audit_id.to_string(), b, c),
            _ => Diff::Error {
                audit_id: audit_id.to_string(),
                attempted_type,
                base_value: base,
                compare_value: compare,
            },
        }
    }

    pub fn score(audit_id: &str, base: Option<f64>, compare: Option<f64>) -> Diff {
        Self::checked(audit_id, DiffKind::Score, base, compare, |audit_id, b, c| {
            Diff::Score {
                audit_id,
                base_value: b,
                compare_value: c,
            }
        })
    }

    pub fn numeric_value(audit_id: &str, base: Option<f64>, compare: Option<f64>) -> Diff {
        Self::checked(
            audit_id,
            DiffKind::NumericValue,
            base,
            compare,
            |audit_id, b, c| Diff::NumericValue {
                audit_id,
                base_value: b,
                compare_value: c,
            },
        )
    }

    pub fn display_value(audit_id: &str, base: &str, compare: &str) -> Diff {
        Diff::DisplayValue {
            audit_id: audit_id.to_string(),
            base_value: base.to_string(),
            compare_value: compare.to_string(),
        }
    }

    pub fn item_count(audit_id: &str, base: usize, compare: usize) -> Diff {
        Diff::ItemCount {
            audit_id: audit_id.to_string(),
            base_value: base,
            compare_value: compare,
        }
    }

    pub fn item_addition(audit_id: &str, compare_item_index: usize) -> Diff {
        Diff::ItemAddition {
            audit_id: audit_id.to_string(),
            compare_item_index,
        }
    }

    pub fn item_removal(audit_id: &str, base_item_index: usize) -> Diff {
        Diff::ItemRemoval {
            audit_id: audit_id.to_string(),
            base_item_index,
        }
    }

    /// Cell-level delta; at least one row index is required
    pub fn item_delta(
        audit_id: &str,
        base_item_index: Option<usize>,
        compare_item_index: Option<usize>,
        item_key: &str,
        base: Option<f64>,
        compare: Option<f64>,
    ) -> Result<Diff> {
        if base_item_index.is_none() && compare_item_index.is_none() {
            return Err(DiffError::MissingItemIndex {
                audit_id: audit_id.to_string(),
                item_key: item_key.to_string(),
            });
        }

        Ok(Self::checked(
            audit_id,
            DiffKind::ItemDelta,
            base,
            compare,
            |audit_id, b, c| Diff::ItemDelta {
                audit_id,
                base_item_index,
                compare_item_index,
                item_key: item_key.to_string(),
                base_value: b,
                compare_value: c,
            },
        ))
    }

    pub fn kind(&self) -> DiffKind {
        match self {
            Diff::Error { .. } => DiffKind::Error,
            Diff::Score { .. } => DiffKind::Score,
            Diff::NumericValue { .. } => DiffKind::NumericValue,
            Diff::DisplayValue { .. } => DiffKind::DisplayValue,
            Diff::ItemCount { .. } => DiffKind::ItemCount,
            Diff::ItemAddition { .. } => DiffKind::ItemAddition,
            Diff::ItemRemoval { .. } => DiffKind::ItemRemoval,
            Diff::ItemDelta { .. } => DiffKind::ItemDelta,
        }
    }

    pub fn audit_id(&self) -> &str {
        match self {
            Diff::Error { audit_id, .. }
            | Diff::Score { audit_id, .. }
            | Diff::NumericValue { audit_id, .. }
            | Diff::DisplayValue { audit_id, .. }
            | Diff::ItemCount { audit_id, .. }
            | Diff::ItemAddition { audit_id, .. }
            | Diff::ItemRemoval { audit_id, .. }
            | Diff::ItemDelta { audit_id, .. } => audit_id,
        }
    }

    /// Delta measures for the numeric kinds, `None` otherwise
    pub fn delta_stats(&self) -> Option<DeltaStats> {
        match self {
            Diff::Score {
                base_value,
                compare_value,
                ..
            }
            | Diff::NumericValue {
                base_value,
                compare_value,
                ..
            }
            | Diff::ItemDelta {
                base_value,
                compare_value,
                ..
            } => Some(DeltaStats::new(*base_value, *compare_value)),
            Diff::ItemCount {
                base_value,
                compare_value,
                ..
            } => Some(DeltaStats::new(*base_value as f64, *compare_value as f64)),
            Diff::Error { .. }
            | Diff::DisplayValue { .. }
            | Diff::ItemAddition { .. }
            | Diff::ItemRemoval { .. } => None,
        }
    }

    /// Row indices this diff refers to, as `(base, compare)`
    pub fn item_indices(&self) -> Option<(Option<usize>, Option<usize>)> {
        match self {
            Diff::ItemAddition {
                compare_item_index,
                ..
            } => Some((None, Some(*compare_item_index))),
            Diff::ItemRemoval {
                base_item_index, ..
            } => Some((Some(*base_item_index), None)),
            Diff::ItemDelta {
                base_item_index,
                compare_item_index,
                ..
            } => Some((*base_item_index, *compare_item_index)),
            _ => None,
        }
    }
}
