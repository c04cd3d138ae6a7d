//! Diff ranking for presentation
//!
//! Severity is only a sort key. Bands guarantee that an error outranks any
//! score change, which outranks any numeric change, which outranks any row
//! change; the delta magnitude orders diffs within a band.

use crate::diff::classifier::AuditDiffs;
use crate::diff::matcher::{zip_items, IndexedItem};
use crate::diff::types::Diff;
use crate::report::AuditResult;
use serde::Serialize;
use std::cmp::Ordering;

/// Summary label of one detail-table row
///
/// Declaration order is the presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowLabel {
    Added,
    Worse,
    Ambiguous,
    Removed,
    Better,
    NoChange,
}

/// Direction of a single diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffLabel {
    Improvement,
    Neutral,
    Regression,
}

const ERROR_BAND: f64 = 5.0;
const SCORE_BAND: f64 = 4.0;
const NUMERIC_VALUE_BAND: f64 = 3.0;
const ITEM_COUNT_BAND: f64 = 2.0;
const ITEM_BAND: f64 = 1.0;

/// Map a non-negative magnitude into [0, 1) so it never leaves its band
fn within_band(magnitude: f64) -> f64 {
    let magnitude = if magnitude.is_finite() {
        magnitude.abs()
    } else {
        0.0
    };
    magnitude / (1.0 + magnitude)
}

/// Sort key for a diff; higher is more severe
pub fn severity(diff: &Diff) -> f64 {
    let stats = diff.delta_stats();
    match diff {
        Diff::Error { .. } => ERROR_BAND,
        Diff::Score { .. } => {
            SCORE_BAND + within_band(stats.map_or(0.0, |s| s.absolute_delta))
        }
        Diff::NumericValue { .. } => {
            NUMERIC_VALUE_BAND + within_band(stats.map_or(0.0, |s| s.percent_absolute_delta))
        }
        Diff::ItemCount { .. } => {
            ITEM_COUNT_BAND + within_band(stats.map_or(0.0, |s| s.percent_absolute_delta))
        }
        Diff::ItemAddition { .. } | Diff::ItemRemoval { .. } => ITEM_BAND + within_band(1.0),
        Diff::ItemDelta { .. } => {
            ITEM_BAND + within_band(stats.map_or(0.0, |s| s.percent_absolute_delta))
        }
        Diff::DisplayValue { .. } => 0.0,
    }
}

/// Whether a diff is good news, bad news, or neither
///
/// Scores are higher-is-better; every other numeric kind is lower-is-better.
pub fn diff_label(diff: &Diff) -> DiffLabel {
    let delta = diff.delta_stats().map_or(0.0, |s| s.delta);
    match diff {
        Diff::Error { .. } | Diff::ItemAddition { .. } => DiffLabel::Regression,
        Diff::ItemRemoval { .. } => DiffLabel::Improvement,
        Diff::Score { .. } => {
            if delta < 0.0 {
                DiffLabel::Regression
            } else if delta > 0.0 {
                DiffLabel::Improvement
            } else {
                DiffLabel::Neutral
            }
        }
        Diff::NumericValue { .. } | Diff::ItemCount { .. } | Diff::ItemDelta { .. } => {
            if delta > 0.0 {
                DiffLabel::Regression
            } else if delta < 0.0 {
                DiffLabel::Improvement
            } else {
                DiffLabel::Neutral
            }
        }
        Diff::DisplayValue { .. } => DiffLabel::Neutral,
    }
}

/// Label for the diffs belonging to one row
pub fn row_label(diffs: &[Diff]) -> RowLabel {
    let mut added = false;
    let mut removed = false;
    let mut increased = 0usize;
    let mut decreased = 0usize;

    for diff in diffs {
        match diff {
            Diff::ItemAddition { .. } => added = true,
            Diff::ItemRemoval { .. } => removed = true,
            Diff::ItemDelta {
                base_value,
                compare_value,
                ..
            } => match compare_value.total_cmp(base_value) {
                Ordering::Greater => increased += 1,
                Ordering::Less => decreased += 1,
                Ordering::Equal => {}
            },
            _ => {}
        }
    }

    if added {
        RowLabel::Added
    } else if removed {
        RowLabel::Removed
    } else {
        match (increased > 0, decreased > 0) {
            (true, false) => RowLabel::Worse,
            (false, true) => RowLabel::Better,
            (true, true) => RowLabel::Ambiguous,
            (false, false) => RowLabel::NoChange,
        }
    }
}

/// A detail-table row with its diffs, label and sort severity
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow<'a> {
    pub key: String,
    pub base: Option<IndexedItem<'a>>,
    pub compare: Option<IndexedItem<'a>>,
    pub label: RowLabel,
    /// Most severe diff of the row, 0 when it has none
    pub severity: f64,
    pub diffs: Vec<Diff>,
}

fn belongs_to_row(diff: &Diff, base: Option<usize>, compare: Option<usize>) -> bool {
    match diff.item_indices() {
        Some((diff_base, diff_compare)) => {
            (diff_base.is_some() || diff_compare.is_some())
                && (diff_base.is_none() || diff_base == base)
                && (diff_compare.is_none() || diff_compare == compare)
        }
        None => false,
    }
}

/// Presentation order: label, then severity (descending), then identity key
///
/// Row indices break the remaining ties, which makes this a total order even
/// for rows that share an ambiguous key.
pub fn compare_rows(a: &RankedRow<'_>, b: &RankedRow<'_>) -> Ordering {
    a.label
        .cmp(&b.label)
        .then_with(|| b.severity.total_cmp(&a.severity))
        .then_with(|| a.key.cmp(&b.key))
        .then_with(|| a.base.map(|i| i.index).cmp(&b.base.map(|i| i.index)))
        .then_with(|| a.compare.map(|i| i.index).cmp(&b.compare.map(|i| i.index)))
}

pub fn sort_rows(rows: &mut [RankedRow<'_>]) {
    rows.sort_by(compare_rows);
}

/// Labelled, sorted rows of an audit's detail table
///
/// `diffs` is the diff list produced for the same audit pair; each row
/// collects the item diffs that point at its base or compare index.
pub fn rank_audit_rows<'a>(
    base: &'a AuditResult,
    compare: &'a AuditResult,
    diffs: &[Diff],
) -> Vec<RankedRow<'a>> {
    let base_items = base.items().unwrap_or_default();
    let compare_items = compare.items().unwrap_or_default();

    let mut rows: Vec<RankedRow<'a>> = zip_items(base_items, compare_items)
        .into_iter()
        .map(|zipped| {
            let base_index = zipped.base.map(|i| i.index);
            let compare_index = zipped.compare.map(|i| i.index);
            let row_diffs: Vec<Diff> = diffs
                .iter()
                .filter(|diff| belongs_to_row(diff, base_index, compare_index))
                .cloned()
                .collect();
            let severity = row_diffs.iter().map(severity).fold(0.0, f64::max);

            RankedRow {
                key: zipped.key,
                base: zipped.base,
                compare: zipped.compare,
                label: row_label(&row_diffs),
                severity,
                diffs: row_diffs,
            }
        })
        .collect();

    sort_rows(&mut rows);
    rows
}

/// Most severe diff of an audit, 0 when it has none
pub fn audit_severity(diffs: &[Diff]) -> f64 {
    diffs.iter().map(severity).fold(0.0, f64::max)
}

/// Order audits by their most severe diff, then by audit id
pub fn sort_audit_diffs(audits: &mut [AuditDiffs]) {
    audits.sort_by(|a, b| {
        audit_severity(&b.diffs)
            .total_cmp(&audit_severity(&a.diffs))
            .then_with(|| a.audit_id.cmp(&b.audit_id))
    });
}
