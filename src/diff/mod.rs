// Audit report diffing
//
// Compares a base and a compare report audit by audit and produces typed,
// filtered, ranked differences.
//
// Pipeline per audit:
// 1. Normalize detail-table rows to stable identity keys (normalize)
// 2. Pair rows across reports, refusing ambiguous pairings (matcher)
// 3. Emit raw diffs, apply thresholds, drop known flakiness (classifier)
// 4. Label rows and order everything by severity (ranker)
//
// All stages are pure: the same inputs always yield the same output.

mod classifier;
mod matcher;
mod normalize;
mod ranker;
mod types;

pub use classifier::{
    filter_diffs, find_audit_diffs, find_report_diffs, suppress_flaky_diffs, AuditDiffs,
    DiffOptions, ScoreLevel,
};
pub use matcher::{zip_items, IndexedItem, ZippedItem};
pub use normalize::{identity_key, normalize_nondeterministic};
pub use ranker::{
    audit_severity, compare_rows, diff_label, rank_audit_rows, row_label, severity,
    sort_audit_diffs, sort_rows, DiffLabel, RankedRow, RowLabel,
};
pub use types::{DeltaStats, Diff, DiffError, DiffKind, Result};
