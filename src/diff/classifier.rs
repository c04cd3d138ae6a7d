//! Audit diff classification
//!
//! Builds the raw diff list for one audit pair, filters it against the
//! configured thresholds, then applies the flakiness heuristics. Each stage is
//! a separate pure function over the previous stage's output.

use crate::diff::matcher::zip_items;
use crate::diff::types::{Diff, DiffError, DiffKind, Result};
use crate::report::{AuditReport, AuditResult, Item, ScoreDisplayMode, METRICS_GROUP};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Knobs controlling which differences survive filtering
///
/// # Example
/// ```
/// use auditgate::diff::DiffOptions;
///
/// let options = DiffOptions::default();
/// assert_eq!(options.percent_absolute_delta_threshold, 0.0);
/// assert!(!options.force_all_score_diffs);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffOptions {
    /// Keep score changes that stay within one pass/average/fail band
    pub force_all_score_diffs: bool,

    /// Drop display-value diffs entirely
    pub skip_display_value_diffs: bool,

    /// Expand row additions/removals into per-cell deltas against zero
    pub synthesize_item_key_diffs: bool,

    /// Minimum `|compare - base| / |base|` a numeric diff must exceed
    pub percent_absolute_delta_threshold: f64,

    /// Category group of the audit being compared
    ///
    /// Audits in the `metrics` group are exempt from timing-wobble suppression.
    pub audit_group: Option<String>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            force_all_score_diffs: false,
            skip_display_value_diffs: false,
            synthesize_item_key_diffs: false,
            percent_absolute_delta_threshold: 0.0,
            audit_group: None,
        }
    }
}

impl DiffOptions {
    /// Options for table views that color every cell of added/removed rows
    pub fn presentation() -> Self {
        Self {
            synthesize_item_key_diffs: true,
            ..Self::default()
        }
    }

    pub fn with_audit_group(mut self, group: Option<&str>) -> Self {
        self.audit_group = group.map(str::to_string);
        self
    }

    pub fn is_metric(&self) -> bool {
        self.audit_group.as_deref() == Some(METRICS_GROUP)
    }
}

/// Pass/average/fail band of a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScoreLevel {
    Fail,
    Average,
    Pass,
}

impl ScoreLevel {
    pub const PASS_THRESHOLD: f64 = 0.9;
    pub const AVERAGE_THRESHOLD: f64 = 0.5;

    pub fn from_score(score: f64) -> Self {
        if score >= Self::PASS_THRESHOLD {
            ScoreLevel::Pass
        } else if score >= Self::AVERAGE_THRESHOLD {
            ScoreLevel::Average
        } else {
            ScoreLevel::Fail
        }
    }
}

/// Diffs of every audit that changed between two reports
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditDiffs {
    pub audit_id: String,
    pub diffs: Vec<Diff>,
}

/// Compare one audit across a base and a compare report
///
/// # Errors
///
/// Returns [`DiffError::AuditIdMismatch`] when both audits carry ids that
/// differ, and propagates malformed item-delta construction.
pub fn find_audit_diffs(
    base: &AuditResult,
    compare: &AuditResult,
    options: &DiffOptions,
) -> Result<Vec<Diff>> {
    if !base.id.is_empty() && !compare.id.is_empty() && base.id != compare.id {
        return Err(DiffError::AuditIdMismatch {
            base: base.id.clone(),
            compare: compare.id.clone(),
        });
    }

    let audit_id = if base.id.is_empty() {
        compare.id.as_str()
    } else {
        base.id.as_str()
    };

    diff_audits(audit_id, base, compare, options)
}

/// Compare every audit of two reports
///
/// Audits are visited in id order. An audit present on one side only yields
/// a single error diff. Audits without surviving diffs are omitted.
pub fn find_report_diffs(
    base: &AuditReport,
    compare: &AuditReport,
    options: &DiffOptions,
) -> Result<Vec<AuditDiffs>> {
    let audit_ids: BTreeSet<&String> = base.audits.keys().chain(compare.audits.keys()).collect();

    let mut changed = Vec::new();
    for audit_id in audit_ids {
        let diffs = match (base.audit(audit_id), compare.audit(audit_id)) {
            (Some(base_audit), Some(compare_audit)) => {
                let group = base
                    .audit_group(audit_id)
                    .or_else(|| compare.audit_group(audit_id));
                let options = options.clone().with_audit_group(group);
                diff_audits(audit_id, base_audit, compare_audit, &options)?
            }
            (base_audit, compare_audit) => {
                tracing::debug!(audit_id = %audit_id, "audit missing from one report");
                vec![Diff::score(
                    audit_id,
                    base_audit.and_then(AuditResult::normalized_score),
                    compare_audit.and_then(AuditResult::normalized_score),
                )]
            }
        };

        if !diffs.is_empty() {
            changed.push(AuditDiffs {
                audit_id: audit_id.clone(),
                diffs,
            });
        }
    }

    Ok(changed)
}

fn diff_audits(
    audit_id: &str,
    base: &AuditResult,
    compare: &AuditResult,
    options: &DiffOptions,
) -> Result<Vec<Diff>> {
    let raw = collect_diffs(audit_id, base, compare)?;
    let filtered = filter_diffs(raw, options);
    let kept = suppress_flaky_diffs(filtered, base, compare, options);

    if options.synthesize_item_key_diffs {
        let synthesized = synthesize_item_key_diffs(audit_id, &kept, base, compare)?;
        Ok(kept.into_iter().chain(synthesized).collect())
    } else {
        Ok(kept)
    }
}

/// Numeric value used for diffing; not-applicable audits read as zero
fn diffable_numeric_value(audit: &AuditResult) -> Option<f64> {
    if audit.score_display_mode == ScoreDisplayMode::NotApplicable {
        return Some(0.0);
    }
    audit.numeric_value_or_savings()
}

/// Union of both audits' heading keys
fn heading_keys<'a>(base: &'a AuditResult, compare: &'a AuditResult) -> BTreeSet<&'a str> {
    base.headings()
        .iter()
        .chain(compare.headings())
        .filter_map(|heading| heading.key.as_deref())
        .collect()
}

/// Every candidate diff, before any filtering
fn collect_diffs(audit_id: &str, base: &AuditResult, compare: &AuditResult) -> Result<Vec<Diff>> {
    let mut diffs = Vec::new();

    if base.defines_score() || compare.defines_score() {
        diffs.push(Diff::score(
            audit_id,
            base.normalized_score(),
            compare.normalized_score(),
        ));
    }

    if base.numeric_value_or_savings().is_some() || compare.numeric_value_or_savings().is_some() {
        diffs.push(Diff::numeric_value(
            audit_id,
            diffable_numeric_value(base),
            diffable_numeric_value(compare),
        ));
    }

    if base.display_value.is_some() || compare.display_value.is_some() {
        diffs.push(Diff::display_value(
            audit_id,
            base.display_value.as_deref().unwrap_or(""),
            compare.display_value.as_deref().unwrap_or(""),
        ));
    }

    let (base_items, compare_items) = (base.items(), compare.items());
    if base_items.is_some() || compare_items.is_some() {
        let base_items = base_items.unwrap_or_default();
        let compare_items = compare_items.unwrap_or_default();
        let headings = heading_keys(base, compare);

        diffs.push(Diff::item_count(
            audit_id,
            base_items.len(),
            compare_items.len(),
        ));

        for row in zip_items(base_items, compare_items) {
            match (row.base, row.compare) {
                (Some(b), Some(c)) => {
                    diffs.extend(row_deltas(audit_id, b.index, b.item, c.index, c.item, &headings)?);
                }
                (Some(b), None) => diffs.push(Diff::item_removal(audit_id, b.index)),
                (None, Some(c)) => diffs.push(Diff::item_addition(audit_id, c.index)),
                (None, None) => {}
            }
        }
    }

    Ok(diffs)
}

/// One delta per numeric, displayed field present in both rows
fn row_deltas(
    audit_id: &str,
    base_index: usize,
    base_item: &Item,
    compare_index: usize,
    compare_item: &Item,
    headings: &BTreeSet<&str>,
) -> Result<Vec<Diff>> {
    let mut deltas = Vec::new();
    for (key, value) in base_item.iter() {
        if !headings.contains(key.as_str()) {
            continue;
        }
        let (Some(base_value), Some(compare_value)) = (value.as_f64(), compare_item.number(key))
        else {
            continue;
        };
        deltas.push(Diff::item_delta(
            audit_id,
            Some(base_index),
            Some(compare_index),
            key,
            Some(base_value),
            Some(compare_value),
        )?);
    }
    Ok(deltas)
}

fn passes_filter(diff: &Diff, options: &DiffOptions) -> bool {
    match diff {
        Diff::Error { .. } | Diff::ItemAddition { .. } | Diff::ItemRemoval { .. } => true,
        Diff::Score {
            base_value,
            compare_value,
            ..
        } => {
            if options.force_all_score_diffs {
                base_value != compare_value
            } else {
                ScoreLevel::from_score(*base_value) != ScoreLevel::from_score(*compare_value)
            }
        }
        Diff::DisplayValue {
            base_value,
            compare_value,
            ..
        } => !options.skip_display_value_diffs && base_value != compare_value,
        Diff::NumericValue { .. } | Diff::ItemCount { .. } | Diff::ItemDelta { .. } => diff
            .delta_stats()
            .is_some_and(|stats| {
                stats.percent_absolute_delta > options.percent_absolute_delta_threshold
            }),
    }
}

/// Threshold stage
pub fn filter_diffs(diffs: Vec<Diff>, options: &DiffOptions) -> Vec<Diff> {
    diffs
        .into_iter()
        .filter(|diff| passes_filter(diff, options))
        .collect()
}

/// Flakiness stage
///
/// A lone display-value change is treated as noise. So is a set made only of
/// display/numeric changes on an audit that passes on both sides or carries
/// item details, unless the audit is one of the core metrics.
pub fn suppress_flaky_diffs(
    diffs: Vec<Diff>,
    base: &AuditResult,
    compare: &AuditResult,
    options: &DiffOptions,
) -> Vec<Diff> {
    if let [only] = diffs.as_slice() {
        if only.kind() == DiffKind::DisplayValue {
            tracing::debug!(audit_id = %only.audit_id(), "dropping lone display value diff");
            return Vec::new();
        }
    }

    let only_value_changes = diffs
        .iter()
        .all(|diff| matches!(diff.kind(), DiffKind::DisplayValue | DiffKind::NumericValue));
    let both_passing =
        base.normalized_score() == Some(1.0) && compare.normalized_score() == Some(1.0);
    let has_item_details = base.has_item_details() || compare.has_item_details();

    if !diffs.is_empty()
        && only_value_changes
        && (both_passing || has_item_details)
        && !options.is_metric()
    {
        tracing::debug!(
            audit_id = %diffs[0].audit_id(),
            suppressed = diffs.len(),
            both_passing,
            has_item_details,
            "dropping value-only diffs"
        );
        return Vec::new();
    }

    diffs
}

/// Synthesis stage: per-cell deltas for added and removed rows
fn synthesize_item_key_diffs(
    audit_id: &str,
    diffs: &[Diff],
    base: &AuditResult,
    compare: &AuditResult,
) -> Result<Vec<Diff>> {
    let headings = heading_keys(base, compare);
    let base_items = base.items().unwrap_or_default();
    let compare_items = compare.items().unwrap_or_default();

    let mut synthesized = Vec::new();
    for diff in diffs {
        let (item, base_index, compare_index) = match diff {
            Diff::ItemAddition {
                compare_item_index, ..
            } => (
                compare_items.get(*compare_item_index),
                None,
                Some(*compare_item_index),
            ),
            Diff::ItemRemoval {
                base_item_index, ..
            } => (
                base_items.get(*base_item_index),
                Some(*base_item_index),
                None,
            ),
            _ => continue,
        };
        let Some(item) = item else {
            continue;
        };

        for (key, value) in item.iter() {
            let Some(number) = value.as_f64() else {
                continue;
            };
            // A zero cell against the implied zero is not a change
            if number == 0.0 || !headings.contains(key.as_str()) {
                continue;
            }
            let (base_value, compare_value) = if base_index.is_some() {
                (number, 0.0)
            } else {
                (0.0, number)
            };
            synthesized.push(Diff::item_delta(
                audit_id,
                base_index,
                compare_index,
                key,
                Some(base_value),
                Some(compare_value),
            )?);
        }
    }

    Ok(synthesized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Details, Heading};

    fn scored(id: &str, score: f64) -> AuditResult {
        AuditResult::new(id).with_score(score)
    }

    fn table_audit(id: &str, rows: Vec<Item>) -> AuditResult {
        AuditResult::new(id).with_details(Details::table(
            vec![
                Heading::new("url", "url"),
                Heading::new("transferSize", "bytes"),
            ],
            rows,
        ))
    }

    fn row(url: &str, size: f64) -> Item {
        Item::new().with("url", url).with("transferSize", size)
    }

    #[test]
    fn test_score_crossing_boundary() {
        let diffs = find_audit_diffs(
            &scored("a", 0.89),
            &scored("a", 0.91),
            &DiffOptions::default(),
        )
        .unwrap();

        assert_eq!(
            diffs,
            vec![Diff::Score {
                audit_id: "a".to_string(),
                base_value: 0.89,
                compare_value: 0.91,
            }]
        );
    }

    #[test]
    fn test_score_within_band_is_dropped_unless_forced() {
        let base = scored("a", 0.95);
        let compare = scored("a", 0.99);

        assert!(find_audit_diffs(&base, &compare, &DiffOptions::default())
            .unwrap()
            .is_empty());

        let forced = DiffOptions {
            force_all_score_diffs: true,
            ..DiffOptions::default()
        };
        let diffs = find_audit_diffs(&base, &compare, &forced).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind(), DiffKind::Score);
    }

    #[test]
    fn test_lone_display_value_is_noise() {
        let base = scored("a", 1.0).with_display_value("1.2 s");
        let compare = scored("a", 1.0).with_display_value("1.5 s");

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_value_wobble_on_passing_audit_is_suppressed() {
        let base = scored("bootup-time", 1.0)
            .with_numeric_value(1000.0)
            .with_display_value("1.0 s");
        let compare = scored("bootup-time", 1.0)
            .with_numeric_value(1100.0)
            .with_display_value("1.1 s");

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_metrics_group_is_never_suppressed() {
        let base = scored("interactive", 1.0)
            .with_numeric_value(1000.0)
            .with_display_value("1.0 s");
        let compare = scored("interactive", 1.0)
            .with_numeric_value(1100.0)
            .with_display_value("1.1 s");
        let options = DiffOptions::default().with_audit_group(Some("metrics"));

        let diffs = find_audit_diffs(&base, &compare, &options).unwrap();
        let kinds: Vec<DiffKind> = diffs.iter().map(Diff::kind).collect();
        assert_eq!(kinds, vec![DiffKind::NumericValue, DiffKind::DisplayValue]);
    }

    #[test]
    fn test_value_change_on_failing_audit_is_kept() {
        let base = scored("a", 0.3).with_numeric_value(5000.0);
        let compare = scored("a", 0.35).with_numeric_value(5500.0);

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();
        assert_eq!(
            diffs,
            vec![Diff::NumericValue {
                audit_id: "a".to_string(),
                base_value: 5000.0,
                compare_value: 5500.0,
            }]
        );
    }

    #[test]
    fn test_item_details_alone_suppress_value_changes() {
        let base = table_audit("a", vec![]).with_score(0.3).with_numeric_value(5000.0);
        let compare = table_audit("a", vec![]).with_score(0.35).with_numeric_value(5500.0);

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_percent_threshold() {
        let options = DiffOptions {
            percent_absolute_delta_threshold: 0.1,
            ..DiffOptions::default()
        };
        let base = scored("a", 0.2).with_numeric_value(1000.0);

        let small = scored("a", 0.2).with_numeric_value(1050.0);
        assert!(find_audit_diffs(&base, &small, &options).unwrap().is_empty());

        let large = scored("a", 0.2).with_numeric_value(1200.0);
        assert_eq!(find_audit_diffs(&base, &large, &options).unwrap().len(), 1);
    }

    #[test]
    fn test_item_level_diffs() {
        let base = table_audit(
            "network-requests",
            vec![
                row("http://x.com/a.js?v=1", 100.0).with("wastedBytes", 50.0),
                row("http://x.com/b.js", 200.0),
            ],
        );
        let compare = table_audit(
            "network-requests",
            vec![
                row("http://x.com/a.js?v=2", 150.0).with("wastedBytes", 80.0),
                row("http://x.com/c.js", 300.0),
            ],
        );

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();

        assert_eq!(
            diffs,
            vec![
                Diff::ItemDelta {
                    audit_id: "network-requests".to_string(),
                    base_item_index: Some(0),
                    compare_item_index: Some(0),
                    item_key: "transferSize".to_string(),
                    base_value: 100.0,
                    compare_value: 150.0,
                },
                Diff::ItemRemoval {
                    audit_id: "network-requests".to_string(),
                    base_item_index: 1,
                },
                Diff::ItemAddition {
                    audit_id: "network-requests".to_string(),
                    compare_item_index: 1,
                },
            ]
        );
    }

    #[test]
    fn test_synthesized_item_key_diffs() {
        let base = table_audit("n", vec![row("http://x.com/b.js", 200.0)]);
        let compare = table_audit("n", vec![row("http://x.com/c.js", 300.0)]);

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::presentation()).unwrap();

        // Item count is unchanged and filtered out
        assert_eq!(diffs.len(), 4);
        assert_eq!(diffs[0].kind(), DiffKind::ItemRemoval);
        assert_eq!(diffs[1].kind(), DiffKind::ItemAddition);
        assert_eq!(
            diffs[2],
            Diff::ItemDelta {
                audit_id: "n".to_string(),
                base_item_index: Some(0),
                compare_item_index: None,
                item_key: "transferSize".to_string(),
                base_value: 200.0,
                compare_value: 0.0,
            }
        );
        assert_eq!(
            diffs[3],
            Diff::ItemDelta {
                audit_id: "n".to_string(),
                base_item_index: None,
                compare_item_index: Some(0),
                item_key: "transferSize".to_string(),
                base_value: 0.0,
                compare_value: 300.0,
            }
        );
    }

    #[test]
    fn test_synthesis_skips_zero_cells() {
        let base = AuditResult::new("n").with_details(Details::table(
            vec![
                Heading::new("url", "url"),
                Heading::new("transferSize", "bytes"),
                Heading::new("wastedBytes", "bytes"),
            ],
            vec![row("http://x.com/b.js", 120.0).with("wastedBytes", 0.0)],
        ));
        let compare = table_audit("n", Vec::new());

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::presentation()).unwrap();

        assert!(diffs.contains(&Diff::ItemRemoval {
            audit_id: "n".to_string(),
            base_item_index: 0,
        }));
        let deltas: Vec<&Diff> = diffs
            .iter()
            .filter(|d| d.kind() == DiffKind::ItemDelta)
            .collect();
        assert_eq!(
            deltas,
            vec![&Diff::ItemDelta {
                audit_id: "n".to_string(),
                base_item_index: Some(0),
                compare_item_index: None,
                item_key: "transferSize".to_string(),
                base_value: 120.0,
                compare_value: 0.0,
            }]
        );
    }

    #[test]
    fn test_missing_score_is_an_error_diff() {
        let base = scored("a", 0.5);
        let compare = AuditResult::new("a").with_display_mode(ScoreDisplayMode::Error);

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();
        assert_eq!(
            diffs,
            vec![Diff::Error {
                audit_id: "a".to_string(),
                attempted_type: DiffKind::Score,
                base_value: Some(0.5),
                compare_value: None,
            }]
        );
    }

    #[test]
    fn test_audit_id_mismatch() {
        let err = find_audit_diffs(&scored("a", 1.0), &scored("b", 1.0), &DiffOptions::default())
            .unwrap_err();
        assert!(matches!(err, DiffError::AuditIdMismatch { .. }));
    }

    #[test]
    fn test_not_applicable_reads_as_pass_and_zero() {
        let base = AuditResult::new("a").with_display_mode(ScoreDisplayMode::NotApplicable);
        let compare = scored("a", 0.4).with_numeric_value(300.0);

        let diffs = find_audit_diffs(&base, &compare, &DiffOptions::default()).unwrap();
        assert_eq!(
            diffs,
            vec![
                Diff::Score {
                    audit_id: "a".to_string(),
                    base_value: 1.0,
                    compare_value: 0.4,
                },
                Diff::NumericValue {
                    audit_id: "a".to_string(),
                    base_value: 0.0,
                    compare_value: 300.0,
                },
            ]
        );
    }

    #[test]
    fn test_report_diffs_resolve_groups_and_missing_audits() {
        let base = AuditReport::new("https://x.com/")
            .with_audit(scored("interactive", 1.0).with_numeric_value(1000.0))
            .with_audit(scored("viewport", 1.0))
            .with_category(
                "performance",
                crate::report::CategoryResult::new("performance")
                    .with_audit_ref("interactive", Some("metrics")),
            );
        let compare = AuditReport::new("https://x.com/")
            .with_audit(scored("interactive", 1.0).with_numeric_value(1500.0));

        let changed = find_report_diffs(&base, &compare, &DiffOptions::default()).unwrap();

        assert_eq!(changed.len(), 2);
        assert_eq!(changed[0].audit_id, "interactive");
        assert_eq!(changed[0].diffs[0].kind(), DiffKind::NumericValue);
        assert_eq!(changed[1].audit_id, "viewport");
        assert_eq!(changed[1].diffs[0].kind(), DiffKind::Error);
    }
}
