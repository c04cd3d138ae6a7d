//! Per-run value extraction and cross-run aggregation
//!
//! A value is `None` when the run cannot answer the question (audit missing,
//! not scoreable, no item table). Pessimistic aggregation treats any such run
//! as a failure to run; the other methods only need one run with a value.

use crate::assertion::types::{AggregationMethod, AssertionName};
use crate::report::AuditResult;
use crate::stats;

/// Value an assertion reads from one run's audit
pub fn audit_value(audit: Option<&AuditResult>, name: AssertionName) -> Option<f64> {
    let value = match name {
        AssertionName::AuditRan => Some(if audit.is_some() { 1.0 } else { 0.0 }),
        AssertionName::MinScore => audit?.normalized_score(),
        AssertionName::MaxLength => audit?.items().map(|items| items.len() as f64),
        AssertionName::MaxNumericValue => audit?.numeric_value,
    };
    value.filter(|value| value.is_finite())
}

/// Whether the reduction takes the smallest value
///
/// Optimistic grades on the best run and pessimistic on the worst, so the
/// direction flips with the rule's polarity.
pub fn use_min(method: AggregationMethod, name: AssertionName) -> bool {
    (method == AggregationMethod::Optimistic && name.is_max())
        || (method == AggregationMethod::Pessimistic && name.is_min())
}

/// Collapse per-run values into the value compared against the threshold
///
/// `None` means the audit did not run often enough for `method`.
pub fn aggregate(
    values: &[Option<f64>],
    method: AggregationMethod,
    name: AssertionName,
) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();

    if method == AggregationMethod::Pessimistic && present.len() != values.len() {
        return None;
    }

    match method {
        AggregationMethod::Median => stats::median(&present),
        _ if use_min(method, name) => stats::min(&present),
        _ => stats::max(&present),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Details, ScoreDisplayMode};

    #[test]
    fn test_polarity() {
        let values = [Some(10.0), Some(20.0), Some(30.0)];
        let name = AssertionName::MaxNumericValue;

        assert_eq!(aggregate(&values, AggregationMethod::Optimistic, name), Some(10.0));
        assert_eq!(aggregate(&values, AggregationMethod::Pessimistic, name), Some(30.0));
        assert_eq!(aggregate(&values, AggregationMethod::Median, name), Some(20.0));
    }

    #[test]
    fn test_score_polarity() {
        let values = [Some(0.5), Some(1.0)];
        let name = AssertionName::MinScore;

        assert_eq!(aggregate(&values, AggregationMethod::Optimistic, name), Some(1.0));
        assert_eq!(aggregate(&values, AggregationMethod::Pessimistic, name), Some(0.5));
        assert_eq!(aggregate(&values, AggregationMethod::Median, name), Some(0.75));
    }

    #[test]
    fn test_missing_values() {
        let values = [None, Some(20.0)];
        let name = AssertionName::MaxNumericValue;

        assert_eq!(aggregate(&values, AggregationMethod::Pessimistic, name), None);
        assert_eq!(aggregate(&values, AggregationMethod::Optimistic, name), Some(20.0));
        assert_eq!(aggregate(&[None, None], AggregationMethod::Optimistic, name), None);
    }

    #[test]
    fn test_audit_values() {
        let audit = AuditResult::new("a")
            .with_score(0.7)
            .with_numeric_value(1234.0)
            .with_details(Details::table(vec![], vec![Default::default(); 3]));

        assert_eq!(audit_value(Some(&audit), AssertionName::AuditRan), Some(1.0));
        assert_eq!(audit_value(None, AssertionName::AuditRan), Some(0.0));
        assert_eq!(audit_value(Some(&audit), AssertionName::MinScore), Some(0.7));
        assert_eq!(audit_value(Some(&audit), AssertionName::MaxLength), Some(3.0));
        assert_eq!(
            audit_value(Some(&audit), AssertionName::MaxNumericValue),
            Some(1234.0)
        );
        assert_eq!(audit_value(None, AssertionName::MinScore), None);
    }

    #[test]
    fn test_unscoreable_audit_has_no_score() {
        let manual = AuditResult::new("a").with_display_mode(ScoreDisplayMode::Manual);
        assert_eq!(audit_value(Some(&manual), AssertionName::MinScore), None);

        let not_applicable =
            AuditResult::new("a").with_display_mode(ScoreDisplayMode::NotApplicable);
        assert_eq!(
            audit_value(Some(&not_applicable), AssertionName::MinScore),
            Some(1.0)
        );
    }
}
