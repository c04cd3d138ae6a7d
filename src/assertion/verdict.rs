//! Plain-text rendering of assertion outcomes
//!
//! Results are grouped by URL, errors before warnings, so the first lines of
//! the report are the ones that fail the build.

use crate::assertion::types::{AssertionLevel, AssertionName, AssertionResult};
use std::collections::BTreeMap;

/// All results of one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssertionReport {
    pub results: Vec<AssertionResult>,
}

impl AssertionReport {
    pub fn new(results: Vec<AssertionResult>) -> Self {
        Self { results }
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(AssertionResult::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(AssertionLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(AssertionLevel::Warn)
    }

    fn count(&self, level: AssertionLevel) -> usize {
        self.results.iter().filter(|r| r.level == level).count()
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();

        if self.results.is_empty() {
            report.push_str("✅ ALL ASSERTIONS PASSED\n");
            return report;
        }

        if self.has_failures() {
            report.push_str(&format!(
                "❌ ASSERTIONS FAILED ({} errors, {} warnings)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else {
            report.push_str(&format!(
                "⚠️  ASSERTIONS PASSED WITH WARNINGS ({} warnings)\n",
                self.warning_count()
            ));
        }

        let mut by_url: BTreeMap<&str, Vec<&AssertionResult>> = BTreeMap::new();
        for result in &self.results {
            by_url.entry(result.url.as_str()).or_default().push(result);
        }

        for (url, mut results) in by_url {
            results.sort_by(|a, b| b.level.cmp(&a.level));
            report.push_str(&format!("\n{}\n", url));
            for result in results {
                report.push_str(&format!("  {}\n", format_result(result)));
            }
        }

        report
    }
}

fn format_result(result: &AssertionResult) -> String {
    let marker = match result.level {
        AssertionLevel::Error => "❌",
        _ => "⚠️ ",
    };
    let target = match &result.audit_property {
        Some(property) => format!("{}.{}", result.audit_id, property),
        None => result.audit_id.clone(),
    };

    if result.name == AssertionName::AuditRan {
        return format!("{} {}: audit did not run", marker, target);
    }

    let values: Vec<String> = result.values.iter().map(|v| v.to_string()).collect();
    format!(
        "{} {} {}: expected {} {}, found {} (values: {})",
        marker,
        target,
        result.name,
        result.operator,
        result.expected,
        result.actual,
        values.join(", ")
    )
}
