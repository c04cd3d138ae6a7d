//! Assertion evaluation engine
//!
//! Evaluates configured rules against repeated runs of the same page.
//!
//! # Flow
//!
//! ```text
//! 1. Group runs by URL, keep groups matching the config's URL pattern
//! 2. For every rule that is not `off`:
//!    a. resolve the aggregation method (rule, then config, then engine default)
//!    b. for `median-run`, reduce the group to its representative run
//!    c. read one value per run, aggregate, compare against the threshold
//! 3. Every failed comparison becomes an AssertionResult at the rule's level
//! ```

use crate::assertion::aggregate::{aggregate, audit_value};
use crate::assertion::config::AssertConfig;
use crate::assertion::error::{AssertionError, Result};
use crate::assertion::rules::{
    budget_checks, parse_rule_id, RuleSubject, RuleTarget, BUDGET_AUDIT,
};
use crate::assertion::types::{
    AggregationMethod, AssertionLevel, AssertionName, AssertionResult, RuleSetting,
};
use crate::report::AuditReport;
use crate::representative::{group_runs_by_url, representative_run};
use regex::Regex;
use tracing::{debug, warn};

/// Assertion evaluation engine
///
/// Stateless apart from the fallback aggregation method used when neither
/// the rule nor its configuration names one.
#[derive(Debug, Clone, Default)]
pub struct AssertionEngine {
    default_method: AggregationMethod,
}

/// Everything one threshold comparison needs besides the values
struct Check<'s> {
    url: &'s str,
    level: AssertionLevel,
    method: AggregationMethod,
}

impl AssertionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aggregation_method(mut self, method: AggregationMethod) -> Self {
        self.default_method = method;
        self
    }

    /// Evaluate one rule against runs of a single URL
    ///
    /// Returns only failures; an empty vector means the rule passed (or is
    /// `off`).
    ///
    /// # Errors
    ///
    /// [`AssertionError::NoRuns`] for an empty slice,
    /// [`AssertionError::MixedUrls`] when the runs measured different pages and
    /// [`AssertionError::InvalidRule`] for a malformed rule id.
    pub fn evaluate(
        &self,
        runs: &[&AuditReport],
        rule_id: &str,
        setting: &RuleSetting,
    ) -> Result<Vec<AssertionResult>> {
        self.evaluate_with_default(runs, rule_id, setting, self.default_method)
    }

    fn evaluate_with_default(
        &self,
        runs: &[&AuditReport],
        rule_id: &str,
        setting: &RuleSetting,
        default_method: AggregationMethod,
    ) -> Result<Vec<AssertionResult>> {
        let url = single_url(runs)?;

        if setting.level == AssertionLevel::Off {
            debug!(rule_id, "rule is off, skipping");
            return Ok(Vec::new());
        }

        let target = parse_rule_id(rule_id)?;
        let method = setting.options.aggregation_method.unwrap_or(default_method);

        let representative;
        let runs: &[&AuditReport] = if method == AggregationMethod::MedianRun {
            representative = representative_run(runs).into_iter().collect::<Vec<_>>();
            &representative
        } else {
            runs
        };

        let check = Check {
            url,
            level: setting.level,
            method,
        };

        let results = match target {
            RuleTarget::Audit(audit_id) => check_subject(
                &check,
                &RuleSubject::audit(runs, audit_id),
                &setting.options.thresholds(),
            ),
            RuleTarget::Category(category_id) => check_subject(
                &check,
                &RuleSubject::category(runs, category_id),
                &setting.options.thresholds(),
            ),
            RuleTarget::ResourceSummary {
                resource_type,
                metric,
            } => check_subject(
                &check,
                &RuleSubject::resource_summary(runs, resource_type, metric),
                &setting.options.thresholds(),
            ),
            RuleTarget::Budget => check_budget(&check, runs),
        };

        Ok(results)
    }

    /// Evaluate every rule of a configuration against a mixed set of runs
    ///
    /// Runs are grouped by URL; groups whose URL does not match the
    /// configuration's pattern are skipped.
    pub fn evaluate_all(
        &self,
        config: &AssertConfig,
        runs: &[AuditReport],
    ) -> Result<Vec<AssertionResult>> {
        let pattern = config.url_pattern()?;
        let default_method = config.aggregation_method.unwrap_or(self.default_method);

        let mut results = Vec::new();
        for group in group_runs_by_url(runs) {
            let url = group[0].final_url.as_str();
            if !url_matches(pattern.as_ref(), url) {
                debug!(url, "URL does not match pattern, skipping");
                continue;
            }

            let first = results.len();
            for (rule_id, setting) in &config.assertions {
                results.extend(self.evaluate_with_default(
                    &group,
                    rule_id,
                    setting,
                    default_method,
                )?);
            }

            let errors = results[first..].iter().filter(|r| r.is_error()).count();
            if errors > 0 {
                warn!(url, errors, "assertions failed");
            }
        }

        Ok(results)
    }

    /// Evaluate several configurations, each against the URLs it matches
    pub fn evaluate_matrix(
        &self,
        configs: &[AssertConfig],
        runs: &[AuditReport],
    ) -> Result<Vec<AssertionResult>> {
        let mut results = Vec::new();
        for config in configs {
            results.extend(self.evaluate_all(config, runs)?);
        }
        Ok(results)
    }

    /// True when any result should fail the build
    pub fn has_failures(&self, results: &[AssertionResult]) -> bool {
        results.iter().any(AssertionResult::is_error)
    }
}

fn url_matches(pattern: Option<&Regex>, url: &str) -> bool {
    pattern.map_or(true, |re| re.is_match(url))
}

fn single_url<'r>(runs: &[&'r AuditReport]) -> Result<&'r str> {
    let first: &'r AuditReport = runs.first().copied().ok_or(AssertionError::NoRuns)?;
    if let Some(other) = runs.iter().find(|run| run.final_url != first.final_url) {
        return Err(AssertionError::MixedUrls {
            first: first.final_url.clone(),
            second: other.final_url.clone(),
        });
    }
    Ok(first.final_url.as_str())
}

fn audit_ran_failure(check: &Check<'_>, subject: &RuleSubject<'_>) -> AssertionResult {
    AssertionResult {
        name: AssertionName::AuditRan,
        operator: AssertionName::AuditRan.operator(),
        expected: 1.0,
        actual: 0.0,
        values: subject
            .audits
            .iter()
            .map(|audit| if audit.is_some() { 1.0 } else { 0.0 })
            .collect(),
        level: check.level,
        audit_id: subject.audit_id.clone(),
        audit_property: subject.audit_property.clone(),
        url: check.url.to_string(),
    }
}

/// Compare a subject against each threshold
///
/// At most one `auditRan` failure is reported per subject.
fn check_subject(
    check: &Check<'_>,
    subject: &RuleSubject<'_>,
    thresholds: &[(AssertionName, f64)],
) -> Vec<AssertionResult> {
    if subject.never_ran() {
        return vec![audit_ran_failure(check, subject)];
    }

    let mut results = Vec::new();
    for &(name, expected) in thresholds {
        let values: Vec<Option<f64>> = subject
            .audits
            .iter()
            .map(|audit| audit_value(audit.as_deref(), name))
            .collect();

        let Some(actual) = aggregate(&values, check.method, name) else {
            if !results
                .iter()
                .any(|r: &AssertionResult| r.name == AssertionName::AuditRan)
            {
                results.push(audit_ran_failure(check, subject));
            }
            continue;
        };

        let operator = name.operator();
        if operator.holds(actual, expected) {
            continue;
        }

        results.push(AssertionResult {
            name,
            operator,
            expected,
            actual,
            values: values.into_iter().flatten().collect(),
            level: check.level,
            audit_id: subject.audit_id.clone(),
            audit_property: subject.audit_property.clone(),
            url: check.url.to_string(),
        });
    }

    results
}

/// Re-check every over-budget resource against the budget it exceeded
///
/// Budgets are always graded on the worst run.
fn check_budget(check: &Check<'_>, runs: &[&AuditReport]) -> Vec<AssertionResult> {
    let budget_subject = RuleSubject::audit(runs, BUDGET_AUDIT);
    if budget_subject.never_ran() {
        return vec![audit_ran_failure(check, &budget_subject)];
    }

    let pessimistic = Check {
        method: AggregationMethod::Pessimistic,
        ..*check
    };
    budget_checks(runs)
        .iter()
        .flat_map(|budget_check| {
            check_subject(
                &pessimistic,
                &budget_check.subject,
                &[(AssertionName::MaxNumericValue, budget_check.budget)],
            )
        })
        .collect()
}
