//! Rule id forms and the synthetic audits behind them
//!
//! Besides plain audit ids, a rule id can address a category score, the rows
//! of the performance budget audit, or one cell of the resource summary
//! table. Each form is turned into per-run audit results so every rule goes
//! through the same aggregation path.

use crate::assertion::error::{AssertionError, Result};
use crate::report::{AuditReport, AuditResult, Item};
use std::borrow::Cow;

/// Audit holding per-resource-type budget results
pub const BUDGET_AUDIT: &str = "performance-budget";

/// Audit holding the per-resource-type request breakdown
pub const RESOURCE_SUMMARY_AUDIT: &str = "resource-summary";

const RESOURCE_SUMMARY_PREFIX: &str = "resource-summary:";
const CATEGORIES_PREFIX: &str = "categories:";

/// Audit id reported on category assertions
pub const CATEGORIES_AUDIT: &str = "categories";

/// Which cell of a resource row a rule reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceMetric {
    Size,
    Count,
}

impl ResourceMetric {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "size" => Some(ResourceMetric::Size),
            "count" => Some(ResourceMetric::Count),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceMetric::Size => "size",
            ResourceMetric::Count => "count",
        }
    }

    /// Measured field of a resource row
    fn value_field(self) -> &'static str {
        match self {
            ResourceMetric::Size => "transferSize",
            ResourceMetric::Count => "requestCount",
        }
    }

    /// Measured field of a budget row
    fn budget_value_field(self) -> &'static str {
        match self {
            ResourceMetric::Size => "size",
            ResourceMetric::Count => "requestCount",
        }
    }

    fn over_budget_field(self) -> &'static str {
        match self {
            ResourceMetric::Size => "sizeOverBudget",
            ResourceMetric::Count => "countOverBudget",
        }
    }
}

/// What a rule id addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget<'r> {
    Audit(&'r str),
    Category(&'r str),
    Budget,
    ResourceSummary {
        resource_type: &'r str,
        metric: ResourceMetric,
    },
}

pub fn parse_rule_id(rule_id: &str) -> Result<RuleTarget<'_>> {
    let invalid = |reason: &str| AssertionError::InvalidRule {
        rule_id: rule_id.to_string(),
        reason: reason.to_string(),
    };

    if rule_id == BUDGET_AUDIT {
        return Ok(RuleTarget::Budget);
    }

    if let Some(category) = rule_id.strip_prefix(CATEGORIES_PREFIX) {
        if category.is_empty() {
            return Err(invalid("missing category id"));
        }
        return Ok(RuleTarget::Category(category));
    }

    if let Some(rest) = rule_id.strip_prefix(RESOURCE_SUMMARY_PREFIX) {
        let (resource_type, metric) = rest
            .split_once(':')
            .ok_or_else(|| invalid("expected resource-summary:<type>:<size|count>"))?;
        if resource_type.is_empty() {
            return Err(invalid("missing resource type"));
        }
        let metric = ResourceMetric::parse(metric)
            .ok_or_else(|| invalid("resource metric must be size or count"))?;
        return Ok(RuleTarget::ResourceSummary {
            resource_type,
            metric,
        });
    }

    if rule_id.is_empty() {
        return Err(invalid("empty rule id"));
    }
    Ok(RuleTarget::Audit(rule_id))
}

/// Per-run audit results one rule is evaluated against
#[derive(Debug, Clone)]
pub struct RuleSubject<'a> {
    pub audit_id: String,
    pub audit_property: Option<String>,
    /// One entry per run; `None` where the run has nothing to offer
    pub audits: Vec<Option<Cow<'a, AuditResult>>>,
}

impl<'a> RuleSubject<'a> {
    pub fn audit(runs: &[&'a AuditReport], audit_id: &str) -> Self {
        Self {
            audit_id: audit_id.to_string(),
            audit_property: None,
            audits: runs
                .iter()
                .map(|run| run.audit(audit_id).map(Cow::Borrowed))
                .collect(),
        }
    }

    /// Category score wrapped as an audit score
    pub fn category(runs: &[&'a AuditReport], category_id: &str) -> Self {
        Self {
            audit_id: CATEGORIES_AUDIT.to_string(),
            audit_property: Some(category_id.to_string()),
            audits: runs
                .iter()
                .map(|run| {
                    run.categories.get(category_id).map(|category| {
                        let mut audit = AuditResult::new(CATEGORIES_AUDIT);
                        audit.score = category.score;
                        Cow::Owned(audit)
                    })
                })
                .collect(),
        }
    }

    /// One resource-summary cell wrapped as an audit numeric value
    pub fn resource_summary(
        runs: &[&'a AuditReport],
        resource_type: &str,
        metric: ResourceMetric,
    ) -> Self {
        Self {
            audit_id: RESOURCE_SUMMARY_AUDIT.to_string(),
            audit_property: Some(format!("{}.{}", resource_type, metric.as_str())),
            audits: runs
                .iter()
                .map(|run| {
                    let row = resource_row(run.audit(RESOURCE_SUMMARY_AUDIT)?, resource_type)?;
                    let value = row.number(metric.value_field())?;
                    Some(Cow::Owned(
                        AuditResult::new(RESOURCE_SUMMARY_AUDIT).with_numeric_value(value),
                    ))
                })
                .collect(),
        }
    }

    /// True when no run carries the audit at all
    pub fn never_ran(&self) -> bool {
        self.audits.iter().all(Option::is_none)
    }
}

fn resource_row<'a>(audit: &'a AuditResult, resource_type: &str) -> Option<&'a Item> {
    audit
        .items()?
        .iter()
        .find(|row| row.text("resourceType") == Some(resource_type))
}

/// One over-budget resource key with the budget it was held to
#[derive(Debug, Clone)]
pub struct BudgetCheck<'a> {
    pub subject: RuleSubject<'a>,
    /// `actual - overBudget`, the limit the budget audit applied
    pub budget: f64,
}

/// Expand the budget audit into one check per over-budget `<type>.<metric>`
///
/// Keys come out in first-seen order across runs.
pub fn budget_checks<'a>(runs: &[&'a AuditReport]) -> Vec<BudgetCheck<'a>> {
    let mut keys: Vec<(String, ResourceMetric)> = Vec::new();
    for run in runs {
        let Some(rows) = run.audit(BUDGET_AUDIT).and_then(AuditResult::items) else {
            continue;
        };
        for row in rows {
            let Some(resource_type) = row.text("resourceType") else {
                continue;
            };
            for metric in [ResourceMetric::Size, ResourceMetric::Count] {
                let over = row.number(metric.over_budget_field()).unwrap_or(0.0);
                let key = (resource_type.to_string(), metric);
                if over > 0.0 && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }

    keys.into_iter()
        .filter_map(|(resource_type, metric)| budget_check(runs, &resource_type, metric))
        .collect()
}

fn budget_check<'a>(
    runs: &[&'a AuditReport],
    resource_type: &str,
    metric: ResourceMetric,
) -> Option<BudgetCheck<'a>> {
    let mut budget: Option<f64> = None;
    let audits = runs
        .iter()
        .map(|run| {
            let row = resource_row(run.audit(BUDGET_AUDIT)?, resource_type)?;
            let actual = row.number(metric.budget_value_field())?;
            // Only over-budget rows reveal the limit
            let over = row.number(metric.over_budget_field()).filter(|over| *over > 0.0);
            if let Some(over) = over {
                let limit = actual - over;
                budget = Some(budget.map_or(limit, |b: f64| b.min(limit)));
            }
            Some(Cow::Owned(
                AuditResult::new(BUDGET_AUDIT).with_numeric_value(actual),
            ))
        })
        .collect();

    Some(BudgetCheck {
        subject: RuleSubject {
            audit_id: BUDGET_AUDIT.to_string(),
            audit_property: Some(format!("{}.{}", resource_type, metric.as_str())),
            audits,
        },
        budget: budget?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CategoryResult, Details, Item};

    fn budget_run(rows: Vec<Item>) -> AuditReport {
        AuditReport::new("https://x.com/")
            .with_audit(AuditResult::new(BUDGET_AUDIT).with_details(Details::table(vec![], rows)))
    }

    #[test]
    fn test_parse_rule_ids() {
        assert_eq!(parse_rule_id("viewport").unwrap(), RuleTarget::Audit("viewport"));
        assert_eq!(
            parse_rule_id("categories:performance").unwrap(),
            RuleTarget::Category("performance")
        );
        assert_eq!(parse_rule_id("performance-budget").unwrap(), RuleTarget::Budget);
        assert_eq!(
            parse_rule_id("resource-summary:script:size").unwrap(),
            RuleTarget::ResourceSummary {
                resource_type: "script",
                metric: ResourceMetric::Size,
            }
        );
        assert_eq!(
            parse_rule_id("resource-summary").unwrap(),
            RuleTarget::Audit("resource-summary")
        );
    }

    #[test]
    fn test_parse_rule_id_errors() {
        assert!(matches!(
            parse_rule_id("resource-summary:script:weight"),
            Err(AssertionError::InvalidRule { .. })
        ));
        assert!(parse_rule_id("resource-summary:script").is_err());
        assert!(parse_rule_id("categories:").is_err());
        assert!(parse_rule_id("").is_err());
    }

    #[test]
    fn test_category_subject() {
        let run = AuditReport::new("u")
            .with_category("performance", CategoryResult::new("performance").with_score(0.42));
        let runs = [&run];

        let subject = RuleSubject::category(&runs, "performance");
        assert_eq!(subject.audit_id, "categories");
        assert_eq!(subject.audit_property.as_deref(), Some("performance"));
        assert_eq!(subject.audits[0].as_ref().unwrap().score, Some(0.42));

        assert!(RuleSubject::category(&runs, "seo").never_ran());
    }

    #[test]
    fn test_resource_summary_subject() {
        let run = AuditReport::new("u").with_audit(
            AuditResult::new(RESOURCE_SUMMARY_AUDIT).with_details(Details::table(
                vec![],
                vec![
                    Item::new()
                        .with("resourceType", "script")
                        .with("transferSize", 250_000_i64)
                        .with("requestCount", 12_i64),
                    Item::new()
                        .with("resourceType", "image")
                        .with("transferSize", 900_000_i64)
                        .with("requestCount", 30_i64),
                ],
            )),
        );
        let runs = [&run];

        let size = RuleSubject::resource_summary(&runs, "script", ResourceMetric::Size);
        assert_eq!(size.audit_property.as_deref(), Some("script.size"));
        assert_eq!(size.audits[0].as_ref().unwrap().numeric_value, Some(250_000.0));

        let count = RuleSubject::resource_summary(&runs, "image", ResourceMetric::Count);
        assert_eq!(count.audits[0].as_ref().unwrap().numeric_value, Some(30.0));

        assert!(RuleSubject::resource_summary(&runs, "font", ResourceMetric::Size).never_ran());
    }

    #[test]
    fn test_budget_checks_only_over_budget_keys() {
        let run = budget_run(vec![
            Item::new()
                .with("resourceType", "script")
                .with("size", 300_000_i64)
                .with("sizeOverBudget", 100_000_i64)
                .with("requestCount", 10_i64),
            Item::new()
                .with("resourceType", "image")
                .with("size", 50_000_i64)
                .with("requestCount", 25_i64)
                .with("countOverBudget", 5_i64),
            Item::new()
                .with("resourceType", "font")
                .with("size", 10_000_i64)
                .with("requestCount", 2_i64),
        ]);
        let runs = [&run];

        let checks = budget_checks(&runs);
        let keys: Vec<(&str, f64)> = checks
            .iter()
            .map(|c| (c.subject.audit_property.as_deref().unwrap(), c.budget))
            .collect();

        assert_eq!(keys, vec![("script.size", 200_000.0), ("image.count", 20.0)]);
    }

    #[test]
    fn test_budget_limit_ignores_rows_within_budget() {
        let over = budget_run(vec![Item::new()
            .with("resourceType", "script")
            .with("size", 300_000_i64)
            .with("sizeOverBudget", 100_000_i64)]);
        let within = budget_run(vec![Item::new()
            .with("resourceType", "script")
            .with("size", 150_000_i64)
            .with("sizeOverBudget", 0_i64)]);
        let runs = [&over, &within];

        let checks = budget_checks(&runs);

        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].budget, 200_000.0);
        assert_eq!(checks[0].subject.audits.len(), 2);
        assert_eq!(
            checks[0].subject.audits[1].as_ref().unwrap().numeric_value,
            Some(150_000.0)
        );
    }
}
