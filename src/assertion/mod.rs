// Build-time quality gate over repeated audit runs
//
// Each configured rule reads one value per run, collapses the values with an
// aggregation method, and compares the result against a fixed-direction
// threshold. Failures are reported at the rule's level; `error` results fail
// the build, `warn` results are only surfaced.

mod aggregate;
mod config;
mod engine;
mod error;
mod rules;
mod types;
mod verdict;

pub use aggregate::{aggregate, audit_value, use_min};
pub use config::AssertConfig;
pub use engine::AssertionEngine;
pub use error::{AssertionError, Result};
pub use rules::{parse_rule_id, ResourceMetric, RuleTarget, BUDGET_AUDIT, RESOURCE_SUMMARY_AUDIT};
pub use types::{
    AggregationMethod, AssertionLevel, AssertionName, AssertionOptions, AssertionResult,
    Operator, RuleSetting,
};
pub use verdict::AssertionReport;
