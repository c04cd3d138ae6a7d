//! Assertion rule and result types
//!
//! A rule configuration maps a rule id (an audit id, `categories:<id>`,
//! `performance-budget` or `resource-summary:<type>:<size|count>`) to a
//! [`RuleSetting`]. Settings accept the shorthand forms used in config files:
//!
//! ```toml
//! [assertions]
//! "uses-http2" = "warn"
//! "viewport" = ["error"]
//! "first-contentful-paint" = ["error", { maxNumericValue = 2000, aggregationMethod = "pessimistic" }]
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy for collapsing several runs' values into one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationMethod {
    /// Grade on the best run
    #[default]
    Optimistic,
    /// Grade on the worst run; every run must produce a value
    Pessimistic,
    Median,
    /// Grade on the single representative run
    MedianRun,
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationMethod::Optimistic => "optimistic",
            AggregationMethod::Pessimistic => "pessimistic",
            AggregationMethod::Median => "median",
            AggregationMethod::MedianRun => "median-run",
        };
        f.write_str(name)
    }
}

/// Severity of a rule; `off` rules are never evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionLevel {
    Off,
    Warn,
    Error,
}

impl fmt::Display for AssertionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssertionLevel::Off => "off",
            AssertionLevel::Warn => "warn",
            AssertionLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Thresholds of one rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssertionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_numeric_value: Option<f64>,

    /// Overrides the configuration-wide method for this rule only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation_method: Option<AggregationMethod>,
}

impl AssertionOptions {
    pub fn min_score(score: f64) -> Self {
        Self {
            min_score: Some(score),
            ..Self::default()
        }
    }

    pub fn max_numeric_value(value: f64) -> Self {
        Self {
            max_numeric_value: Some(value),
            ..Self::default()
        }
    }

    pub fn max_length(length: f64) -> Self {
        Self {
            max_length: Some(length),
            ..Self::default()
        }
    }

    pub fn with_aggregation_method(mut self, method: AggregationMethod) -> Self {
        self.aggregation_method = Some(method);
        self
    }

    /// Configured thresholds in evaluation order
    ///
    /// A rule with no maximum and no `minScore` requires a perfect score.
    pub fn thresholds(&self) -> Vec<(AssertionName, f64)> {
        let mut thresholds = Vec::new();
        if let Some(min_score) = self.min_score {
            thresholds.push((AssertionName::MinScore, min_score));
        }
        if let Some(max_length) = self.max_length {
            thresholds.push((AssertionName::MaxLength, max_length));
        }
        if let Some(max_numeric_value) = self.max_numeric_value {
            thresholds.push((AssertionName::MaxNumericValue, max_numeric_value));
        }
        if thresholds.is_empty() {
            thresholds.push((AssertionName::MinScore, 1.0));
        }
        thresholds
    }
}

/// Level and thresholds of one configured rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRuleSetting", into = "RawRuleSetting")]
pub struct RuleSetting {
    pub level: AssertionLevel,
    pub options: AssertionOptions,
}

impl RuleSetting {
    pub fn new(level: AssertionLevel, options: AssertionOptions) -> Self {
        Self { level, options }
    }

    pub fn error(options: AssertionOptions) -> Self {
        Self::new(AssertionLevel::Error, options)
    }

    pub fn warn(options: AssertionOptions) -> Self {
        Self::new(AssertionLevel::Warn, options)
    }

    pub fn off() -> Self {
        Self::new(AssertionLevel::Off, AssertionOptions::default())
    }
}

/// Accepted config shapes: `"warn"`, `["warn"]`, `["warn", { ... }]`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawRuleSetting {
    WithOptions((AssertionLevel, AssertionOptions)),
    LevelOnly((AssertionLevel,)),
    Level(AssertionLevel),
}

impl From<RawRuleSetting> for RuleSetting {
    fn from(raw: RawRuleSetting) -> Self {
        match raw {
            RawRuleSetting::WithOptions((level, options)) => Self { level, options },
            RawRuleSetting::LevelOnly((level,)) | RawRuleSetting::Level(level) => Self {
                level,
                options: AssertionOptions::default(),
            },
        }
    }
}

impl From<RuleSetting> for RawRuleSetting {
    fn from(setting: RuleSetting) -> Self {
        RawRuleSetting::WithOptions((setting.level, setting.options))
    }
}

/// What an assertion checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssertionName {
    AuditRan,
    MinScore,
    MaxLength,
    MaxNumericValue,
}

impl AssertionName {
    /// Comparison a passing value must satisfy
    pub fn operator(self) -> Operator {
        match self {
            AssertionName::AuditRan => Operator::Eq,
            AssertionName::MinScore => Operator::Ge,
            AssertionName::MaxLength | AssertionName::MaxNumericValue => Operator::Le,
        }
    }

    pub fn is_min(self) -> bool {
        self == AssertionName::MinScore
    }

    pub fn is_max(self) -> bool {
        matches!(
            self,
            AssertionName::MaxLength | AssertionName::MaxNumericValue
        )
    }
}

impl fmt::Display for AssertionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssertionName::AuditRan => "auditRan",
            AssertionName::MinScore => "minScore",
            AssertionName::MaxLength => "maxLength",
            AssertionName::MaxNumericValue => "maxNumericValue",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Operator {
    pub fn holds(self, actual: f64, expected: f64) -> bool {
        match self {
            Operator::Eq => actual == expected,
            Operator::Ge => actual >= expected,
            Operator::Le => actual <= expected,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "==",
            Operator::Ge => ">=",
            Operator::Le => "<=",
        };
        f.write_str(symbol)
    }
}

/// A failed assertion
///
/// Passing checks produce no result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub name: AssertionName,
    pub operator: Operator,
    pub expected: f64,
    pub actual: f64,
    /// Per-run values the aggregate was computed from
    pub values: Vec<f64>,
    pub level: AssertionLevel,
    pub audit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_property: Option<String>,
    /// Page the runs measured
    pub url: String,
}

impl AssertionResult {
    pub fn is_error(&self) -> bool {
        self.level == AssertionLevel::Error
    }
}
