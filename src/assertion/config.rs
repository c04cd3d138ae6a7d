//! Assertion configuration documents
//!
//! One document holds a rule map plus an optional URL pattern and a default
//! aggregation method. TOML is the native format; JSON is accepted for
//! documents produced by other tools.

use crate::assertion::error::AssertionError;
use crate::assertion::rules::parse_rule_id;
use crate::assertion::types::{AggregationMethod, RuleSetting};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rules applied to every run whose URL matches `match_url_pattern`
///
/// # Example
/// ```
/// use auditgate::assertion::{AssertConfig, AssertionLevel};
///
/// let config = AssertConfig::from_toml_str(r#"
///     matchUrlPattern = "^https://example\\.com/"
///     aggregationMethod = "median-run"
///
///     [assertions]
///     "first-contentful-paint" = ["error", { maxNumericValue = 2000 }]
///     "uses-http2" = "warn"
/// "#).unwrap();
///
/// assert_eq!(config.assertions.len(), 2);
/// assert_eq!(config.assertions["uses-http2"].level, AssertionLevel::Warn);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertConfig {
    /// Rule id → level and thresholds, evaluated in id order
    #[serde(default)]
    pub assertions: BTreeMap<String, RuleSetting>,

    /// Regex a run's final URL must match; every URL when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_url_pattern: Option<String>,

    /// Method for rules that do not name their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation_method: Option<AggregationMethod>,
}

impl AssertConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse assertion TOML")?;
        config.validate().context("Invalid assertion config")?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).context("Failed to parse assertion JSON")?;
        config.validate().context("Invalid assertion config")?;
        Ok(config)
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>, setting: RuleSetting) -> Self {
        self.assertions.insert(rule_id.into(), setting);
        self
    }

    pub fn with_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.match_url_pattern = Some(pattern.into());
        self
    }

    pub fn with_aggregation_method(mut self, method: AggregationMethod) -> Self {
        self.aggregation_method = Some(method);
        self
    }

    /// Compiled URL pattern, if one is configured
    pub fn url_pattern(&self) -> std::result::Result<Option<Regex>, AssertionError> {
        self.match_url_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| AssertionError::InvalidUrlPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()
    }

    /// Check the pattern compiles, rule ids are well formed and thresholds
    /// are finite
    pub fn validate(&self) -> std::result::Result<(), AssertionError> {
        self.url_pattern()?;

        for (rule_id, setting) in &self.assertions {
            parse_rule_id(rule_id)?;

            let options = &setting.options;
            let thresholds = [
                ("minScore", options.min_score),
                ("maxLength", options.max_length),
                ("maxNumericValue", options.max_numeric_value),
            ];
            for (option, value) in thresholds {
                if let Some(value) = value.filter(|v| !v.is_finite()) {
                    return Err(AssertionError::InvalidThreshold {
                        rule_id: rule_id.clone(),
                        option,
                        value,
                    });
                }
            }
        }

        Ok(())
    }
}
