//! Audit report model
//!
//! Mirrors the JSON document the measurement tool emits for one run of one
//! page. Reports are read-only inputs: every diff and assertion in this crate
//! is computed from borrowed reports and never writes back into them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audit id of the first-contentful-paint metric
pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Audit id of the time-to-interactive metric
pub const INTERACTIVE: &str = "interactive";

/// Category group tag shared by the core timing metrics
pub const METRICS_GROUP: &str = "metrics";

/// Details type whose items are opaque debug payloads, never diffed
pub const DEBUG_DATA_DETAILS: &str = "debugdata";

/// One measurement of one page
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    /// URL the page ended up on after redirects
    #[serde(default)]
    pub final_url: String,

    /// Audit id → result
    #[serde(default)]
    pub audits: BTreeMap<String, AuditResult>,

    /// Category id → category summary
    #[serde(default)]
    pub categories: BTreeMap<String, CategoryResult>,
}

impl AuditReport {
    /// Create an empty report for a URL
    pub fn new(final_url: impl Into<String>) -> Self {
        Self {
            final_url: final_url.into(),
            ..Self::default()
        }
    }

    /// Add an audit, keyed by its id
    pub fn with_audit(mut self, audit: AuditResult) -> Self {
        self.audits.insert(audit.id.clone(), audit);
        self
    }

    /// Add a category, keyed by `id`
    pub fn with_category(mut self, id: impl Into<String>, category: CategoryResult) -> Self {
        self.categories.insert(id.into(), category);
        self
    }

    /// Look up an audit by id
    pub fn audit(&self, audit_id: &str) -> Option<&AuditResult> {
        self.audits.get(audit_id)
    }

    /// Group tag the categories assign to an audit, if any
    ///
    /// Categories are scanned in id order so the answer is stable when two
    /// categories reference the same audit with different groups.
    pub fn audit_group(&self, audit_id: &str) -> Option<&str> {
        self.categories
            .values()
            .flat_map(|category| category.audit_refs.iter())
            .filter(|audit_ref| audit_ref.id == audit_id)
            .find_map(|audit_ref| audit_ref.group.as_deref())
    }

    /// Numeric value of an audit, when present and finite
    pub fn metric(&self, audit_id: &str) -> Option<f64> {
        self.audit(audit_id)
            .and_then(|audit| audit.numeric_value)
            .filter(|value| value.is_finite())
    }
}

/// Category summary referencing the audits that feed it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Weighted category score in [0, 1]
    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub audit_refs: Vec<AuditRef>,
}

impl CategoryResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_audit_ref(mut self, audit_id: impl Into<String>, group: Option<&str>) -> Self {
        self.audit_refs.push(AuditRef {
            id: audit_id.into(),
            weight: None,
            group: group.map(str::to_string),
        });
        self
    }
}

/// Reference from a category to one of its audits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRef {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// How an audit's score should be interpreted
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScoreDisplayMode {
    Binary,
    #[default]
    Numeric,
    Manual,
    NotApplicable,
    Informative,
    Error,
}

/// Result of one audit within one report
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditResult {
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Score in [0, 1]; `None` when the audit is not scored
    #[serde(default)]
    pub score: Option<f64>,

    #[serde(default)]
    pub score_display_mode: ScoreDisplayMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Details>,
}

impl AuditResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_display_mode(mut self, mode: ScoreDisplayMode) -> Self {
        self.score_display_mode = mode;
        self
    }

    pub fn with_numeric_value(mut self, value: f64) -> Self {
        self.numeric_value = Some(value);
        self
    }

    pub fn with_display_value(mut self, value: impl Into<String>) -> Self {
        self.display_value = Some(value.into());
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = Some(details);
        self
    }

    /// Score with display-mode overrides applied
    ///
    /// `notApplicable` reads as a pass (1) and `informative` as a fail (0);
    /// the stored score is left untouched.
    pub fn normalized_score(&self) -> Option<f64> {
        match self.score_display_mode {
            ScoreDisplayMode::NotApplicable => Some(1.0),
            ScoreDisplayMode::Informative => Some(0.0),
            _ => self.score,
        }
    }

    /// True when the audit carries a score or a mode that implies one
    pub fn defines_score(&self) -> bool {
        self.score.is_some()
            || matches!(
                self.score_display_mode,
                ScoreDisplayMode::NotApplicable | ScoreDisplayMode::Informative
            )
    }

    /// Numeric value, falling back to the details' `overallSavingsMs`
    pub fn numeric_value_or_savings(&self) -> Option<f64> {
        self.numeric_value.or_else(|| {
            self.details
                .as_ref()
                .and_then(|details| details.overall_savings_ms)
        })
    }

    /// Detail table rows, unless the details are opaque debug data
    pub fn items(&self) -> Option<&[Item]> {
        let details = self.details.as_ref()?;
        if details.kind == DEBUG_DATA_DETAILS {
            return None;
        }
        details.items.as_deref()
    }

    /// Column headings of the detail table
    pub fn headings(&self) -> &[Heading] {
        self.details
            .as_ref()
            .map(|details| details.headings.as_slice())
            .unwrap_or_default()
    }

    pub fn has_item_details(&self) -> bool {
        self.items().is_some()
    }
}

/// Structured details attached to an audit
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    /// Details type tag (`table`, `opportunity`, `debugdata`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,

    #[serde(default)]
    pub headings: Vec<Heading>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_savings_ms: Option<f64>,
}

impl Details {
    /// Table details with the given headings and rows
    pub fn table(headings: Vec<Heading>, items: Vec<Item>) -> Self {
        Self {
            kind: "table".to_string(),
            items: Some(items),
            headings,
            overall_savings_ms: None,
        }
    }
}

/// Column descriptor of a detail table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Heading {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Heading {
    pub fn new(key: impl Into<String>, value_type: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value_type: Some(value_type.into()),
            label: None,
        }
    }
}

/// One row of a detail table
///
/// Rows have no fixed schema. Fields are looked up by name and typed access
/// returns `None` rather than coercing a value of another kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Item(BTreeMap<String, ItemValue>);

impl Item {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ItemValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ItemValue> {
        self.0.get(key)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(ItemValue::as_f64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ItemValue::as_str)
    }

    pub fn record(&self, key: &str) -> Option<&Item> {
        self.get(key).and_then(ItemValue::as_record)
    }

    /// Nested record whose `type` tag equals `kind`
    pub fn reference(&self, key: &str, kind: &str) -> Option<&Item> {
        self.record(key)
            .filter(|record| record.text("type") == Some(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ItemValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ItemValue)> for Item {
    fn from_iter<I: IntoIterator<Item = (String, ItemValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Field value inside an [`Item`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ItemValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<ItemValue>),
    /// Nested record; references such as DOM nodes or source locations are
    /// records carrying a `type` tag
    Record(Item),
}

impl ItemValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ItemValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ItemValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Item> {
        match self {
            ItemValue::Record(item) => Some(item),
            _ => None,
        }
    }
}

impl From<f64> for ItemValue {
    fn from(value: f64) -> Self {
        ItemValue::Number(value)
    }
}

impl From<i64> for ItemValue {
    fn from(value: i64) -> Self {
        ItemValue::Number(value as f64)
    }
}

impl From<bool> for ItemValue {
    fn from(value: bool) -> Self {
        ItemValue::Bool(value)
    }
}

impl From<&str> for ItemValue {
    fn from(value: &str) -> Self {
        ItemValue::Text(value.to_string())
    }
}

impl From<String> for ItemValue {
    fn from(value: String) -> Self {
        ItemValue::Text(value)
    }
}

impl From<Item> for ItemValue {
    fn from(value: Item) -> Self {
        ItemValue::Record(value)
    }
}
