use thiserror::Error;

/// Rejected assertion input
///
/// Missing audits are not errors; they surface as `auditRan` results.
#[derive(Error, Debug)]
pub enum AssertionError {
    #[error("runs from several URLs passed to a single evaluation: {first} and {second}")]
    MixedUrls { first: String, second: String },

    #[error("no runs to evaluate")]
    NoRuns,

    #[error("invalid URL pattern {pattern:?}")]
    InvalidUrlPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule {rule_id}: {option} must be finite, got {value}")]
    InvalidThreshold {
        rule_id: String,
        option: &'static str,
        value: f64,
    },

    #[error("rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },
}

/// Result type for assertion evaluation
pub type Result<T> = std::result::Result<T, AssertionError>;
