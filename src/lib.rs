//! Auditgate - diffing and quality gates for web page audit reports
//!
//! This library compares audit reports produced by repeated measurement runs
//! and grades runs against configured thresholds. Reports are noisy: content
//! hashes, random ports and timing wobble change between otherwise identical
//! runs, so matching, filtering and aggregation are all built to avoid false
//! positives from run-to-run flakiness.
//!
//! - [`diff`]: row matching, typed diffs, flakiness filtering and ranking
//! - [`assertion`]: multi-run aggregation and threshold rules
//! - [`representative`]: picks the most typical run out of several
//!
//! No I/O happens in the library; reports and configs come in as values (or
//! strings to parse) and results go out as values.

pub mod assertion;
pub mod diff;
pub mod report;
pub mod representative;
pub mod stats;
