//! Stable identity keys for detail-table rows
//!
//! Two runs of the same page rarely produce byte-identical rows: asset names
//! carry content hashes, dev servers bind random ports, embeds mint fresh ids.
//! The key for a row is picked from its most specific identifying field and
//! then scrubbed of those substrings so matching rows line up across runs.

use crate::report::{Item, ItemValue};
use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn query_string_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\?[^\s#"]*"#).expect("query string regex"))
}

fn embed_player_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(www-embed-player|player_ias)-[0-9a-z]+").expect("embed player regex")
    })
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
            .expect("uuid regex")
    })
}

fn local_port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1\]):[0-9]{2,5}")
            .expect("local port regex")
    })
}

fn content_hash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)([./_-])[0-9a-f]{8,}\.(js|mjs|css|html|json|map|woff2?|ttf|otf|png|jpe?g|gif|webp|avif|svg)\b",
        )
        .expect("content hash regex")
    })
}

/// Strip substrings that differ between otherwise identical runs
///
/// - query strings are removed
/// - embed-player id suffixes are dropped
/// - UUIDs become `UUID`
/// - local ports become `:PORT`
/// - content hashes in file names become `HASH` (`app.3f9a2b1c.js` → `app.HASH.js`)
pub fn normalize_nondeterministic(key: &str) -> String {
    let key = query_string_re().replace_all(key, "");
    let key = embed_player_re().replace_all(&key, "$1");
    let key = uuid_re().replace_all(&key, "UUID");
    let key = local_port_re().replace_all(&key, "$1:PORT");
    let key = content_hash_re().replace_all(&key, "${1}HASH.$2");
    key.into_owned()
}

/// Normalized identity of a detail-table row
pub fn identity_key(item: &Item) -> String {
    normalize_nondeterministic(&raw_identity(item))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn position(value: Option<f64>) -> Cow<'static, str> {
    match value {
        Some(n) => Cow::Owned(n.to_string()),
        None => Cow::Borrowed(""),
    }
}

fn node_path<'a>(item: &'a Item, key: &str) -> Option<&'a str> {
    item.reference(key, "node")
        .and_then(|node| non_empty(node.text("path")))
}

/// URL with its query string removed, so a position suffix appended after it
/// survives normalization
fn without_query(url: &str) -> Cow<'_, str> {
    query_string_re().replace_all(url, "")
}

/// Most specific identifying field of a row, before normalization
fn raw_identity(item: &Item) -> String {
    if let Some(source) = item.reference("source", "source-location") {
        if let Some(url) = non_empty(source.text("url")) {
            return format!(
                "{}:{}:{}",
                without_query(url),
                position(source.number("line")),
                position(source.number("column"))
            );
        }
    }

    if let (Some(url), Some(line), Some(column)) = (
        non_empty(item.text("url")),
        item.number("line"),
        item.number("column"),
    ) {
        return format!("{}:{}:{}", without_query(url), line, column);
    }

    for field in ["label", "groupLabel", "name", "statistic"] {
        if let Some(value) = non_empty(item.text(field)) {
            return value.to_string();
        }
    }

    if let Some(text) = item
        .reference("entity", "link")
        .and_then(|entity| non_empty(entity.text("text")))
    {
        return text.to_string();
    }

    if let Some(path) = node_path(item, "node") {
        return path.to_string();
    }

    if let (Some(tap), Some(overlap)) = (
        node_path(item, "tapTarget"),
        node_path(item, "overlappingTarget"),
    ) {
        return format!("{}-{}", tap, overlap);
    }

    for field in ["url", "origin"] {
        if let Some(value) = non_empty(item.text(field)) {
            return value.to_string();
        }
    }

    // Keys are sorted, so the serialization is stable. Plain string-keyed
    // values cannot fail to serialize.
    serde_json::to_string(&without_private_fields(item)).unwrap_or_default()
}

/// Copy of `item` without `_`-prefixed fields, at every nesting level
fn without_private_fields(item: &Item) -> Item {
    item.iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| {
            let value = match value {
                ItemValue::Record(nested) => ItemValue::Record(without_private_fields(nested)),
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}
