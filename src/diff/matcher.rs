//! Row matching between a base and a compare detail table
//!
//! Rows are paired by normalized identity key. A key that is not unique on
//! either side is never resolved by guessing: every row under it is reported
//! unpaired, so the diff shows an explicit removal/addition instead of a
//! possibly wrong pairing.

use crate::diff::normalize::identity_key;
use crate::report::Item;
use std::collections::HashMap;

/// A row together with its position in its table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedItem<'a> {
    pub index: usize,
    pub item: &'a Item,
}

/// One matched (or unmatched) row
#[derive(Debug, Clone, PartialEq)]
pub struct ZippedItem<'a> {
    /// Normalized identity key shared by both sides
    pub key: String,
    pub base: Option<IndexedItem<'a>>,
    pub compare: Option<IndexedItem<'a>>,
}

#[derive(Default)]
struct KeyGroup<'a> {
    base: Vec<IndexedItem<'a>>,
    compare: Vec<IndexedItem<'a>>,
}

/// Pair base and compare rows by identity key
///
/// Output follows the order in which keys first appear, base rows first,
/// so the result is deterministic for a given input.
pub fn zip_items<'a>(base: &'a [Item], compare: &'a [Item]) -> Vec<ZippedItem<'a>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, KeyGroup<'a>> = HashMap::new();

    let sides = base
        .iter()
        .enumerate()
        .map(|(index, item)| (true, IndexedItem { index, item }))
        .chain(
            compare
                .iter()
                .enumerate()
                .map(|(index, item)| (false, IndexedItem { index, item })),
        );

    for (is_base, indexed) in sides {
        let key = identity_key(indexed.item);
        let group = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            KeyGroup::default()
        });
        if is_base {
            group.base.push(indexed);
        } else {
            group.compare.push(indexed);
        }
    }

    let mut zipped = Vec::with_capacity(base.len().max(compare.len()));
    for key in order {
        let Some(mut group) = groups.remove(&key) else {
            continue;
        };

        if group.base.len() > 1 || group.compare.len() > 1 {
            tracing::debug!(
                key = %key,
                base_rows = group.base.len(),
                compare_rows = group.compare.len(),
                "ambiguous item key, reporting rows unpaired"
            );
            for indexed in group.base {
                zipped.push(ZippedItem {
                    key: key.clone(),
                    base: Some(indexed),
                    compare: None,
                });
            }
            for indexed in group.compare {
                zipped.push(ZippedItem {
                    key: key.clone(),
                    base: None,
                    compare: Some(indexed),
                });
            }
        } else {
            zipped.push(ZippedItem {
                key,
                base: group.base.pop(),
                compare: group.compare.pop(),
            });
        }
    }

    zipped
}
