//! Family grouping of processed poster entries.
//!
//! Line items sharing the exact same base name are merged into one
//! "family" entry, so a poster reads "SUCO DEL VALLE 1L" instead of one
//! poster per flavor.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::models::ProcessedItem;

/// Merge items with the same base name into family entries.
///
/// - Groups are emitted in order of first appearance of each base name.
/// - A group of one is passed through unchanged.
/// - A group of two or more becomes a single family item (see
///   [`merge_family`]); `next_id` supplies its process-local id.
pub fn group_families(
    items: Vec<ProcessedItem>,
    mut next_id: impl FnMut() -> i64,
) -> Vec<ProcessedItem> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<ProcessedItem>> = HashMap::new();

    for item in items {
        let key = item.base_name().to_string();
        match groups.get_mut(&key) {
            Some(group) => group.push(item),
            None => {
                order.push(key.clone());
                groups.insert(key, vec![item]);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .map(|mut group| {
            if group.len() == 1 {
                group.remove(0)
            } else {
                merge_family(next_id(), group)
            }
        })
        .collect()
}

/// Build one family item from two or more members.
///
/// - base name: the first member's
/// - price: arithmetic mean, rounded to cents
/// - weight: most frequent weight, ties going to the one seen first; a
///   missing weight counts as a value of its own
/// - variety: kept only when every member carries the same non-empty
///   variety, otherwise empty. A wrong flavor on a poster is worse than
///   none.
pub fn merge_family(id: i64, members: Vec<ProcessedItem>) -> ProcessedItem {
    let base_name = members
        .first()
        .map(|m| m.base_name().to_string())
        .unwrap_or_default();
    let price = average_price(&members);
    let weight = most_frequent_weight(&members);
    let variety = shared_variety(&members);

    ProcessedItem::family(id, base_name, weight, variety, price, members)
}

fn average_price(members: &[ProcessedItem]) -> Decimal {
    if members.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = members.iter().map(|m| m.price).sum();
    total / Decimal::from(members.len())
}

fn most_frequent_weight(members: &[ProcessedItem]) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for m in members {
        match counts.iter_mut().find(|(w, _)| *w == m.weight()) {
            Some((_, n)) => *n += 1,
            None => counts.push((m.weight(), 1)),
        }
    }

    // max_by_key keeps the last maximum, so walk in reverse to favour the
    // first-seen weight on ties.
    counts
        .iter()
        .rev()
        .max_by_key(|(_, n)| *n)
        .map(|(w, _)| w.to_string())
        .unwrap_or_default()
}

fn shared_variety(members: &[ProcessedItem]) -> String {
    let first = match members.first() {
        Some(m) if !m.variety().is_empty() => m.variety(),
        _ => return String::new(),
    };
    if members.iter().all(|m| m.variety() == first) {
        first.to_string()
    } else {
        String::new()
    }
}
