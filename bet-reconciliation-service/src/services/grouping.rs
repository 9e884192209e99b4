//! Clusters still-unmatched statement records into event groups.

use crate::models::{BookieGroup, BookieTransaction, ExchangeGroup, ExchangeTransaction};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("Invalid NON_ALPHANUMERIC pattern"));

/// Lowercase, drop punctuation, sort the words. Word order differs
/// between the two feeds, so comparison happens on sorted words.
pub fn normalize_and_sort(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = NON_ALPHANUMERIC.replace_all(&lowered, "");
    let mut words: Vec<&str> = stripped.split_whitespace().collect();
    words.sort_unstable();
    words.join(" ")
}

/// Ids folded into one group key, plus the index of the first record seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedIds {
    pub first_index: usize,
    pub ids: Vec<String>,
    pub search_string: String,
}

/// Group `records` by `key_of`, skipping records without a key.
///
/// The search string is the union of every normalized text field seen in
/// the group, each distinct value kept once in first-seen order. Groups
/// come back ordered by key.
pub fn group_by_source<T>(
    records: &[T],
    id_of: impl Fn(&T) -> String,
    key_of: impl Fn(&T) -> Option<String>,
    texts_of: impl Fn(&T) -> Vec<String>,
) -> BTreeMap<String, GroupedIds> {
    let mut groups: BTreeMap<String, (GroupedIds, Vec<String>)> = BTreeMap::new();

    for (index, record) in records.iter().enumerate() {
        let Some(key) = key_of(record) else {
            continue;
        };
        let (group, terms) = groups.entry(key).or_insert_with(|| {
            (
                GroupedIds {
                    first_index: index,
                    ..Default::default()
                },
                Vec::new(),
            )
        });
        group.ids.push(id_of(record));
        for text in texts_of(record) {
            let normalized = normalize_and_sort(&text);
            if !normalized.is_empty() && !terms.contains(&normalized) {
                terms.push(normalized);
            }
        }
    }

    groups
        .into_iter()
        .map(|(key, (mut group, terms))| {
            group.search_string = terms.join(" ");
            (key, group)
        })
        .collect()
}

/// Exchange records grouped by settlement date, time and event hint.
pub fn group_exchange(records: &[ExchangeTransaction]) -> Vec<ExchangeGroup> {
    let key_of = |r: &ExchangeTransaction| -> Option<String> {
        Some(format!(
            "{}_{}_{}",
            r.formatted_settled_date.as_deref().unwrap_or_default(),
            r.formatted_settled_time.as_deref().unwrap_or_default(),
            r.bookie_match_event.as_deref().unwrap_or_default()
        ))
    };
    let texts_of = |r: &ExchangeTransaction| -> Vec<String> {
        [&r.bookie_match_selection, &r.bookie_match_event]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    };

    group_by_source(records, |r| r.id.clone(), key_of, texts_of)
        .into_values()
        .map(|grouped| {
            let first = &records[grouped.first_index];
            ExchangeGroup {
                settled_date: first.formatted_settled_date.clone().unwrap_or_default(),
                settled_time: first.formatted_settled_time.clone().unwrap_or_default(),
                event_hint: first.bookie_match_event.clone().unwrap_or_default(),
                settled_at_millis: first.settled_at_millis(),
                ids: grouped.ids,
                search_string: grouped.search_string,
            }
        })
        .collect()
}

/// Bookie records grouped by market time and event name. Records missing
/// either are left out and stay unmatched.
pub fn group_bookie(records: &[BookieTransaction]) -> Vec<BookieGroup> {
    let key_of = |r: &BookieTransaction| -> Option<String> {
        let market_time = r.market_time_millis()?;
        let event_name = r.event_name()?;
        Some(format!("{}_{}", market_time, event_name))
    };
    let texts_of = |r: &BookieTransaction| -> Vec<String> {
        [r.selection_name(), r.event_name()]
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect()
    };

    group_by_source(records, |r| r.id.clone(), key_of, texts_of)
        .into_values()
        .filter_map(|grouped| {
            let first = &records[grouped.first_index];
            Some(BookieGroup {
                market_time_millis: first.market_time_millis()?,
                event_name: first.event_name()?.to_string(),
                ids: grouped.ids,
                search_string: grouped.search_string,
            })
        })
        .collect()
}
