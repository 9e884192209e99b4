//! Reconciliation aggregator.
//!
//! Every record lands in exactly one bucket, checked in this order:
//! listed by a matched event, non-trading or excluded, unmatched.

use crate::config::Collections;
use crate::models::{
    BookieTransaction, DailySummary, DateRange, Diagnostic, DiagnosticKind, EventFigures,
    ExchangeTransaction, MatchState, MatchedEvent, ReconciliationSummary, UnmatchedBucket,
    UNKNOWN_DATE,
};
use crate::services::figures::{bookie_pnl, compute_figures, exchange_balance};
use crate::services::gateway::LedgerSnapshot;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

fn in_range(range: Option<&DateRange>, key: &str) -> bool {
    range.map_or(true, |r| r.contains_key(key))
}

fn exchange_date_key(record: &ExchangeTransaction) -> String {
    record
        .settled_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

fn bookie_date_key(record: &BookieTransaction) -> String {
    record
        .market_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// Build the summary from a loaded snapshot. With a range, only entries
/// whose date key falls inside it are counted.
pub fn aggregate(
    snapshot: &LedgerSnapshot,
    collections: &Collections,
    range: Option<&DateRange>,
) -> ReconciliationSummary {
    let mut summary = ReconciliationSummary {
        diagnostics: snapshot.diagnostics.clone(),
        ..Default::default()
    };

    let exchange_by_id: HashMap<&str, &ExchangeTransaction> = snapshot
        .exchange
        .iter()
        .map(|r| (r.id.as_str(), r))
        .collect();
    let bookie_by_id: HashMap<&str, &BookieTransaction> = snapshot
        .bookie
        .iter()
        .map(|r| (r.id.as_str(), r))
        .collect();

    let mut owned_exchange: HashSet<&str> = HashSet::new();
    let mut owned_bookie: HashSet<&str> = HashSet::new();

    // ------------------------------------------------------------------
    // Matched events
    // ------------------------------------------------------------------
    for event in &snapshot.events {
        let exchange_ids = claim_ids(
            event,
            &event.betfair_doc_ids,
            &mut owned_exchange,
            &collections.exchange,
            &mut summary.diagnostics,
        );
        let bookie_ids = claim_ids(
            event,
            &event.bookie_doc_ids,
            &mut owned_bookie,
            &collections.bookie,
            &mut summary.diagnostics,
        );

        let date_key = event.date_key();
        if !in_range(range, &date_key) {
            continue;
        }

        let exchange_records: Vec<ExchangeTransaction> = exchange_ids
            .iter()
            .filter_map(|id| {
                let found = exchange_by_id.get(id).map(|r| (*r).clone());
                if found.is_none() {
                    summary.diagnostics.push(missing(&collections.exchange, id, event));
                }
                found
            })
            .collect();
        let bookie_records: Vec<BookieTransaction> = bookie_ids
            .iter()
            .filter_map(|id| {
                let found = bookie_by_id.get(id).map(|r| (*r).clone());
                if found.is_none() {
                    summary.diagnostics.push(missing(&collections.bookie, id, event));
                }
                found
            })
            .collect();

        let mut figures: EventFigures = match &event.figures {
            Some(persisted) => persisted.clone(),
            None => compute_figures(
                &exchange_records,
                &bookie_records,
                &collections.exchange,
                &collections.bookie,
                &mut summary.diagnostics,
            ),
        };
        figures.betfair_count = exchange_ids.len();
        figures.bookie_count = bookie_ids.len();
        figures.total_count = exchange_ids.len() + bookie_ids.len();

        let day = summary
            .daily_breakdown
            .entry(date_key)
            .or_default();
        day.total_betfair_balance += figures.betfair_balance;
        day.total_bookie_balance += figures.bookie_balance;
        day.total_trade_gp += figures.trade_gp;
        day.total_count += figures.total_count;

        let balances = &mut summary.balances;
        balances.total_betfair_balance += figures.betfair_balance;
        balances.total_bookie_balance += figures.bookie_balance;
        balances.total_trade_gp += figures.trade_gp;
        balances.grand_total_betfair += figures.betfair_balance;
        balances.grand_total_bookie += figures.bookie_balance;

        let counts = &mut summary.summary_counts;
        counts.event_data_count += 1;
        counts.matched_betfair_count += exchange_ids.len();
        counts.matched_bookie_count += bookie_ids.len();

        day.events.insert(event.id.clone(), figures);
    }

    // ------------------------------------------------------------------
    // Exchange records outside matched events
    // ------------------------------------------------------------------
    for record in &snapshot.exchange {
        if owned_exchange.contains(record.id.as_str()) {
            continue;
        }
        let date_key = exchange_date_key(record);
        if !in_range(range, &date_key) {
            continue;
        }
        let amount = exchange_balance(record, &collections.exchange, &mut summary.diagnostics);

        if record.is_transfer() || record.match_state() == MatchState::Excluded {
            let non_trading = &mut summary.non_trading_totals;
            non_trading.betfair_ids.push(record.id.clone());
            non_trading.total_betfair += amount;
            summary.summary_counts.non_trading_betfair_count += 1;
            summary.balances.total_non_trading_betfair += amount;
            summary.balances.grand_total_betfair += amount;
            continue;
        }

        if record.match_state() == MatchState::Matched {
            summary
                .diagnostics
                .push(orphan_marker(&collections.exchange, &record.id));
        }
        let bucket = summary
            .unmatched_buckets
            .betfair
            .entry(date_key)
            .or_default();
        bucket.total_betfair_balance += amount;
        bucket.total_trade_gp += amount;
        bucket.total_count += 1;
        bucket.transaction_ids.push(record.id.clone());
        summary.summary_counts.unmatched_betfair_count += 1;
        summary.balances.total_unmatched_betfair += amount;
        summary.balances.grand_total_betfair += amount;
    }

    // ------------------------------------------------------------------
    // Bookie records outside matched events
    // ------------------------------------------------------------------
    for record in &snapshot.bookie {
        if owned_bookie.contains(record.id.as_str()) {
            continue;
        }
        let date_key = bookie_date_key(record);
        if !in_range(range, &date_key) {
            continue;
        }
        let amount = bookie_pnl(record, &collections.bookie, &mut summary.diagnostics);

        if record.action().is_non_trading() || record.match_state() == MatchState::Excluded {
            let non_trading = &mut summary.non_trading_totals;
            non_trading.bookie_ids.push(record.id.clone());
            non_trading.total_bookie += amount;
            summary.summary_counts.non_trading_bookie_count += 1;
            summary.balances.total_non_trading_bookie += amount;
            summary.balances.grand_total_bookie += amount;
            continue;
        }

        if record.match_state() == MatchState::Matched {
            summary
                .diagnostics
                .push(orphan_marker(&collections.bookie, &record.id));
        }
        let bucket = summary
            .unmatched_buckets
            .bookie
            .entry(date_key)
            .or_default();
        bucket.total_bookie_balance += amount;
        bucket.total_trade_gp += amount;
        bucket.total_count += 1;
        bucket.transaction_ids.push(record.id.clone());
        summary.summary_counts.unmatched_bookie_count += 1;
        summary.balances.total_unmatched_bookie += amount;
        summary.balances.grand_total_bookie += amount;
    }

    summary.summary_counts.daily_summary_count = summary.daily_breakdown.len();
    debug!(
        events = summary.summary_counts.event_data_count,
        unmatched_betfair = summary.summary_counts.unmatched_betfair_count,
        unmatched_bookie = summary.summary_counts.unmatched_bookie_count,
        diagnostics = summary.diagnostics.len(),
        "Reconciliation summary built"
    );
    summary
}

/// Ids of `event` not already owned by an earlier event. Double listings
/// are reported and counted once.
fn claim_ids<'a>(
    event: &MatchedEvent,
    ids: &'a [String],
    owned: &mut HashSet<&'a str>,
    collection: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<&'a str> {
    let mut claimed = Vec::with_capacity(ids.len());
    for id in ids {
        if owned.insert(id.as_str()) {
            claimed.push(id.as_str());
        } else {
            warn!(event_id = %event.id, record_id = %id, "Record listed by more than one matched event");
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::Conflict,
                collection,
                id.clone(),
                format!("Also listed by matched event {}", event.id),
            ));
        }
    }
    claimed
}

fn missing(collection: &str, id: &str, event: &MatchedEvent) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::NotFound,
        collection,
        id,
        format!("Referenced by matched event {} but missing", event.id),
    )
}

fn orphan_marker(collection: &str, id: &str) -> Diagnostic {
    warn!(collection = collection, record_id = id, "Matched marker without an owning event");
    Diagnostic::new(
        DiagnosticKind::Validation,
        collection,
        id,
        "Marked as matched but no matched event lists it; counted as unmatched",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::store::Document;
    use serde_json::{json, Value};

    fn doc(id: &str, fields: Value) -> Document {
        Document::new(id, fields.as_object().cloned().unwrap_or_default())
    }

    fn snapshot() -> LedgerSnapshot {
        let exchange = vec![
            ("b1", json!({ "formattedSettledDate": "2024-03-02", "creditAmount": "10.00", "Matched": "YES" })),
            ("b2", json!({ "formattedSettledDate": "2024-03-02", "event": { "nameAndSelectionName": "Cross accounts transfer" }, "creditAmount": "100" })),
            ("b3", json!({ "formattedSettledDate": "2024-03-03", "debitAmount": "(4.00)" })),
            ("b4", json!({ "formattedSettledDate": "2024-03-04", "creditAmount": "1", "Matched": "YES" })),
        ];
        let bookie = vec![
            ("k1", json!({ "pnl": -9.0, "Matched": "YES", "description": { "marketTime": 1_709_393_400_000i64 } })),
            ("k2", json!({ "action": "CREDIT", "pnl": 25 })),
            ("k3", json!({ "pnl": 3.5 })),
        ];
        LedgerSnapshot {
            exchange: exchange
                .into_iter()
                .map(|(id, f)| ExchangeTransaction::from_document(&doc(id, f)).unwrap())
                .collect(),
            bookie: bookie
                .into_iter()
                .map(|(id, f)| BookieTransaction::from_document(&doc(id, f)).unwrap())
                .collect(),
            events: vec![MatchedEvent::from_document(&doc(
                "2024-03-02_1709393400000_Arsenal v Chelsea",
                json!({ "betfairDocIds": ["b1"], "bookieDocIds": ["k1"] }),
            ))
            .unwrap()],
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_every_record_lands_in_exactly_one_bucket() {
        let snapshot = snapshot();
        let summary = aggregate(&snapshot, &Collections::default(), None);
        let counts = &summary.summary_counts;

        assert_eq!(counts.matched_betfair_count, 1);
        assert_eq!(counts.non_trading_betfair_count, 1);
        assert_eq!(counts.unmatched_betfair_count, 2);
        assert_eq!(
            counts.matched_betfair_count
                + counts.non_trading_betfair_count
                + counts.unmatched_betfair_count,
            snapshot.exchange.len()
        );
        assert_eq!(counts.matched_bookie_count, 1);
        assert_eq!(counts.non_trading_bookie_count, 1);
        assert_eq!(counts.unmatched_bookie_count, 1);

        // Recomputed from records: 10 + -9.
        let day = &summary.daily_breakdown["2024-03-02"];
        assert_eq!(day.total_trade_gp, 1.0);
        assert_eq!(summary.balances.grand_total_betfair, 10.0 + 100.0 - 4.0 + 1.0);
        assert_eq!(summary.balances.grand_total_bookie, -9.0 + 25.0 + 3.5);
        assert_eq!(summary.unmatched_buckets.bookie["Unknown"].transaction_ids, vec!["k3"]);
    }

    #[test]
    fn test_orphan_matched_marker_is_reported() {
        let summary = aggregate(&snapshot(), &Collections::default(), None);
        let orphan: Vec<&Diagnostic> = summary
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::Validation)
            .collect();

        assert_eq!(orphan.len(), 1);
        assert_eq!(orphan[0].record_id, "b4");
        assert_eq!(
            summary.unmatched_buckets.betfair["2024-03-04"].transaction_ids,
            vec!["b4"]
        );
    }

    #[test]
    fn test_missing_referenced_record_contributes_zero() {
        let mut snapshot = snapshot();
        snapshot.events[0].bookie_doc_ids.push("gone".to_string());
        let summary = aggregate(&snapshot, &Collections::default(), None);

        let day = &summary.daily_breakdown["2024-03-02"];
        assert_eq!(day.total_trade_gp, 1.0);
        assert_eq!(day.total_count, 3);
        assert!(summary
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::NotFound && d.record_id == "gone"));
    }

    #[test]
    fn test_range_excludes_unknown_and_out_of_range_dates() {
        let range = DateRange::parse("2024-03-03", "2024-03-04").unwrap();
        let summary = aggregate(&snapshot(), &Collections::default(), Some(&range));

        assert!(summary.daily_breakdown.is_empty());
        assert_eq!(summary.summary_counts.unmatched_betfair_count, 2);
        assert_eq!(summary.summary_counts.unmatched_bookie_count, 0);
        assert_eq!(summary.summary_counts.non_trading_betfair_count, 0);
    }
}
