//! Integration tests for the reconciliation summary.

mod common;

use bet_reconciliation_service::models::{DateRange, DiagnosticKind};
use common::{
    bookie_doc, document, exchange_doc, spawn_app, TestApp, HOUR_MILLIS, KICK_OFF_MILLIS,
};
use serde_json::json;
use std::collections::HashSet;

async fn seed_ledger(app: &TestApp) {
    app.seed_exchange(vec![
        exchange_doc("b1", "2024-03-02 15:30", "Arsenal Chelsea", 12.0),
        exchange_doc("b2", "2024-03-02 15:30", "Arsenal Chelsea", -2.0),
        exchange_doc("b3", "2024-03-05 20:00", "Spurs Fulham", 4.0),
        document(
            "t1",
            json!({
                "formattedSettledDate": "2024-03-03",
                "creditAmount": "1,000",
                "winLose": "-",
                "event": { "nameAndSelectionName": "Cross accounts transfer" }
            }),
        ),
        document(
            "x1",
            json!({ "formattedSettledDate": "2024-03-04", "creditAmount": "n/a" }),
        ),
    ])
    .await;
    app.seed_bookie(vec![
        bookie_doc("k1", KICK_OFF_MILLIS + HOUR_MILLIS, "Chelsea Arsenal", -9.0),
        bookie_doc("k2", KICK_OFF_MILLIS + 30 * 24 * HOUR_MILLIS, "Wolves Leeds", 2.5),
        document("c1", json!({ "action": "CREDIT", "pnl": 25 })),
    ])
    .await;
}

fn all_ids(records: &[&str]) -> HashSet<String> {
    records.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn every_record_lands_in_exactly_one_bucket() {
    let app = spawn_app();
    seed_ledger(&app).await;

    let outcome = app.service().run_matching(&[], &[]).await;
    assert!(outcome.success, "Expected success, got: {:?}", outcome);
    assert_eq!(outcome.events_created, 1);

    let summary = app
        .service()
        .get_reconciliation_summary(None)
        .await
        .expect("summary");
    let counts = &summary.summary_counts;

    assert_eq!(counts.event_data_count, 1);
    assert_eq!(counts.matched_betfair_count, 2);
    assert_eq!(counts.matched_bookie_count, 1);
    assert_eq!(counts.non_trading_betfair_count, 1);
    assert_eq!(counts.non_trading_bookie_count, 1);
    assert_eq!(counts.unmatched_betfair_count, 2);
    assert_eq!(counts.unmatched_bookie_count, 1);

    // Exchange partition
    let mut exchange_seen: Vec<String> = Vec::new();
    for event in app.events().await {
        for id in event.fields["betfairDocIds"].as_array().unwrap() {
            exchange_seen.push(id.as_str().unwrap().to_string());
        }
    }
    exchange_seen.extend(summary.non_trading_totals.betfair_ids.iter().cloned());
    for bucket in summary.unmatched_buckets.betfair.values() {
        exchange_seen.extend(bucket.transaction_ids.iter().cloned());
    }
    let unique: HashSet<String> = exchange_seen.iter().cloned().collect();
    assert_eq!(unique.len(), exchange_seen.len(), "double counted: {:?}", exchange_seen);
    assert_eq!(unique, all_ids(&["b1", "b2", "b3", "t1", "x1"]));

    // Bookie partition
    let mut bookie_seen: Vec<String> = Vec::new();
    for event in app.events().await {
        for id in event.fields["bookieDocIds"].as_array().unwrap() {
            bookie_seen.push(id.as_str().unwrap().to_string());
        }
    }
    bookie_seen.extend(summary.non_trading_totals.bookie_ids.iter().cloned());
    for bucket in summary.unmatched_buckets.bookie.values() {
        bookie_seen.extend(bucket.transaction_ids.iter().cloned());
    }
    let unique: HashSet<String> = bookie_seen.iter().cloned().collect();
    assert_eq!(unique.len(), bookie_seen.len(), "double counted: {:?}", bookie_seen);
    assert_eq!(unique, all_ids(&["k1", "k2", "c1"]));

    // Totals
    let day = &summary.daily_breakdown["2024-03-02"];
    assert_eq!(day.total_betfair_balance, 10.0);
    assert_eq!(day.total_bookie_balance, -9.0);
    assert_eq!(day.total_trade_gp, 1.0);
    assert_eq!(day.total_count, 3);
    assert_eq!(summary.balances.total_non_trading_betfair, 1000.0);
    assert_eq!(summary.balances.grand_total_betfair, 10.0 + 1000.0 + 4.0);
    assert_eq!(summary.balances.grand_total_bookie, -9.0 + 25.0 + 2.5);

    // The unparseable amount is counted as zero and reported.
    assert!(summary
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Validation && d.record_id == "x1"));
}

#[tokio::test]
async fn ranged_summary_keeps_only_dates_inside_the_range() {
    let app = spawn_app();
    seed_ledger(&app).await;
    app.service().run_matching(&[], &[]).await;

    let range = DateRange::parse("2024-03-03", "2024-03-05").unwrap();
    let summary = app
        .service()
        .get_reconciliation_summary(Some(&range))
        .await
        .expect("summary");

    assert!(summary.daily_breakdown.is_empty());
    assert_eq!(summary.summary_counts.event_data_count, 0);
    assert_eq!(summary.summary_counts.non_trading_betfair_count, 1);
    assert_eq!(summary.summary_counts.unmatched_betfair_count, 2);
    assert!(summary.unmatched_buckets.betfair.contains_key("2024-03-05"));
    // The bookie credit has no market date and k2 settles in April.
    assert_eq!(summary.summary_counts.non_trading_bookie_count, 0);
    assert_eq!(summary.summary_counts.unmatched_bookie_count, 0);
}

#[tokio::test]
async fn summary_of_an_empty_store_is_zero() {
    let app = spawn_app();
    let summary = app
        .service()
        .get_reconciliation_summary(None)
        .await
        .expect("summary");

    assert_eq!(summary.summary_counts.event_data_count, 0);
    assert_eq!(summary.balances.grand_total_betfair, 0.0);
    assert!(summary.daily_breakdown.is_empty());
    assert!(summary.diagnostics.is_empty());
}
