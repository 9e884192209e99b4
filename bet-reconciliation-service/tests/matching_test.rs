//! Integration tests for the matching orchestrator.

mod common;

use bet_reconciliation_service::models::DiagnosticKind;
use common::{bookie_doc, document, exchange_doc, spawn_app, HOUR_MILLIS, KICK_OFF_MILLIS};
use serde_json::{json, Value};
use std::collections::HashSet;

#[tokio::test]
async fn matches_identical_groups_and_marks_every_record() {
    let app = spawn_app();
    app.seed_exchange(vec![
        exchange_doc("b1", "2024-03-02 15:30", "Arsenal Chelsea", 12.0),
        exchange_doc("b2", "2024-03-02 15:30", "Arsenal Chelsea", -4.0),
    ])
    .await;
    let market_time = KICK_OFF_MILLIS + 2 * HOUR_MILLIS;
    app.seed_bookie(vec![bookie_doc("k1", market_time, "Chelsea Arsenal", -7.5)])
        .await;

    let outcome = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(outcome.success, "Expected success, got: {:?}", outcome);
    assert_eq!(outcome.events_created, 1);
    assert_eq!(outcome.passes.len(), 1);

    let events = app.events().await;
    assert_eq!(events.len(), 1);
    let event_id = format!("2024-03-02_{}_Chelsea Arsenal", market_time);
    assert_eq!(events[0].id, event_id);
    assert_eq!(events[0].fields["betfairDocIds"], json!(["b1", "b2"]));
    assert_eq!(events[0].fields["bookieDocIds"], json!(["k1"]));
    assert_eq!(events[0].fields["figures"]["betfairBalance"], json!(8.0));
    assert_eq!(events[0].fields["match"]["confidence"], json!(100.0));

    for id in ["b1", "b2"] {
        assert_eq!(
            app.marker(&app.collections.exchange, id).await.as_deref(),
            Some("YES")
        );
        let fields = app.fields(&app.collections.exchange, id).await.unwrap();
        assert_eq!(fields["matchedEventId"], Value::String(event_id.clone()));
    }
    assert_eq!(
        app.marker(&app.collections.bookie, "k1").await.as_deref(),
        Some("YES")
    );
}

#[tokio::test]
async fn window_boundary_is_inclusive() {
    let app = spawn_app();
    app.seed_exchange(vec![exchange_doc(
        "b1",
        "2024-03-02 15:30",
        "Arsenal Chelsea",
        5.0,
    )])
    .await;
    app.seed_bookie(vec![bookie_doc(
        "k1",
        KICK_OFF_MILLIS + 24 * HOUR_MILLIS,
        "Arsenal Chelsea",
        -5.0,
    )])
    .await;

    let outcome = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(outcome.success);
    assert_eq!(outcome.events_created, 1);
}

#[tokio::test]
async fn one_millisecond_past_the_window_is_rejected() {
    let app = spawn_app();
    app.seed_exchange(vec![exchange_doc(
        "b1",
        "2024-03-02 15:30",
        "Arsenal Chelsea",
        5.0,
    )])
    .await;
    app.seed_bookie(vec![bookie_doc(
        "k1",
        KICK_OFF_MILLIS + 24 * HOUR_MILLIS + 1,
        "Arsenal Chelsea",
        -5.0,
    )])
    .await;

    let outcome = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(outcome.success);
    assert_eq!(outcome.events_created, 0);
    assert!(app.events().await.is_empty());
    assert_eq!(app.marker(&app.collections.exchange, "b1").await, None);
    assert_eq!(app.marker(&app.collections.bookie, "k1").await, None);
}

#[tokio::test]
async fn a_record_is_never_claimed_twice() {
    let app = spawn_app();
    app.seed_exchange(vec![exchange_doc(
        "b1",
        "2024-03-02 15:30",
        "Arsenal Chelsea",
        5.0,
    )])
    .await;
    // Two bookie markets that both qualify for the one exchange group.
    app.seed_bookie(vec![
        bookie_doc("k1", KICK_OFF_MILLIS, "Arsenal Chelsea", -5.0),
        bookie_doc("k2", KICK_OFF_MILLIS + HOUR_MILLIS, "Arsenal Chelsea", -5.0),
    ])
    .await;

    let first = app.service().run_matching(&[], &[]).await;
    assert!(first.success);
    assert_eq!(first.events_created, 1);

    let second = app.service().run_matching(&[], &[]).await;
    assert!(second.success);
    assert_eq!(second.events_created, 0);

    let events = app.events().await;
    assert_eq!(events.len(), 1);
    let mut seen = HashSet::new();
    for event in &events {
        for key in ["betfairDocIds", "bookieDocIds"] {
            for id in event.fields[key].as_array().unwrap() {
                assert!(seen.insert(id.as_str().unwrap().to_string()));
            }
        }
    }
    assert_eq!(app.marker(&app.collections.bookie, "k2").await, None);
}

#[tokio::test]
async fn bookie_group_claimed_earlier_in_the_pass_is_rejected() {
    let app = spawn_app();
    // Two exchange groups for the same fixture, both within the window of k1.
    app.seed_exchange(vec![
        exchange_doc("b1", "2024-03-02 15:30", "Arsenal Chelsea", 5.0),
        exchange_doc("b2", "2024-03-02 16:00", "Arsenal Chelsea", 2.0),
    ])
    .await;
    app.seed_bookie(vec![bookie_doc("k1", KICK_OFF_MILLIS, "Arsenal Chelsea", -5.0)])
        .await;

    let outcome = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(outcome.success, "Expected success, got: {:?}", outcome);
    assert_eq!(outcome.events_created, 1);
    assert_eq!(outcome.passes[0].candidates_rejected, 1);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Conflict && d.message.contains("k1")));

    let events = app.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fields["betfairDocIds"], json!(["b1"]));
    assert_eq!(
        app.marker(&app.collections.exchange, "b1").await.as_deref(),
        Some("YES")
    );
    assert_eq!(app.marker(&app.collections.exchange, "b2").await, None);
}

#[tokio::test]
async fn bookie_record_with_unrepresentable_market_time_stays_unmatched() {
    let app = spawn_app();
    app.seed_exchange(vec![exchange_doc(
        "b1",
        "2024-03-02 15:30",
        "Arsenal Chelsea",
        5.0,
    )])
    .await;
    app.seed_bookie(vec![document(
        "k1",
        json!({
            "action": "SETTLE",
            "pnl": -5.0,
            "description": { "eventName": "Arsenal Chelsea", "marketTime": -1.0e19 }
        }),
    )])
    .await;

    let outcome = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(outcome.success, "Expected success, got: {:?}", outcome);
    assert_eq!(outcome.events_created, 0);
    assert!(app.events().await.is_empty());
    assert_eq!(app.marker(&app.collections.exchange, "b1").await, None);
    assert_eq!(app.marker(&app.collections.bookie, "k1").await, None);
}

#[tokio::test]
async fn exclusion_is_idempotent() {
    let app = spawn_app();
    app.seed_exchange(vec![document(
        "t1",
        json!({
            "formattedSettledDate": "2024-03-02",
            "creditAmount": 100,
            "winLose": "-",
            "event": { "nameAndSelectionName": "Cross accounts transfer" }
        }),
    )])
    .await;
    app.seed_bookie(vec![
        document("c1", json!({ "action": "CREDIT", "pnl": 25 })),
        document("z1", json!({ "action": "SETTLE", "pnl": "0.00" })),
    ])
    .await;

    let first = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(first.success);
    assert_eq!(first.records_excluded, 3);

    let second = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(second.success);
    assert_eq!(second.records_excluded, 0);
    assert!(second.diagnostics.is_empty());

    assert_eq!(
        app.marker(&app.collections.exchange, "t1").await.as_deref(),
        Some("NEVER")
    );
    for id in ["c1", "z1"] {
        assert_eq!(
            app.marker(&app.collections.bookie, id).await.as_deref(),
            Some("NEVER")
        );
    }
}

#[tokio::test]
async fn failed_event_write_does_not_stop_the_pass() {
    let app = spawn_app();
    app.seed_exchange(vec![
        exchange_doc("b1", "2024-03-02 15:30", "Arsenal Chelsea", 5.0),
        exchange_doc("b2", "2024-03-02 18:00", "Everton Liverpool", 3.0),
    ])
    .await;
    app.seed_bookie(vec![
        bookie_doc("k1", KICK_OFF_MILLIS, "Arsenal Chelsea", -5.0),
        bookie_doc("k2", KICK_OFF_MILLIS + 3 * HOUR_MILLIS, "Everton Liverpool", -3.0),
    ])
    .await;
    let failing_id = format!("2024-03-02_{}_Arsenal Chelsea", KICK_OFF_MILLIS);
    app.store.fail_set_of(&failing_id);

    let outcome = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(outcome.success);
    assert_eq!(outcome.events_created, 1);
    assert_eq!(outcome.passes[0].candidates_rejected, 1);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Storage && d.record_id == failing_id));

    let events = app.events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].fields["bookieDocIds"], json!(["k2"]));
    assert_eq!(app.marker(&app.collections.exchange, "b1").await, None);
}

#[tokio::test]
async fn next_pass_repairs_markers_left_by_a_partial_commit() {
    let app = spawn_app();
    app.seed_exchange(vec![exchange_doc(
        "b1",
        "2024-03-02 15:30",
        "Arsenal Chelsea",
        5.0,
    )])
    .await;
    app.seed_bookie(vec![bookie_doc("k1", KICK_OFF_MILLIS, "Arsenal Chelsea", -5.0)])
        .await;
    app.store.fail_update_of("k1");

    let first = app.service().run_matching(&[95.0], &[24.0]).await;
    assert_eq!(first.events_created, 1);
    assert_eq!(app.marker(&app.collections.bookie, "k1").await, None);
    assert!(first
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::Storage && d.record_id == "k1"));

    app.store.heal();
    let second = app.service().run_matching(&[95.0], &[24.0]).await;
    assert!(second.success);
    assert_eq!(second.events_created, 0);
    assert_eq!(second.markers_repaired, 1);
    assert_eq!(
        app.marker(&app.collections.bookie, "k1").await.as_deref(),
        Some("YES")
    );
    assert_eq!(app.events().await.len(), 1);
}

#[tokio::test]
async fn invalid_schedule_is_rejected_without_writing() {
    let app = spawn_app();
    app.seed_exchange(vec![exchange_doc(
        "b1",
        "2024-03-02 15:30",
        "Arsenal Chelsea",
        5.0,
    )])
    .await;
    app.seed_bookie(vec![bookie_doc("k1", KICK_OFF_MILLIS, "Arsenal Chelsea", -5.0)])
        .await;

    let outcome = app.service().run_matching(&[120.0], &[24.0]).await;
    assert!(!outcome.success);
    assert!(outcome.error.is_some());
    assert!(outcome.passes.is_empty());
    assert!(app.events().await.is_empty());
}
