//! Matching orchestrator.
//!
//! A pass pairs still-unmatched exchange groups with bookie groups whose
//! market time lies inside the window and whose search strings clear the
//! confidence threshold. Groups are enumerated in key order and the first
//! qualifying candidate that can be committed wins; the best-scoring
//! candidate is not searched for.
//!
//! A commit writes the matched event first and the record markers second.
//! Every pass starts by re-marking records listed by existing events, so a
//! crash between the two writes is repaired by the next pass.
//!
//! Passes must not run concurrently against the same store.

use crate::config::{Collections, MatchingSchedule};
use crate::models::{
    matched_event_id, BookieGroup, BookieTransaction, Diagnostic, DiagnosticKind, ExchangeGroup,
    ExchangeTransaction, MatchProvenance, MatchState, MatchedEvent,
};
use crate::services::amount::normalize_amount;
use crate::services::figures::compute_figures;
use crate::services::gateway::{load_snapshot, StoreGateway};
use crate::services::grouping::{group_bookie, group_exchange};
use crate::services::metrics::{
    record_error, record_exclusion, record_matched_event, record_matching_pass,
    record_rejected_candidate,
};
use crate::services::similarity;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use service_core::error::{AppError, ErrorResponse};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, instrument, warn};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub threshold: f64,
    pub window_hours: f64,
    pub events_created: usize,
    pub records_excluded: usize,
    pub markers_repaired: usize,
    pub candidates_rejected: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchingOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
    pub passes: Vec<PassReport>,
    pub events_created: usize,
    pub records_excluded: usize,
    pub markers_repaired: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl MatchingOutcome {
    fn rejected(error: AppError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            error: Some(error.to_response()),
            ..Default::default()
        }
    }
}

// ============================================================================
// Exclusion Rules
// ============================================================================

/// Inter-account transfers never pair with a bookie wager.
pub fn is_excluded_exchange(record: &ExchangeTransaction) -> bool {
    record.is_transfer()
}

/// Non-trading actions and settled-flat records have nothing to match.
pub fn is_excluded_bookie(record: &BookieTransaction) -> bool {
    if record.action().is_non_trading() {
        return true;
    }
    record.pnl.is_some() && normalize_amount(record.pnl.as_ref()) == 0.0
}

/// Inclusive: a difference of exactly `window_hours` is inside.
pub fn within_window(exchange: &ExchangeGroup, bookie: &BookieGroup, window_hours: f64) -> bool {
    match exchange.settled_at_millis {
        Some(settled) => {
            let diff = settled.abs_diff(bookie.market_time_millis) as f64;
            diff <= window_hours * MILLIS_PER_HOUR
        }
        None => false,
    }
}

fn matched_marker(event_id: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("Matched".to_string(), json!(MatchState::Matched.as_str()));
    fields.insert("matchedEventId".to_string(), json!(event_id));
    fields
}

fn excluded_marker() -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("Matched".to_string(), json!(MatchState::Excluded.as_str()));
    fields
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct MatchingEngine {
    gateway: StoreGateway,
    collections: Collections,
    default_schedule: MatchingSchedule,
}

/// Working state of one pass.
struct PassState {
    exchange: HashMap<String, ExchangeTransaction>,
    bookie: HashMap<String, BookieTransaction>,
    claimed_exchange: HashSet<String>,
    claimed_bookie: HashSet<String>,
    event_ids: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
    report: PassReport,
}

impl MatchingEngine {
    pub fn new(
        gateway: StoreGateway,
        collections: Collections,
        default_schedule: MatchingSchedule,
    ) -> Self {
        Self {
            gateway,
            collections,
            default_schedule,
        }
    }

    /// Run one pass per (threshold, window), thresholds outermost. Empty
    /// lists fall back to the configured schedule.
    #[instrument(skip(self))]
    pub async fn run_matching(
        &self,
        confidence_levels: &[f64],
        time_windows: &[f64],
    ) -> MatchingOutcome {
        let levels = if confidence_levels.is_empty() {
            self.default_schedule.confidence_levels.as_slice()
        } else {
            confidence_levels
        };
        let windows = if time_windows.is_empty() {
            self.default_schedule.time_windows.as_slice()
        } else {
            time_windows
        };

        if let Err(e) = validate_schedule(levels, windows) {
            warn!(error = %e, "Rejected matching schedule");
            record_matching_pass("rejected");
            return MatchingOutcome::rejected(e);
        }

        let mut outcome = MatchingOutcome {
            success: true,
            ..Default::default()
        };

        for &threshold in levels {
            for &window_hours in windows {
                info!(
                    threshold = threshold,
                    window_hours = window_hours,
                    "Running matching pass"
                );
                match self.run_pass(threshold, window_hours).await {
                    Ok((report, diagnostics)) => {
                        record_matching_pass("success");
                        outcome.events_created += report.events_created;
                        outcome.records_excluded += report.records_excluded;
                        outcome.markers_repaired += report.markers_repaired;
                        outcome.passes.push(report);
                        // Every pass rereads the store, so the same record
                        // problem can surface more than once.
                        for diagnostic in diagnostics {
                            if !outcome.diagnostics.contains(&diagnostic) {
                                outcome.diagnostics.push(diagnostic);
                            }
                        }
                    }
                    Err(e) => {
                        error!(
                            threshold = threshold,
                            window_hours = window_hours,
                            error = %e,
                            "Matching pass failed"
                        );
                        record_matching_pass("failed");
                        record_error(e.kind());
                        outcome.success = false;
                        outcome.diagnostics.push(Diagnostic::from_error(
                            &e,
                            self.collections.matched_events.clone(),
                            "",
                        ));
                    }
                }
            }
        }

        outcome.message = if outcome.success {
            format!(
                "Matching completed: {} events created, {} records excluded",
                outcome.events_created, outcome.records_excluded
            )
        } else {
            "Matching completed with failed passes".to_string()
        };
        info!(
            success = outcome.success,
            events_created = outcome.events_created,
            records_excluded = outcome.records_excluded,
            markers_repaired = outcome.markers_repaired,
            diagnostics = outcome.diagnostics.len(),
            "Matching finished"
        );
        outcome
    }

    /// A single pass. Only failure to read the collections aborts it; per
    /// candidate and per record problems end up in the diagnostics.
    #[instrument(skip(self))]
    pub async fn run_pass(
        &self,
        threshold: f64,
        window_hours: f64,
    ) -> Result<(PassReport, Vec<Diagnostic>), AppError> {
        let snapshot = load_snapshot(&self.gateway, &self.collections).await?;

        let mut state = PassState {
            exchange: snapshot
                .exchange
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            bookie: snapshot
                .bookie
                .into_iter()
                .map(|r| (r.id.clone(), r))
                .collect(),
            claimed_exchange: HashSet::new(),
            claimed_bookie: HashSet::new(),
            event_ids: HashSet::new(),
            diagnostics: snapshot.diagnostics,
            report: PassReport {
                threshold,
                window_hours,
                ..Default::default()
            },
        };

        self.repair_markers(&snapshot.events, &mut state).await;

        let (exchange_pool, bookie_pool) = self.apply_exclusions(&mut state).await;

        let exchange_groups = group_exchange(&exchange_pool);
        let bookie_groups = group_bookie(&bookie_pool);
        debug!(
            exchange_groups = exchange_groups.len(),
            bookie_groups = bookie_groups.len(),
            "Grouped unmatched records"
        );

        for exchange_group in &exchange_groups {
            let mut matched = false;
            for bookie_group in &bookie_groups {
                if !within_window(exchange_group, bookie_group, window_hours) {
                    continue;
                }
                let confidence =
                    similarity::score(&exchange_group.search_string, &bookie_group.search_string);
                if confidence < threshold {
                    continue;
                }
                match self
                    .commit(exchange_group, bookie_group, confidence, &mut state)
                    .await
                {
                    Ok(event_id) => {
                        info!(
                            event_id = %event_id,
                            confidence = confidence,
                            threshold = threshold,
                            window_hours = window_hours,
                            "Matched event created"
                        );
                        matched = true;
                        break;
                    }
                    Err(e) => {
                        state.report.candidates_rejected += 1;
                        record_rejected_candidate(e.kind());
                        if e.is_transient() {
                            error!(
                                exchange_group = %exchange_group.key(),
                                bookie_group = %bookie_group.key(),
                                error = %e,
                                "Failed to persist matched event"
                            );
                            record_error(e.kind());
                        } else {
                            warn!(
                                exchange_group = %exchange_group.key(),
                                bookie_group = %bookie_group.key(),
                                error = %e,
                                "Skipping candidate"
                            );
                        }
                        state.diagnostics.push(Diagnostic::from_error(
                            &e,
                            self.collections.matched_events.clone(),
                            matched_event_id(exchange_group, bookie_group),
                        ));
                    }
                }
            }
            if !matched {
                debug!(exchange_group = %exchange_group.key(), "No match found");
            }
        }

        Ok((state.report, state.diagnostics))
    }

    /// Mark every record listed by an existing event as matched and claim
    /// its id for the pass.
    async fn repair_markers(&self, events: &[MatchedEvent], state: &mut PassState) {
        for event in events {
            state.event_ids.insert(event.id.clone());
            for id in &event.betfair_doc_ids {
                state.claimed_exchange.insert(id.clone());
                let Some(record) = state.exchange.get(id) else {
                    state.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::NotFound,
                        self.collections.exchange.clone(),
                        id.clone(),
                        format!("Listed by matched event {} but missing", event.id),
                    ));
                    continue;
                };
                if record.match_state() == MatchState::Matched {
                    continue;
                }
                if self
                    .mark(&self.collections.exchange, id, matched_marker(&event.id), state)
                    .await
                {
                    state.report.markers_repaired += 1;
                }
            }
            for id in &event.bookie_doc_ids {
                state.claimed_bookie.insert(id.clone());
                let Some(record) = state.bookie.get(id) else {
                    state.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::NotFound,
                        self.collections.bookie.clone(),
                        id.clone(),
                        format!("Listed by matched event {} but missing", event.id),
                    ));
                    continue;
                };
                if record.match_state() == MatchState::Matched {
                    continue;
                }
                if self
                    .mark(&self.collections.bookie, id, matched_marker(&event.id), state)
                    .await
                {
                    state.report.markers_repaired += 1;
                }
            }
        }
        if state.report.markers_repaired > 0 {
            info!(
                markers_repaired = state.report.markers_repaired,
                "Repaired match markers"
            );
        }
    }

    /// Split the unmatched, unclaimed records into the matching pool and
    /// the excluded set, persisting `NEVER` for the latter.
    async fn apply_exclusions(
        &self,
        state: &mut PassState,
    ) -> (Vec<ExchangeTransaction>, Vec<BookieTransaction>) {
        let mut exchange_pool = Vec::new();
        let mut excluded_exchange = Vec::new();
        for record in state.exchange.values() {
            if record.match_state() != MatchState::Unmatched
                || state.claimed_exchange.contains(&record.id)
            {
                continue;
            }
            if is_excluded_exchange(record) {
                excluded_exchange.push(record.id.clone());
            } else {
                exchange_pool.push(record.clone());
            }
        }

        let mut bookie_pool = Vec::new();
        let mut excluded_bookie = Vec::new();
        for record in state.bookie.values() {
            if record.match_state() != MatchState::Unmatched
                || state.claimed_bookie.contains(&record.id)
            {
                continue;
            }
            if is_excluded_bookie(record) {
                excluded_bookie.push(record.id.clone());
            } else {
                bookie_pool.push(record.clone());
            }
        }

        // HashMap iteration order is arbitrary; grouping and writes are not.
        exchange_pool.sort_by(|a, b| a.id.cmp(&b.id));
        bookie_pool.sort_by(|a, b| a.id.cmp(&b.id));
        excluded_exchange.sort();
        excluded_bookie.sort();

        for id in excluded_exchange {
            if self
                .mark(&self.collections.exchange, &id, excluded_marker(), state)
                .await
            {
                record_exclusion("exchange");
                state.report.records_excluded += 1;
            }
        }
        for id in excluded_bookie {
            if self
                .mark(&self.collections.bookie, &id, excluded_marker(), state)
                .await
            {
                record_exclusion("bookie");
                state.report.records_excluded += 1;
            }
        }

        (exchange_pool, bookie_pool)
    }

    /// Persist the event, claim its ids and mark its records.
    async fn commit(
        &self,
        exchange_group: &ExchangeGroup,
        bookie_group: &BookieGroup,
        confidence: f64,
        state: &mut PassState,
    ) -> Result<String, AppError> {
        let event_id = matched_event_id(exchange_group, bookie_group);

        if let Some(id) = exchange_group
            .ids
            .iter()
            .find(|id| state.claimed_exchange.contains(*id))
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Exchange record {} already belongs to a matched event",
                id
            )));
        }
        if let Some(id) = bookie_group
            .ids
            .iter()
            .find(|id| state.claimed_bookie.contains(*id))
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Bookie record {} already belongs to a matched event",
                id
            )));
        }
        if state.event_ids.contains(&event_id) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Matched event {} already exists",
                event_id
            )));
        }

        let exchange_records: Vec<ExchangeTransaction> = exchange_group
            .ids
            .iter()
            .filter_map(|id| state.exchange.get(id).cloned())
            .collect();
        let bookie_records: Vec<BookieTransaction> = bookie_group
            .ids
            .iter()
            .filter_map(|id| state.bookie.get(id).cloned())
            .collect();
        let figures = compute_figures(
            &exchange_records,
            &bookie_records,
            &self.collections.exchange,
            &self.collections.bookie,
            &mut state.diagnostics,
        );

        let event = MatchedEvent {
            id: event_id.clone(),
            betfair_doc_ids: exchange_group.ids.clone(),
            bookie_doc_ids: bookie_group.ids.clone(),
            event_date: Some(exchange_group.settled_date.clone()),
            figures: Some(figures),
            provenance: Some(MatchProvenance {
                confidence,
                threshold_used: state.report.threshold,
                window_hours: state.report.window_hours,
                created_at: Utc::now(),
            }),
        };
        self.gateway
            .set(
                &self.collections.matched_events,
                &event_id,
                event.to_fields()?,
                false,
            )
            .await?;

        state.event_ids.insert(event_id.clone());
        state
            .claimed_exchange
            .extend(exchange_group.ids.iter().cloned());
        state.claimed_bookie.extend(bookie_group.ids.iter().cloned());
        state.report.events_created += 1;
        record_matched_event(state.report.threshold);

        for id in &exchange_group.ids {
            self.mark(&self.collections.exchange, id, matched_marker(&event_id), state)
                .await;
        }
        for id in &bookie_group.ids {
            self.mark(&self.collections.bookie, id, matched_marker(&event_id), state)
                .await;
        }

        Ok(event_id)
    }

    /// Write a marker; failures become diagnostics. Returns whether the
    /// write landed.
    async fn mark(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        state: &mut PassState,
    ) -> bool {
        match self.gateway.update(collection, id, fields).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    collection = collection,
                    record_id = id,
                    error = %e,
                    "Failed to write match marker"
                );
                record_error(e.kind());
                state
                    .diagnostics
                    .push(Diagnostic::from_error(&e, collection, id));
                false
            }
        }
    }
}

fn validate_schedule(levels: &[f64], windows: &[f64]) -> Result<(), AppError> {
    if let Some(level) = levels
        .iter()
        .find(|l| !l.is_finite() || **l < 0.0 || **l > 100.0)
    {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Confidence level {} is outside 0-100",
            level
        )));
    }
    if let Some(window) = windows.iter().find(|w| !w.is_finite() || **w <= 0.0) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Time window {} must be a positive number of hours",
            window
        )));
    }
    Ok(())
}
