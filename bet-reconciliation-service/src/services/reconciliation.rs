//! Entry points offered to the presentation layer.

use crate::config::{Collections, MatchingSchedule};
use crate::models::{
    BookieTransaction, DateRange, Diagnostic, ExchangeTransaction, ExposureReport, MatchedEvent,
    ReconciliationSummary, TrialBalance,
};
use crate::services::aggregation::aggregate;
use crate::services::exposure::load_exposure;
use crate::services::gateway::{load_snapshot, parse_all, StoreGateway};
use crate::services::journal::{build_trial_balance, generate_journal};
use crate::services::matching::{MatchingEngine, MatchingOutcome};
use crate::services::metrics::record_error;
use crate::services::store::Document;
use futures::future::join_all;
use serde::Serialize;
use service_core::error::AppError;
use tracing::{info, instrument, warn};

/// A matched event with the records it lists.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    pub event_id: String,
    pub event: MatchedEvent,
    pub exchange_transactions: Vec<ExchangeTransaction>,
    pub bookie_transactions: Vec<BookieTransaction>,
    /// Listed ids with no stored record.
    pub missing_ids: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ReconciliationService {
    gateway: StoreGateway,
    collections: Collections,
    engine: MatchingEngine,
}

impl ReconciliationService {
    pub fn new(
        gateway: StoreGateway,
        collections: Collections,
        schedule: MatchingSchedule,
    ) -> Self {
        let engine = MatchingEngine::new(gateway.clone(), collections.clone(), schedule);
        Self {
            gateway,
            collections,
            engine,
        }
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// Run the matching schedule. Empty lists use the configured defaults.
    pub async fn run_matching(
        &self,
        confidence_levels: &[f64],
        time_windows: &[f64],
    ) -> MatchingOutcome {
        self.engine
            .run_matching(confidence_levels, time_windows)
            .await
    }

    /// Partition every record into matched, non-trading or unmatched and
    /// total them, optionally for a date range only.
    #[instrument(skip(self))]
    pub async fn get_reconciliation_summary(
        &self,
        range: Option<&DateRange>,
    ) -> Result<ReconciliationSummary, AppError> {
        let snapshot = load_snapshot(&self.gateway, &self.collections)
            .await
            .inspect_err(|e| record_error(e.kind()))?;
        let summary = aggregate(&snapshot, &self.collections, range);
        info!(
            events = summary.summary_counts.event_data_count,
            unmatched_betfair = summary.summary_counts.unmatched_betfair_count,
            unmatched_bookie = summary.summary_counts.unmatched_bookie_count,
            diagnostics = summary.diagnostics.len(),
            "Reconciliation summary built"
        );
        Ok(summary)
    }

    /// Load a matched event and every record it lists. Records are fetched
    /// concurrently; ids with no stored record are reported, not failed on.
    #[instrument(skip(self))]
    pub async fn get_event_detail(&self, event_id: &str) -> Result<EventDetail, AppError> {
        let document = self
            .gateway
            .get(&self.collections.matched_events, event_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow::anyhow!("Matched event {} not found", event_id))
            })?;
        let event = MatchedEvent::from_document(&document)?;

        let exchange_fetches = event
            .betfair_doc_ids
            .iter()
            .map(|id| self.gateway.get(&self.collections.exchange, id));
        let bookie_fetches = event
            .bookie_doc_ids
            .iter()
            .map(|id| self.gateway.get(&self.collections.bookie, id));
        let (exchange_results, bookie_results) =
            futures::join!(join_all(exchange_fetches), join_all(bookie_fetches));

        let mut missing_ids = Vec::new();
        let exchange_documents =
            collect_found(&event.betfair_doc_ids, exchange_results, &mut missing_ids)?;
        let bookie_documents =
            collect_found(&event.bookie_doc_ids, bookie_results, &mut missing_ids)?;
        if !missing_ids.is_empty() {
            warn!(
                event_id = event_id,
                missing = ?missing_ids,
                "Matched event lists records that do not exist"
            );
        }

        let mut diagnostics = Vec::new();
        let exchange_transactions = parse_all(
            exchange_documents,
            &self.collections.exchange,
            ExchangeTransaction::from_document,
            &mut diagnostics,
        );
        let bookie_transactions = parse_all(
            bookie_documents,
            &self.collections.bookie,
            BookieTransaction::from_document,
            &mut diagnostics,
        );

        Ok(EventDetail {
            event_id: event_id.to_string(),
            event,
            exchange_transactions,
            bookie_transactions,
            missing_ids,
            diagnostics,
        })
    }

    /// Journal every statement line and manual journal, then sum by nominal
    /// code. The range filters on each record's own date.
    #[instrument(skip(self))]
    pub async fn get_trial_balance(
        &self,
        range: Option<&DateRange>,
    ) -> Result<TrialBalance, AppError> {
        let snapshot = load_snapshot(&self.gateway, &self.collections)
            .await
            .inspect_err(|e| record_error(e.kind()))?;
        let transfers = self
            .gateway
            .list(&self.collections.account_transfers)
            .await?;

        let mut diagnostics = snapshot.diagnostics;
        let entries = generate_journal(
            &snapshot.exchange,
            &snapshot.bookie,
            &transfers,
            &self.collections,
            range,
            &mut diagnostics,
        );
        let (lines, summary) = build_trial_balance(&entries);
        info!(
            entries = entries.len(),
            lines = lines.len(),
            net_effect = summary.net_effect,
            "Trial balance built"
        );

        Ok(TrialBalance {
            lines,
            summary,
            entry_count: entries.len(),
            diagnostics,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_exposure_report(&self) -> Result<ExposureReport, AppError> {
        load_exposure(&self.gateway, &self.collections).await
    }
}

/// Found documents in listing order. Missing ids are appended to `missing`;
/// a store failure fails the whole lookup.
fn collect_found(
    ids: &[String],
    results: Vec<Result<Option<Document>, AppError>>,
    missing: &mut Vec<String>,
) -> Result<Vec<Document>, AppError> {
    let mut found = Vec::with_capacity(ids.len());
    for (id, result) in ids.iter().zip(results) {
        match result? {
            Some(document) => found.push(document),
            None => missing.push(id.clone()),
        }
    }
    Ok(found)
}
