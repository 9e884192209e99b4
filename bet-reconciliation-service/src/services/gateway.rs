//! Retrying access to the record store and the parsed ledger snapshot the
//! engine works from.

use crate::config::Collections;
use crate::models::{BookieTransaction, Diagnostic, ExchangeTransaction, MatchedEvent};
use crate::services::store::{Document, RecordStore};
use serde_json::{Map, Value};
use service_core::error::AppError;
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Every store call the engine makes goes through here so transient
/// failures are retried with backoff.
#[derive(Clone)]
pub struct StoreGateway {
    store: Arc<dyn RecordStore>,
    retry: RetryConfig,
}

impl StoreGateway {
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub async fn list(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        retry_with_backoff(&self.retry, "list_collection", || {
            self.store.list_collection(collection)
        })
        .await
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, AppError> {
        retry_with_backoff(&self.retry, "get_document", || {
            self.store.get_document(collection, id)
        })
        .await
    }

    pub async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), AppError> {
        retry_with_backoff(&self.retry, "set_document", || {
            self.store
                .set_document(collection, id, fields.clone(), merge)
        })
        .await
    }

    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        retry_with_backoff(&self.retry, "update_fields", || {
            self.store.update_fields(collection, id, fields.clone())
        })
        .await
    }
}

// ============================================================================
// Ledger Snapshot
// ============================================================================

/// Both statements and the matched events, parsed. Documents that do not
/// fit the record shape are left out and reported.
#[derive(Debug, Default)]
pub struct LedgerSnapshot {
    pub exchange: Vec<ExchangeTransaction>,
    pub bookie: Vec<BookieTransaction>,
    pub events: Vec<MatchedEvent>,
    pub diagnostics: Vec<Diagnostic>,
}

#[instrument(skip(gateway, collections))]
pub async fn load_snapshot(
    gateway: &StoreGateway,
    collections: &Collections,
) -> Result<LedgerSnapshot, AppError> {
    let mut diagnostics = Vec::new();

    let exchange = parse_all(
        gateway.list(&collections.exchange).await?,
        &collections.exchange,
        ExchangeTransaction::from_document,
        &mut diagnostics,
    );
    let bookie = parse_all(
        gateway.list(&collections.bookie).await?,
        &collections.bookie,
        BookieTransaction::from_document,
        &mut diagnostics,
    );
    let events = parse_all(
        gateway.list(&collections.matched_events).await?,
        &collections.matched_events,
        MatchedEvent::from_document,
        &mut diagnostics,
    );

    Ok(LedgerSnapshot {
        exchange,
        bookie,
        events,
        diagnostics,
    })
}

pub fn parse_all<T>(
    documents: Vec<Document>,
    collection: &str,
    parse: impl Fn(&Document) -> Result<T, AppError>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<T> {
    documents
        .iter()
        .filter_map(|document| match parse(document) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    collection = collection,
                    record_id = %document.id,
                    error = %e,
                    "Skipping malformed record"
                );
                diagnostics.push(Diagnostic::from_error(&e, collection, document.id.clone()));
                None
            }
        })
        .collect()
}
