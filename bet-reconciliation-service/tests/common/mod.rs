//! Common test utilities for bet-reconciliation-service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bet_reconciliation_service::config::{Collections, ReconciliationConfig};
use bet_reconciliation_service::services::{
    Document, InMemoryStore, ReconciliationService, RecordStore,
};
use bet_reconciliation_service::startup::Application;
use serde_json::{json, Map, Value};
use service_core::error::AppError;
use service_core::retry::RetryConfig;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,bet_reconciliation_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 2024-03-02T15:30:00Z
pub const KICK_OFF_MILLIS: i64 = 1_709_393_400_000;
pub const HOUR_MILLIS: i64 = 3_600_000;

// ============================================================================
// Failure-injecting store
// ============================================================================

/// In-memory store that fails chosen writes with a storage error on every
/// attempt, so retries are exhausted.
#[derive(Default)]
pub struct FailingStore {
    pub inner: InMemoryStore,
    failing_updates: Mutex<HashSet<String>>,
    failing_sets: Mutex<HashSet<String>>,
}

impl FailingStore {
    pub fn fail_update_of(&self, id: &str) {
        if let Ok(mut ids) = self.failing_updates.lock() {
            ids.insert(id.to_string());
        }
    }

    pub fn fail_set_of(&self, id: &str) {
        if let Ok(mut ids) = self.failing_sets.lock() {
            ids.insert(id.to_string());
        }
    }

    pub fn heal(&self) {
        if let Ok(mut ids) = self.failing_updates.lock() {
            ids.clear();
        }
        if let Ok(mut ids) = self.failing_sets.lock() {
            ids.clear();
        }
    }

    fn should_fail(set: &Mutex<HashSet<String>>, id: &str) -> bool {
        set.lock().map(|ids| ids.contains(id)).unwrap_or(false)
    }

    fn injected(op: &str, id: &str) -> AppError {
        AppError::StorageError(anyhow::anyhow!("injected {} failure for {}", op, id))
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, AppError> {
        self.inner.list_collection(collection).await
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        self.inner.get_document(collection, id).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        merge: bool,
    ) -> Result<(), AppError> {
        if Self::should_fail(&self.failing_sets, id) {
            return Err(Self::injected("set", id));
        }
        self.inner.set_document(collection, id, fields, merge).await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), AppError> {
        if Self::should_fail(&self.failing_updates, id) {
            return Err(Self::injected("update", id));
        }
        self.inner.update_fields(collection, id, fields).await
    }
}

// ============================================================================
// Test application
// ============================================================================

pub struct TestApp {
    pub store: Arc<FailingStore>,
    pub app: Application,
    pub collections: Collections,
}

impl TestApp {
    pub fn service(&self) -> &ReconciliationService {
        self.app.service()
    }

    pub async fn seed(&self, collection: &str, documents: Vec<Document>) {
        self.store.inner.insert_all(collection, documents).await;
    }

    pub async fn seed_exchange(&self, documents: Vec<Document>) {
        self.seed(&self.collections.exchange, documents).await;
    }

    pub async fn seed_bookie(&self, documents: Vec<Document>) {
        self.seed(&self.collections.bookie, documents).await;
    }

    pub async fn fields(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.store
            .inner
            .get_document(collection, id)
            .await
            .ok()
            .flatten()
            .map(|d| d.fields)
    }

    /// The `Matched` marker of a stored record.
    pub async fn marker(&self, collection: &str, id: &str) -> Option<String> {
        self.fields(collection, id)
            .await
            .and_then(|f| f.get("Matched").and_then(Value::as_str).map(str::to_string))
    }

    pub async fn events(&self) -> Vec<Document> {
        self.store
            .inner
            .list_collection(&self.collections.matched_events)
            .await
            .unwrap_or_default()
    }
}

fn test_config() -> ReconciliationConfig {
    ReconciliationConfig {
        service_name: "bet-reconciliation-service-test".to_string(),
        store_retry: RetryConfig::quick(),
        ..Default::default()
    }
}

/// Build the service over a fresh in-memory store.
pub fn spawn_app() -> TestApp {
    init_tracing();

    let config = test_config();
    let collections = config.collections.clone();
    let store = Arc::new(FailingStore::default());
    let app = Application::with_store(config, store.clone());

    TestApp {
        store,
        app,
        collections,
    }
}

// ============================================================================
// Record builders
// ============================================================================

pub fn document(id: &str, fields: Value) -> Document {
    Document::new(id, fields.as_object().cloned().unwrap_or_default())
}

/// Settled exchange line linked to a bookie event by name.
pub fn exchange_doc(id: &str, settled: &str, event: &str, credit: f64) -> Document {
    let (date, time) = settled.split_once(' ').unwrap_or((settled, "00:00"));
    document(
        id,
        json!({
            "formattedSettledDate": date,
            "formattedSettledTime": time,
            "formattedPlacedDate": date,
            "bookieMatchEvent": event,
            "creditAmount": credit,
            "winLose": "Won",
            "event": { "betDescription": "Back", "nameAndSelectionName": event },
            "averagePrice": 2.0,
            "betSize": 10
        }),
    )
}

/// Bookie settlement for an event starting at `market_time`.
pub fn bookie_doc(id: &str, market_time: i64, event: &str, pnl: f64) -> Document {
    document(
        id,
        json!({
            "action": "SETTLE",
            "pnl": pnl,
            "date": market_time,
            "description": {
                "eventName": event,
                "marketTime": market_time,
                "eventTypeId": "1"
            }
        }),
    )
}
