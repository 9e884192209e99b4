//! Application startup and lifecycle management.

use crate::config::ReconciliationConfig;
use crate::services::{init_metrics, MongoStore, ReconciliationService, RecordStore, StoreGateway};
use service_core::error::AppError;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// Application container: the store connection and the reconciliation
/// service built on it.
pub struct Application {
    config: ReconciliationConfig,
    service: ReconciliationService,
}

impl Application {
    /// Connect to MongoDB and build the service.
    pub async fn build(config: ReconciliationConfig) -> Result<Self, AppError> {
        let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to MongoDB");
                e
            })?;
        store.health_check().await?;

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Build on an already constructed store.
    pub fn with_store(config: ReconciliationConfig, store: Arc<dyn RecordStore>) -> Self {
        init_metrics();

        let gateway = StoreGateway::new(store, config.store_retry.clone());
        let service = ReconciliationService::new(
            gateway,
            config.collections.clone(),
            config.schedule.clone(),
        );
        Self { config, service }
    }

    pub fn service(&self) -> &ReconciliationService {
        &self.service
    }

    /// One full cycle: matching with the configured schedule, then the
    /// summary and trial balance over everything stored.
    pub async fn run_cycle(&self) -> Result<(), AppError> {
        let outcome = self.service.run_matching(&[], &[]).await;
        if !outcome.success {
            tracing::warn!(message = %outcome.message, "Matching finished with failures");
        }

        let summary = self.service.get_reconciliation_summary(None).await?;
        tracing::info!(
            matched_betfair = summary.summary_counts.matched_betfair_count,
            matched_bookie = summary.summary_counts.matched_bookie_count,
            unmatched_betfair = summary.summary_counts.unmatched_betfair_count,
            unmatched_bookie = summary.summary_counts.unmatched_bookie_count,
            total_trade_gp = summary.balances.total_trade_gp,
            "Reconciliation summary"
        );

        let trial_balance = self.service.get_trial_balance(None).await?;
        tracing::info!(
            lines = trial_balance.lines.len(),
            total_debit = trial_balance.summary.total_debit,
            total_credit = trial_balance.summary.total_credit,
            net_effect_pl = trial_balance.summary.net_effect_pl,
            "Trial balance"
        );
        Ok(())
    }

    /// Run once, or on the configured interval until stopped. A failed cycle
    /// on an interval is logged and the next tick tries again.
    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        tracing::info!(
            service = %self.config.service_name,
            version = env!("CARGO_PKG_VERSION"),
            interval = ?self.config.run_interval,
            "Service ready"
        );

        let Some(period) = self.config.run_interval else {
            return self.run_cycle().await;
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                tracing::error!(error = %e, "Reconciliation cycle failed");
            }
        }
    }
}
