//! Reconciliation summary shapes handed to the presentation layer.

use super::{Diagnostic, EventFigures};
use serde::Serialize;
use std::collections::BTreeMap;

/// Bucket key for records without a usable date.
pub const UNKNOWN_DATE: &str = "Unknown";

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCounts {
    pub daily_summary_count: usize,
    pub event_data_count: usize,
    pub matched_betfair_count: usize,
    pub matched_bookie_count: usize,
    pub non_trading_betfair_count: usize,
    pub non_trading_bookie_count: usize,
    pub unmatched_betfair_count: usize,
    pub unmatched_bookie_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Balances {
    pub total_betfair_balance: f64,
    pub total_bookie_balance: f64,
    #[serde(rename = "totalTradeGP")]
    pub total_trade_gp: f64,
    pub total_non_trading_betfair: f64,
    pub total_non_trading_bookie: f64,
    pub total_unmatched_betfair: f64,
    pub total_unmatched_bookie: f64,
    pub grand_total_betfair: f64,
    pub grand_total_bookie: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub total_betfair_balance: f64,
    pub total_bookie_balance: f64,
    #[serde(rename = "totalTradeGP")]
    pub total_trade_gp: f64,
    pub total_count: usize,
    pub events: BTreeMap<String, EventFigures>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedBucket {
    pub total_betfair_balance: f64,
    pub total_bookie_balance: f64,
    #[serde(rename = "totalTradeGP")]
    pub total_trade_gp: f64,
    pub total_count: usize,
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedBuckets {
    pub betfair: BTreeMap<String, UnmatchedBucket>,
    pub bookie: BTreeMap<String, UnmatchedBucket>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NonTradingTotals {
    pub betfair_ids: Vec<String>,
    pub bookie_ids: Vec<String>,
    pub total_betfair: f64,
    pub total_bookie: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationSummary {
    pub summary_counts: SummaryCounts,
    pub balances: Balances,
    pub daily_breakdown: BTreeMap<String, DailySummary>,
    pub non_trading_totals: NonTradingTotals,
    pub unmatched_buckets: UnmatchedBuckets,
    pub diagnostics: Vec<Diagnostic>,
}
