//! Open-bet snapshots and the exposure report built from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of the exchange's current open bets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenExchangeBet {
    #[serde(default)]
    pub event_description: Option<String>,
    #[serde(default)]
    pub selection_name: Option<String>,
    /// `BACK` or `LAY`.
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub average_odds_matched: Option<Value>,
    #[serde(default)]
    pub stake: Option<Value>,
}

/// One line of the bookie's current open bets. `side` is `0` for back and
/// `1` for lay.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenBookieBet {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub selection_name: Option<String>,
    #[serde(default)]
    pub side: Option<i64>,
    #[serde(default)]
    pub average_price: Option<Value>,
    #[serde(default)]
    pub size_matched: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExposureLine {
    pub event_description: String,
    pub selection_name: String,
    pub total_betfair_exposure: f64,
    pub total_bookie_exposure: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExposureReport {
    pub betfair_bets: Vec<OpenExchangeBet>,
    pub bookie_bets: Vec<OpenBookieBet>,
    pub exposure: Vec<ExposureLine>,
}
