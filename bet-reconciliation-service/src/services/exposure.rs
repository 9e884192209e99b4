//! Open-position exposure per event selection.

use crate::config::Collections;
use crate::models::{ExposureLine, ExposureReport, OpenBookieBet, OpenExchangeBet};
use crate::services::amount::normalize_amount;
use crate::services::gateway::StoreGateway;
use crate::services::store::Document;
use serde::de::DeserializeOwned;
use serde_json::Value;
use service_core::error::AppError;
use std::collections::HashMap;
use tracing::{instrument, warn};

/// Id of the snapshot document in each open-bets collection.
pub const CURRENT_SNAPSHOT_ID: &str = "current";

const BOOKIE_BACK: i64 = 0;
const BOOKIE_LAY: i64 = 1;

fn or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

fn exchange_exposure(bet: &OpenExchangeBet, all: &[OpenExchangeBet]) -> f64 {
    let stake = normalize_amount(bet.stake.as_ref());
    let exposure = match bet.side.as_deref() {
        Some("LAY") => {
            let price = normalize_amount(bet.average_odds_matched.as_ref());
            let others: f64 = all
                .iter()
                .filter(|other| {
                    other.event_description == bet.event_description
                        && other.selection_name != bet.selection_name
                })
                .map(|other| normalize_amount(other.stake.as_ref()))
                .sum();
            price * stake - stake - others
        }
        Some("BACK") => stake,
        _ => 0.0,
    };
    or_zero(exposure)
}

fn bookie_exposure(bet: &OpenBookieBet, all: &[OpenBookieBet]) -> f64 {
    let size = normalize_amount(bet.size_matched.as_ref());
    let exposure = match bet.side {
        Some(BOOKIE_LAY) => {
            let price = normalize_amount(bet.average_price.as_ref());
            let others: f64 = all
                .iter()
                .filter(|other| {
                    other.event_name == bet.event_name && other.selection_name != bet.selection_name
                })
                .map(|other| normalize_amount(other.size_matched.as_ref()))
                .sum();
            price * size - size - others
        }
        Some(BOOKIE_BACK) => size,
        _ => 0.0,
    };
    or_zero(exposure)
}

/// Aggregate exposure per (event description, selection) in the order the
/// exchange bets list them. Bookie bets join on selection name.
pub fn build_exposure(
    betfair_bets: Vec<OpenExchangeBet>,
    bookie_bets: Vec<OpenBookieBet>,
) -> ExposureReport {
    let mut exposure: Vec<ExposureLine> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for bet in &betfair_bets {
        let betfair = exchange_exposure(bet, &betfair_bets);
        let bookie: f64 = bookie_bets
            .iter()
            .filter(|b| b.selection_name == bet.selection_name)
            .map(|b| bookie_exposure(b, &bookie_bets))
            .sum();

        let event_description = bet.event_description.clone().unwrap_or_default();
        let selection_name = bet.selection_name.clone().unwrap_or_default();
        let key = format!("{}_{}", event_description, selection_name);
        match index.get(&key) {
            Some(&position) => {
                exposure[position].total_betfair_exposure += betfair;
                exposure[position].total_bookie_exposure += bookie;
            }
            None => {
                index.insert(key, exposure.len());
                exposure.push(ExposureLine {
                    event_description,
                    selection_name,
                    total_betfair_exposure: betfair,
                    total_bookie_exposure: bookie,
                });
            }
        }
    }

    ExposureReport {
        betfair_bets,
        bookie_bets,
        exposure,
    }
}

fn parse_bets<T: DeserializeOwned>(
    document: Option<Document>,
    collection: &str,
    field: &str,
) -> Vec<T> {
    let Some(document) = document else {
        return Vec::new();
    };
    let Some(Value::Array(items)) = document.fields.get(field) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| match serde_json::from_value(item.clone()) {
            Ok(bet) => Some(bet),
            Err(e) => {
                warn!(
                    collection = collection,
                    position = position,
                    error = %e,
                    "Skipping malformed open bet"
                );
                None
            }
        })
        .collect()
}

/// Read both open-bet snapshots. A missing snapshot counts as no bets.
#[instrument(skip(gateway, collections))]
pub async fn load_exposure(
    gateway: &StoreGateway,
    collections: &Collections,
) -> Result<ExposureReport, AppError> {
    let betfair = gateway
        .get(&collections.open_exchange_bets, CURRENT_SNAPSHOT_ID)
        .await?;
    let bookie = gateway
        .get(&collections.open_bookie_bets, CURRENT_SNAPSHOT_ID)
        .await?;

    Ok(build_exposure(
        parse_bets(betfair, &collections.open_exchange_bets, "bets"),
        parse_bets(bookie, &collections.open_bookie_bets, "result"),
    ))
}
