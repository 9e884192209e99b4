//! Derived figures of a matched event.

use crate::models::{
    BookieTransaction, Diagnostic, EventFigures, ExchangeTransaction, Outcome, Side,
};
use crate::services::amount::amount_or_zero;

pub const EPOCH_DATE: &str = "1970-01-01";
pub const UNKNOWN_SPORT: &str = "0000";

/// Net movement of one exchange line: credit plus (accounting-negative)
/// debit.
pub fn exchange_balance(
    record: &ExchangeTransaction,
    collection: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> f64 {
    let credit = amount_or_zero(
        record.credit_amount.as_ref(),
        collection,
        &record.id,
        "creditAmount",
        diagnostics,
    );
    let debit = amount_or_zero(
        record.debit_amount.as_ref(),
        collection,
        &record.id,
        "debitAmount",
        diagnostics,
    );
    credit + debit
}

pub fn bookie_pnl(
    record: &BookieTransaction,
    collection: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> f64 {
    amount_or_zero(record.pnl.as_ref(), collection, &record.id, "pnl", diagnostics)
}

/// Compute figures from the records that were found. Counts reflect the
/// records passed in; callers holding id lists with missing records
/// overwrite them.
pub fn compute_figures(
    exchange: &[ExchangeTransaction],
    bookie: &[BookieTransaction],
    exchange_collection: &str,
    bookie_collection: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> EventFigures {
    let betfair_balance: f64 = exchange
        .iter()
        .map(|r| exchange_balance(r, exchange_collection, diagnostics))
        .sum();
    let bookie_balance: f64 = bookie
        .iter()
        .map(|r| bookie_pnl(r, bookie_collection, diagnostics))
        .sum();

    let (market_date, sport) = match bookie.first() {
        Some(first) => (
            first
                .market_date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| EPOCH_DATE.to_string()),
            first.sport(),
        ),
        None => (EPOCH_DATE.to_string(), UNKNOWN_SPORT.to_string()),
    };

    let mut exposure = 0.0;
    let mut weighted_price = 0.0;
    let mut total_stake = 0.0;
    let mut won_or_lose = String::new();
    for record in exchange {
        let price = amount_or_zero(
            record.average_price.as_ref(),
            exchange_collection,
            &record.id,
            "averagePrice",
            diagnostics,
        );
        let stake = amount_or_zero(
            record.bet_size.as_ref(),
            exchange_collection,
            &record.id,
            "betSize",
            diagnostics,
        );
        exposure += match record.side() {
            Side::Lay => price * stake - stake,
            Side::Back => stake,
            Side::Unknown => 0.0,
        };
        weighted_price += price * stake;
        total_stake += stake;
        match record.outcome() {
            Outcome::Won => won_or_lose = "L".to_string(),
            Outcome::Lost => won_or_lose = "W".to_string(),
            Outcome::NotApplicable | Outcome::Unknown => {}
        }
    }
    let expected_win = if total_stake > 0.0 {
        finite_or_zero(1.0 / (weighted_price / total_stake))
    } else {
        0.0
    };

    EventFigures {
        betfair_balance,
        bookie_balance,
        trade_gp: betfair_balance + bookie_balance,
        betfair_count: exchange.len(),
        bookie_count: bookie.len(),
        total_count: exchange.len() + bookie.len(),
        market_date,
        sport,
        betfair_exposure: finite_or_zero(exposure),
        expected_win,
        won_or_lose,
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
