//! Bet Reconciliation Service - pairs exchange and bookie statement lines
//! into matched events and reports summaries, trial balance and exposure.

pub mod config;
pub mod models;
pub mod services;
pub mod startup;
