//! Journal generator and trial balance.
//!
//! Each statement line is turned into a balanced set of journal lines by a
//! fixed rule table. Manual journals from the account-transfers collection
//! are passed through as recorded. One generator serves both the full and
//! the date-ranged trial balance; the range is only a filter on the record
//! date.

use crate::config::Collections;
use crate::models::journal::{
    NominalAccount, BOOKIE_ACCOUNT, BOOKIE_BONUS, BOOKIE_COMMISSION, BOOKIE_INCOME,
    BOOKIE_STAKE_COST, DIGITAL_WALLET, EXCHANGE_ACCOUNT_MASTER, EXCHANGE_ACCOUNT_SUB,
    EXCHANGE_COMMISSION, EXCHANGE_INCOME,
};
use crate::models::{
    AccountTransferBatch, BookieAction, BookieTransaction, Classification, DateRange, Diagnostic,
    DiagnosticKind, ExchangeTransaction, JournalEntry, JournalSource, TrialBalanceLine,
    TrialBalanceSummary,
};
use crate::services::amount::{amount_or_zero, round2};
use crate::services::dates::parse_ddmmyy;
use crate::services::store::Document;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Bookie credits that are deposits rather than bonuses.
pub const BONUS_EXCLUDED_IDS: [&str; 3] = ["2866509", "2866513", "2866515"];

const BALANCE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Debit,
    Credit,
}

/// Journal lines for one source record, built up rule by rule.
struct Posting<'a> {
    source: JournalSource,
    journal_number: i64,
    transaction_id: &'a str,
    date: Option<NaiveDate>,
    description: &'a str,
    lines: Vec<JournalEntry>,
}

impl<'a> Posting<'a> {
    fn new(
        source: JournalSource,
        journal_number: i64,
        transaction_id: &'a str,
        date: Option<NaiveDate>,
        description: &'a str,
    ) -> Self {
        Self {
            source,
            journal_number,
            transaction_id,
            date,
            description,
            lines: Vec::new(),
        }
    }

    /// Zero amounts produce no line; negative amounts post to the other side.
    fn post(&mut self, direction: Direction, account: NominalAccount, amount: f64) {
        if amount == 0.0 {
            return;
        }
        let (direction, amount) = if amount < 0.0 {
            let flipped = match direction {
                Direction::Debit => Direction::Credit,
                Direction::Credit => Direction::Debit,
            };
            (flipped, -amount)
        } else {
            (direction, amount)
        };
        let (debit, credit) = match direction {
            Direction::Debit => (amount, 0.0),
            Direction::Credit => (0.0, amount),
        };
        self.lines.push(JournalEntry {
            journal_number: self.journal_number,
            source: self.source,
            transaction_id: self.transaction_id.to_string(),
            date: self.date,
            description: self.description.to_string(),
            debit,
            credit,
            nominal_code: account.code.to_string(),
            nominal_name: account.name.to_string(),
            ex_ref: None,
        });
    }

    fn debit(&mut self, account: NominalAccount, amount: f64) {
        self.post(Direction::Debit, account, amount);
    }

    fn credit(&mut self, account: NominalAccount, amount: f64) {
        self.post(Direction::Credit, account, amount);
    }

    fn finish(self) -> Vec<JournalEntry> {
        let debits: f64 = self.lines.iter().map(|l| l.debit).sum();
        let credits: f64 = self.lines.iter().map(|l| l.credit).sum();
        if (debits - credits).abs() > BALANCE_TOLERANCE {
            warn!(
                transaction_id = self.transaction_id,
                debits = debits,
                credits = credits,
                "Journal lines do not balance"
            );
        }
        self.lines
    }
}

// ============================================================================
// Rule Table
// ============================================================================

/// Journal lines for one exchange statement line.
///
/// The pair of accounts depends on the outcome sign and the transfer flag.
/// A positive credit amount debits the sub account; otherwise the debit
/// amount is posted the other way round.
pub fn exchange_entries(
    record: &ExchangeTransaction,
    journal_number: i64,
    collection: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<JournalEntry> {
    let credit_amount = amount_or_zero(
        record.credit_amount.as_ref(),
        collection,
        &record.id,
        "creditAmount",
        diagnostics,
    )
    .abs();
    let debit_amount = amount_or_zero(
        record.debit_amount.as_ref(),
        collection,
        &record.id,
        "debitAmount",
        diagnostics,
    )
    .abs();

    let counter_account = match record.win_lose.as_deref() {
        Some("-") if record.is_transfer() => EXCHANGE_ACCOUNT_MASTER,
        Some("-") => EXCHANGE_COMMISSION,
        _ => EXCHANGE_INCOME,
    };

    let description = format!("{} - {}", record.bet_description(), record.counterparty());
    let mut posting = Posting::new(
        JournalSource::Exchange,
        journal_number,
        &record.id,
        record.placed_date(),
        &description,
    );

    if credit_amount > 0.0 {
        posting.debit(EXCHANGE_ACCOUNT_SUB, credit_amount);
        posting.credit(counter_account, credit_amount);
    } else {
        posting.debit(counter_account, debit_amount);
        posting.credit(EXCHANGE_ACCOUNT_SUB, debit_amount);
    }
    posting.finish()
}

/// Journal lines for one bookie statement line.
pub fn bookie_entries(
    record: &BookieTransaction,
    journal_number: i64,
    collection: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<JournalEntry> {
    let pnl = amount_or_zero(record.pnl.as_ref(), collection, &record.id, "pnl", diagnostics);
    let commission = amount_or_zero(
        record.commission.as_ref(),
        collection,
        &record.id,
        "commission",
        diagnostics,
    )
    .abs();
    let action = record.action();

    let description = record
        .event_name()
        .map(str::to_string)
        .unwrap_or_else(|| action.as_str().to_string());
    let mut posting = Posting::new(
        JournalSource::Bookie,
        journal_number,
        &record.id,
        record.posted_date(),
        &description,
    );

    let has_commission = commission != 0.0;
    match action {
        BookieAction::SettleCommAdj if has_commission => {
            if pnl <= 0.0 {
                posting.credit(BOOKIE_ACCOUNT, pnl.abs());
                posting.debit(BOOKIE_COMMISSION, pnl.abs());
            } else {
                default_bookie_lines(&mut posting, pnl);
            }
        }
        _ if has_commission => {
            posting.credit(BOOKIE_INCOME, pnl + commission);
            posting.debit(BOOKIE_COMMISSION, commission);
            posting.debit(BOOKIE_ACCOUNT, pnl);
        }
        BookieAction::Credit if pnl > 0.0 && !BONUS_EXCLUDED_IDS.contains(&record.id.as_str()) => {
            posting.debit(BOOKIE_ACCOUNT, pnl);
            posting.credit(BOOKIE_BONUS, pnl * 2.0 / 3.0);
            posting.credit(DIGITAL_WALLET, pnl / 3.0);
        }
        _ => default_bookie_lines(&mut posting, pnl),
    }
    posting.finish()
}

fn default_bookie_lines(posting: &mut Posting<'_>, pnl: f64) {
    if pnl < 0.0 {
        posting.debit(BOOKIE_STAKE_COST, pnl.abs());
        posting.credit(BOOKIE_ACCOUNT, pnl.abs());
    } else {
        posting.debit(BOOKIE_ACCOUNT, pnl);
        posting.credit(BOOKIE_INCOME, pnl);
    }
}

// ============================================================================
// Manual Journals
// ============================================================================

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn value_integer(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

/// Lines of the account-transfers documents, filtered by date when a range
/// is given. Lines whose date cannot be read are kept only without a range.
pub fn account_transfer_entries(
    documents: &[Document],
    collection: &str,
    range: Option<&DateRange>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<JournalEntry> {
    let mut entries = Vec::new();
    for document in documents {
        let batch: AccountTransferBatch =
            match serde_json::from_value(Value::Object(document.fields.clone())) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(
                        collection = collection,
                        record_id = %document.id,
                        error = %e,
                        "Skipping malformed manual journal"
                    );
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Validation,
                        collection,
                        document.id.clone(),
                        format!("Malformed manual journal: {}", e),
                    ));
                    continue;
                }
            };

        for (index, line) in batch.records.into_iter().enumerate() {
            let line_id = format!("{}#{}", document.id, index);
            let date = line.date.as_deref().and_then(parse_ddmmyy);
            if !keep_dated(range, date, collection, &line_id, diagnostics) {
                continue;
            }
            entries.push(JournalEntry {
                journal_number: value_integer(line.journal_number.as_ref()),
                source: JournalSource::AccountTransfer,
                transaction_id: line_id.clone(),
                date,
                description: line.description.unwrap_or_default(),
                debit: amount_or_zero(line.debit.as_ref(), collection, &line_id, "DR", diagnostics),
                credit: amount_or_zero(
                    line.credit.as_ref(),
                    collection,
                    &line_id,
                    "CR",
                    diagnostics,
                ),
                nominal_code: value_text(line.nominal_code.as_ref()),
                nominal_name: line.nominal_name.unwrap_or_default(),
                ex_ref: line
                    .ex_ref
                    .as_ref()
                    .map(|v| value_text(Some(v)))
                    .filter(|s| !s.is_empty()),
            });
        }
    }
    entries
}

fn keep_dated(
    range: Option<&DateRange>,
    date: Option<NaiveDate>,
    collection: &str,
    record_id: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> bool {
    let Some(range) = range else {
        return true;
    };
    match date {
        Some(date) => range.contains(date),
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::Validation,
                collection,
                record_id,
                "Record has no readable date and was left out of the ranged journal",
            ));
            false
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Journal for both statements and the manual journals. Journal numbers run
/// per source, one number per source record.
pub fn generate_journal(
    exchange: &[ExchangeTransaction],
    bookie: &[BookieTransaction],
    transfers: &[Document],
    collections: &Collections,
    range: Option<&DateRange>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<JournalEntry> {
    let mut entries = Vec::new();

    let mut journal_number = 0;
    for record in exchange {
        if !keep_dated(
            range,
            record.placed_date(),
            &collections.exchange,
            &record.id,
            diagnostics,
        ) {
            continue;
        }
        journal_number += 1;
        entries.extend(exchange_entries(
            record,
            journal_number,
            &collections.exchange,
            diagnostics,
        ));
    }

    let mut journal_number = 0;
    for record in bookie {
        if !keep_dated(
            range,
            record.posted_date(),
            &collections.bookie,
            &record.id,
            diagnostics,
        ) {
            continue;
        }
        journal_number += 1;
        entries.extend(bookie_entries(
            record,
            journal_number,
            &collections.bookie,
            diagnostics,
        ));
    }

    entries.extend(account_transfer_entries(
        transfers,
        &collections.account_transfers,
        range,
        diagnostics,
    ));

    debug!(entries = entries.len(), "Journal generated");
    entries
}

// ============================================================================
// Trial Balance
// ============================================================================

/// Sum journal lines per nominal code. Lines come back sorted by code and
/// rounded to cents; the summary adds up the rounded lines.
pub fn build_trial_balance(
    entries: &[JournalEntry],
) -> (Vec<TrialBalanceLine>, TrialBalanceSummary) {
    let mut by_code: BTreeMap<&str, (&str, f64, f64)> = BTreeMap::new();
    for entry in entries {
        let slot = by_code
            .entry(entry.nominal_code.as_str())
            .or_insert((entry.nominal_name.as_str(), 0.0, 0.0));
        slot.1 += entry.debit;
        slot.2 += entry.credit;
    }

    let lines: Vec<TrialBalanceLine> = by_code
        .into_iter()
        .map(|(code, (name, debit, credit))| TrialBalanceLine {
            nominal_code: code.to_string(),
            nominal_name: name.to_string(),
            debit: round2(debit),
            credit: round2(credit),
            net_effect: round2(debit - credit),
            classification: Classification::for_code(code),
        })
        .collect();

    let mut summary = TrialBalanceSummary::default();
    for line in &lines {
        summary.total_debit += line.debit;
        summary.total_credit += line.credit;
        match line.classification {
            Classification::ProfitAndLoss => {
                summary.total_debit_pl += line.debit;
                summary.total_credit_pl += line.credit;
            }
            Classification::BalanceSheet => {
                summary.total_debit_bs += line.debit;
                summary.total_credit_bs += line.credit;
            }
        }
    }
    summary.total_debit = round2(summary.total_debit);
    summary.total_credit = round2(summary.total_credit);
    summary.net_effect = round2(summary.total_debit - summary.total_credit);
    summary.total_debit_pl = round2(summary.total_debit_pl);
    summary.total_credit_pl = round2(summary.total_credit_pl);
    summary.net_effect_pl = round2(summary.total_debit_pl - summary.total_credit_pl);
    summary.total_debit_bs = round2(summary.total_debit_bs);
    summary.total_credit_bs = round2(summary.total_credit_bs);
    summary.net_effect_bs = round2(summary.total_debit_bs - summary.total_credit_bs);

    (lines, summary)
}
