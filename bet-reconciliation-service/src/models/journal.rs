//! Chart of accounts, journal lines and trial balance shapes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Diagnostic;

// ============================================================================
// Chart of Accounts
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NominalAccount {
    pub code: &'static str,
    pub name: &'static str,
}

pub const DIGITAL_WALLET: NominalAccount = NominalAccount {
    code: "1000",
    name: "Digital Wallet (...79DAE)",
};
pub const BOOKIE_ACCOUNT: NominalAccount = NominalAccount {
    code: "1001",
    name: "Bookie Account",
};
pub const EXCHANGE_ACCOUNT_SUB: NominalAccount = NominalAccount {
    code: "1005",
    name: "Exchange Account (Sub)",
};
pub const EXCHANGE_ACCOUNT_MASTER: NominalAccount = NominalAccount {
    code: "1006",
    name: "Exchange Account (Master)",
};
pub const EXCHANGE_INCOME: NominalAccount = NominalAccount {
    code: "4000",
    name: "Exchange Income",
};
pub const BOOKIE_INCOME: NominalAccount = NominalAccount {
    code: "4001",
    name: "Bookie Income",
};
pub const BOOKIE_BONUS: NominalAccount = NominalAccount {
    code: "4002",
    name: "Bookie Bonus",
};
pub const BOOKIE_STAKE_COST: NominalAccount = NominalAccount {
    code: "5000",
    name: "Bookie Stake Cost",
};
pub const EXCHANGE_COMMISSION: NominalAccount = NominalAccount {
    code: "5001",
    name: "Exchange Commission",
};
pub const BOOKIE_COMMISSION: NominalAccount = NominalAccount {
    code: "5004",
    name: "Bookie Commission",
};

/// Codes below this are balance sheet accounts.
pub const PROFIT_AND_LOSS_FROM_CODE: u32 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "B/S")]
    BalanceSheet,
    #[serde(rename = "P&L")]
    ProfitAndLoss,
}

impl Classification {
    /// Non-numeric codes land in P&L.
    pub fn for_code(code: &str) -> Self {
        match code.trim().parse::<u32>() {
            Ok(n) if n < PROFIT_AND_LOSS_FROM_CODE => Self::BalanceSheet,
            _ => Self::ProfitAndLoss,
        }
    }
}

// ============================================================================
// Journal
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalSource {
    Exchange,
    Bookie,
    AccountTransfer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub journal_number: i64,
    pub source: JournalSource,
    pub transaction_id: String,
    pub date: Option<NaiveDate>,
    pub description: String,
    pub debit: f64,
    pub credit: f64,
    pub nominal_code: String,
    pub nominal_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ex_ref: Option<String>,
}

impl JournalEntry {
    pub fn net(&self) -> f64 {
        self.debit - self.credit
    }
}

/// A manual journal line from the account-transfers collection.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AccountTransferRecord {
    #[serde(rename = "Jrnl_No", default)]
    pub journal_number: Option<Value>,
    /// `DD/MM/YY`.
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "DR", default)]
    pub debit: Option<Value>,
    #[serde(rename = "CR", default)]
    pub credit: Option<Value>,
    #[serde(rename = "Nominal code", default)]
    pub nominal_code: Option<Value>,
    #[serde(rename = "Nominal Name", default)]
    pub nominal_name: Option<String>,
    #[serde(rename = "Ex_Ref", default)]
    pub ex_ref: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountTransferBatch {
    #[serde(default)]
    pub records: Vec<AccountTransferRecord>,
}

// ============================================================================
// Trial Balance
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceLine {
    pub nominal_code: String,
    pub nominal_name: String,
    pub debit: f64,
    pub credit: f64,
    pub net_effect: f64,
    #[serde(rename = "type")]
    pub classification: Classification,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceSummary {
    pub total_debit: f64,
    pub total_credit: f64,
    pub net_effect: f64,
    #[serde(rename = "totalDebitPL")]
    pub total_debit_pl: f64,
    #[serde(rename = "totalCreditPL")]
    pub total_credit_pl: f64,
    #[serde(rename = "netEffectPL")]
    pub net_effect_pl: f64,
    #[serde(rename = "totalDebitBS")]
    pub total_debit_bs: f64,
    #[serde(rename = "totalCreditBS")]
    pub total_credit_bs: f64,
    #[serde(rename = "netEffectBS")]
    pub net_effect_bs: f64,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalance {
    pub lines: Vec<TrialBalanceLine>,
    pub summary: TrialBalanceSummary,
    pub entry_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}
