//! Statement records as they sit in the document store.
//!
//! Both feeds are normalized upstream but remain loosely typed: nested
//! blocks can be missing and amounts arrive either as numbers or as
//! accounting-formatted strings. Every field is therefore optional here and
//! defaults are applied by the accessor methods, never at call sites.

#![allow(clippy::should_implement_trait)]

use crate::services::store::Document;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;

/// Counterparty text the exchange uses for moves between its own accounts.
pub const CROSS_ACCOUNT_TRANSFER: &str = "Cross accounts transfer";

// ============================================================================
// Match State
// ============================================================================

/// Per-record matching lifecycle. `Matched` and `Excluded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchState {
    Unmatched,
    Matched,
    Excluded,
}

impl MatchState {
    /// Value persisted in the `Matched` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmatched => "unmatched",
            Self::Matched => "YES",
            Self::Excluded => "NEVER",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "YES" => Self::Matched,
            "NEVER" => Self::Excluded,
            _ => Self::Unmatched,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unmatched)
    }
}

// ============================================================================
// Exchange (Betfair) Statement
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Back,
    Lay,
    Unknown,
}

impl Side {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "back" => Self::Back,
            "lay" => Self::Lay,
            _ => Self::Unknown,
        }
    }
}

/// Settlement outcome. The exchange writes `-` on lines that are not bet
/// settlements (commission, transfers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
    NotApplicable,
    Unknown,
}

impl Outcome {
    pub fn from_str(s: &str) -> Self {
        match s {
            "Won" => Self::Won,
            "Lost" => Self::Lost,
            "-" => Self::NotApplicable,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeEventInfo {
    #[serde(default)]
    pub name_and_selection_name: Option<String>,
    /// Carries the side (`Back`/`Lay`) on settled bets.
    #[serde(default)]
    pub bet_description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeTransaction {
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[serde(default)]
    pub bet_id: Option<Value>,
    #[serde(default)]
    pub formatted_settled_date: Option<String>,
    #[serde(default)]
    pub formatted_settled_time: Option<String>,
    #[serde(default)]
    pub formatted_placed_date: Option<String>,
    /// Event name hint linking the exchange line to a bookie market.
    #[serde(default)]
    pub bookie_match_event: Option<String>,
    #[serde(default)]
    pub bookie_match_selection: Option<String>,
    #[serde(default)]
    pub event: Option<ExchangeEventInfo>,
    #[serde(default)]
    pub average_price: Option<Value>,
    #[serde(default)]
    pub bet_size: Option<Value>,
    #[serde(default)]
    pub credit_amount: Option<Value>,
    #[serde(default)]
    pub debit_amount: Option<Value>,
    #[serde(default)]
    pub win_lose: Option<String>,
    #[serde(default, rename = "Matched")]
    pub matched: Option<String>,
    #[serde(default)]
    pub matched_event_id: Option<String>,
}

impl ExchangeTransaction {
    pub fn from_document(document: &Document) -> Result<Self, AppError> {
        let mut record: Self = serde_json::from_value(Value::Object(document.fields.clone()))?;
        record.id = document.id.clone();
        Ok(record)
    }

    pub fn match_state(&self) -> MatchState {
        self.matched
            .as_deref()
            .map(MatchState::from_str)
            .unwrap_or(MatchState::Unmatched)
    }

    pub fn counterparty(&self) -> &str {
        self.event
            .as_ref()
            .and_then(|e| e.name_and_selection_name.as_deref())
            .unwrap_or("")
    }

    pub fn bet_description(&self) -> &str {
        self.event
            .as_ref()
            .and_then(|e| e.bet_description.as_deref())
            .unwrap_or("")
    }

    pub fn is_transfer(&self) -> bool {
        self.counterparty() == CROSS_ACCOUNT_TRANSFER
    }

    pub fn side(&self) -> Side {
        Side::from_str(self.bet_description())
    }

    pub fn outcome(&self) -> Outcome {
        self.win_lose
            .as_deref()
            .map(Outcome::from_str)
            .unwrap_or(Outcome::Unknown)
    }

    pub fn settled_date(&self) -> Option<NaiveDate> {
        self.formatted_settled_date
            .as_deref()
            .and_then(crate::services::dates::parse_iso_date)
    }

    pub fn placed_date(&self) -> Option<NaiveDate> {
        self.formatted_placed_date
            .as_deref()
            .and_then(crate::services::dates::parse_iso_date)
    }

    /// Settlement instant in epoch milliseconds (date and time read as UTC).
    pub fn settled_at_millis(&self) -> Option<i64> {
        let date = self.settled_date()?;
        let time = self
            .formatted_settled_time
            .as_deref()
            .and_then(parse_time)
            .unwrap_or(NaiveTime::MIN);
        Some(NaiveDateTime::new(date, time).and_utc().timestamp_millis())
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

// ============================================================================
// Bookie Statement
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookieAction {
    Credit,
    Open,
    TransferDown,
    SettleCommAdj,
    Other(String),
}

impl BookieAction {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Credit => "CREDIT",
            Self::Open => "OPEN",
            Self::TransferDown => "TRANSFER_DOWN",
            Self::SettleCommAdj => "SETTLE_COMM_ADJ",
            Self::Other(s) => s.as_str(),
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "CREDIT" => Self::Credit,
            "OPEN" => Self::Open,
            "TRANSFER_DOWN" => Self::TransferDown,
            "SETTLE_COMM_ADJ" => Self::SettleCommAdj,
            other => Self::Other(other.to_string()),
        }
    }

    /// Account movements rather than wager outcomes.
    pub fn is_non_trading(&self) -> bool {
        matches!(self, Self::Credit | Self::Open | Self::TransferDown)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookieDescription {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub selection_name: Option<String>,
    /// Epoch milliseconds, as a number or numeric string.
    #[serde(default)]
    pub market_time: Option<Value>,
    #[serde(default)]
    pub event_type_id: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookieTransaction {
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub description: Option<BookieDescription>,
    #[serde(default)]
    pub pnl: Option<Value>,
    #[serde(default)]
    pub commission: Option<Value>,
    /// Posting instant, epoch milliseconds.
    #[serde(default)]
    pub date: Option<Value>,
    #[serde(default, rename = "Matched")]
    pub matched: Option<String>,
    #[serde(default)]
    pub matched_event_id: Option<String>,
}

impl BookieTransaction {
    pub fn from_document(document: &Document) -> Result<Self, AppError> {
        let mut record: Self = serde_json::from_value(Value::Object(document.fields.clone()))?;
        record.id = document.id.clone();
        Ok(record)
    }

    pub fn match_state(&self) -> MatchState {
        self.matched
            .as_deref()
            .map(MatchState::from_str)
            .unwrap_or(MatchState::Unmatched)
    }

    pub fn action(&self) -> BookieAction {
        BookieAction::from_str(self.action.as_deref().unwrap_or(""))
    }

    pub fn event_name(&self) -> Option<&str> {
        self.description
            .as_ref()
            .and_then(|d| d.event_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn selection_name(&self) -> Option<&str> {
        self.description
            .as_ref()
            .and_then(|d| d.selection_name.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn market_time_millis(&self) -> Option<i64> {
        self.description
            .as_ref()
            .and_then(|d| d.market_time.as_ref())
            .and_then(value_as_millis)
    }

    pub fn market_date(&self) -> Option<NaiveDate> {
        self.market_time_millis().and_then(millis_to_date)
    }

    pub fn posted_date(&self) -> Option<NaiveDate> {
        self.date
            .as_ref()
            .and_then(value_as_millis)
            .and_then(millis_to_date)
    }

    /// Sport / event-type code, `0000` when unknown.
    pub fn sport(&self) -> String {
        match self.description.as_ref().and_then(|d| d.event_type_id.as_ref()) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0000".to_string(),
        }
    }
}

/// Millisecond timestamp, or `None` when it is unreadable or outside the
/// range chrono can represent.
fn value_as_millis(value: &Value) -> Option<i64> {
    let millis = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|_| millis)
}

pub(crate) fn millis_to_date(millis: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        Document::new(id, fields.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_match_state_round_trip_of_persisted_values() {
        assert_eq!(MatchState::from_str("YES"), MatchState::Matched);
        assert_eq!(MatchState::from_str("NEVER"), MatchState::Excluded);
        assert_eq!(MatchState::from_str("unmatched"), MatchState::Unmatched);
        assert_eq!(MatchState::from_str("maybe"), MatchState::Unmatched);
        assert!(MatchState::Excluded.is_terminal());
        assert!(!MatchState::Unmatched.is_terminal());
    }

    #[test]
    fn test_exchange_record_defaults_when_blocks_missing() {
        let record = ExchangeTransaction::from_document(&doc("b1", json!({}))).unwrap();
        assert_eq!(record.id, "b1");
        assert_eq!(record.counterparty(), "");
        assert_eq!(record.side(), Side::Unknown);
        assert_eq!(record.outcome(), Outcome::Unknown);
        assert_eq!(record.match_state(), MatchState::Unmatched);
        assert!(record.settled_at_millis().is_none());
    }

    #[test]
    fn test_exchange_settlement_instant() {
        let record = ExchangeTransaction::from_document(&doc(
            "b1",
            json!({
                "formattedSettledDate": "2024-03-02",
                "formattedSettledTime": "15:30",
                "event": { "nameAndSelectionName": "Cross accounts transfer", "betDescription": "Lay" },
                "winLose": "-"
            }),
        ))
        .unwrap();

        assert_eq!(record.settled_at_millis(), Some(1_709_393_400_000));
        assert!(record.is_transfer());
        assert_eq!(record.side(), Side::Lay);
        assert_eq!(record.outcome(), Outcome::NotApplicable);
    }

    #[test]
    fn test_bookie_market_time_accepts_strings() {
        let record = BookieTransaction::from_document(&doc(
            "k1",
            json!({
                "action": "SETTLE",
                "description": { "marketTime": "1709393400000", "eventName": "Arsenal v Chelsea", "eventTypeId": 1 }
            }),
        ))
        .unwrap();

        assert_eq!(record.market_time_millis(), Some(1_709_393_400_000));
        assert_eq!(record.market_date(), NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(record.sport(), "1");
        assert_eq!(record.action(), BookieAction::Other("SETTLE".to_string()));
        assert!(!record.action().is_non_trading());
    }

    #[test]
    fn test_bookie_market_time_outside_calendar_is_unreadable() {
        for raw in [json!(-1.0e19), json!(1.0e19), json!("9223372036854775807")] {
            let record = BookieTransaction::from_document(&doc(
                "k1",
                json!({ "action": "SETTLE", "description": { "marketTime": raw } }),
            ))
            .unwrap();
            assert_eq!(record.market_time_millis(), None, "{}", raw);
            assert_eq!(record.market_date(), None);
        }
    }

    #[test]
    fn test_bookie_non_trading_actions() {
        assert!(BookieAction::from_str("CREDIT").is_non_trading());
        assert!(BookieAction::from_str("OPEN").is_non_trading());
        assert!(BookieAction::from_str("TRANSFER_DOWN").is_non_trading());
        assert!(!BookieAction::from_str("SETTLE_COMM_ADJ").is_non_trading());
    }
}
