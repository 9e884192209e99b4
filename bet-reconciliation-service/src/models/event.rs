//! Event groups (ephemeral, per matching pass) and persisted matched events.

use crate::services::store::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_core::error::AppError;

// ============================================================================
// Event Groups
// ============================================================================

/// Exchange records sharing settlement date, time and linked event hint.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeGroup {
    pub settled_date: String,
    pub settled_time: String,
    pub event_hint: String,
    pub settled_at_millis: Option<i64>,
    pub ids: Vec<String>,
    pub search_string: String,
}

impl ExchangeGroup {
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.settled_date, self.settled_time, self.event_hint
        )
    }
}

/// Bookie records sharing market time and event name.
#[derive(Debug, Clone, PartialEq)]
pub struct BookieGroup {
    pub market_time_millis: i64,
    pub event_name: String,
    pub ids: Vec<String>,
    pub search_string: String,
}

impl BookieGroup {
    pub fn key(&self) -> String {
        format!("{}_{}", self.market_time_millis, self.event_name)
    }
}

/// Composite id of the matched event created from a pairing.
pub fn matched_event_id(exchange: &ExchangeGroup, bookie: &BookieGroup) -> String {
    format!("{}_{}", exchange.settled_date, bookie.key())
}

// ============================================================================
// Matched Events
// ============================================================================

/// Figures derived from the paired records, computed once at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventFigures {
    pub betfair_balance: f64,
    pub bookie_balance: f64,
    #[serde(rename = "tradeGP")]
    pub trade_gp: f64,
    pub betfair_count: usize,
    pub bookie_count: usize,
    pub total_count: usize,
    /// Market date of the first bookie record (`YYYY-MM-DD`).
    pub market_date: String,
    pub sport: String,
    pub betfair_exposure: f64,
    pub expected_win: f64,
    /// `W`, `L` or empty.
    pub won_or_lose: String,
}

/// How the pairing was accepted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchProvenance {
    pub confidence: f64,
    pub threshold_used: f64,
    pub window_hours: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedEvent {
    #[serde(skip)]
    pub id: String,
    #[serde(default)]
    pub betfair_doc_ids: Vec<String>,
    #[serde(default)]
    pub bookie_doc_ids: Vec<String>,
    /// Settlement date of the exchange group; the daily breakdown key.
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub figures: Option<EventFigures>,
    #[serde(default, rename = "match")]
    pub provenance: Option<MatchProvenance>,
}

impl MatchedEvent {
    pub fn from_document(document: &Document) -> Result<Self, AppError> {
        let mut event: Self = serde_json::from_value(Value::Object(document.fields.clone()))?;
        event.id = document.id.clone();
        Ok(event)
    }

    pub fn to_fields(&self) -> Result<Map<String, Value>, AppError> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(AppError::InternalError(anyhow::anyhow!(
                "Matched event did not serialize to an object"
            ))),
        }
    }

    /// Daily breakdown key: the persisted event date, or the id prefix for
    /// events written before the field existed.
    pub fn date_key(&self) -> String {
        self.event_date.clone().unwrap_or_else(|| {
            self.id
                .split('_')
                .next()
                .unwrap_or_default()
                .to_string()
        })
    }

    pub fn transaction_count(&self) -> usize {
        self.betfair_doc_ids.len() + self.bookie_doc_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_composite_event_id() {
        let exchange = ExchangeGroup {
            settled_date: "2024-03-02".to_string(),
            settled_time: "15:30".to_string(),
            event_hint: "Arsenal v Chelsea".to_string(),
            settled_at_millis: Some(1_709_393_400_000),
            ids: vec!["b1".to_string()],
            search_string: "arsenal chelsea v".to_string(),
        };
        let bookie = BookieGroup {
            market_time_millis: 1_709_393_400_000,
            event_name: "Arsenal v Chelsea".to_string(),
            ids: vec!["k1".to_string()],
            search_string: "arsenal chelsea v".to_string(),
        };

        assert_eq!(exchange.key(), "2024-03-02_15:30_Arsenal v Chelsea");
        assert_eq!(
            matched_event_id(&exchange, &bookie),
            "2024-03-02_1709393400000_Arsenal v Chelsea"
        );
    }

    #[test]
    fn test_legacy_event_without_figures() {
        let document = Document::new(
            "2024-03-01_1709300000000_Leeds v Hull",
            json!({ "betfairDocIds": ["b1"], "bookieDocIds": ["k1", "k2"] })
                .as_object()
                .cloned()
                .unwrap(),
        );
        let event = MatchedEvent::from_document(&document).unwrap();

        assert!(event.figures.is_none());
        assert_eq!(event.date_key(), "2024-03-01");
        assert_eq!(event.transaction_count(), 3);
    }

    #[test]
    fn test_fields_do_not_repeat_the_id() {
        let event = MatchedEvent {
            id: "x".to_string(),
            betfair_doc_ids: vec!["b1".to_string()],
            ..Default::default()
        };
        let fields = event.to_fields().unwrap();

        assert!(!fields.contains_key("id"));
        assert_eq!(fields["betfairDocIds"], json!(["b1"]));
    }
}
