//! Services module for bet-reconciliation-service.

pub mod aggregation;
pub mod amount;
pub mod database;
pub mod dates;
pub mod exposure;
pub mod figures;
pub mod gateway;
pub mod grouping;
pub mod journal;
pub mod matching;
pub mod metrics;
pub mod reconciliation;
pub mod similarity;
pub mod store;

pub use amount::normalize_amount;
pub use database::MongoStore;
pub use gateway::{load_snapshot, LedgerSnapshot, StoreGateway};
pub use matching::{MatchingEngine, MatchingOutcome, PassReport};
pub use metrics::{get_metrics, init_metrics, record_error};
pub use reconciliation::{EventDetail, ReconciliationService};
pub use store::{Document, InMemoryStore, RecordStore};
