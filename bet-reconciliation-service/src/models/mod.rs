//! Domain models for bet-reconciliation-service.

pub mod diagnostic;
pub mod event;
pub mod exposure;
pub mod journal;
pub mod range;
pub mod summary;
pub mod transaction;

pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use event::{
    matched_event_id, BookieGroup, EventFigures, ExchangeGroup, MatchProvenance, MatchedEvent,
};
pub use exposure::{ExposureLine, ExposureReport, OpenBookieBet, OpenExchangeBet};
pub use journal::{
    AccountTransferBatch, AccountTransferRecord, Classification, JournalEntry, JournalSource,
    NominalAccount, TrialBalance, TrialBalanceLine, TrialBalanceSummary,
};
pub use range::DateRange;
pub use summary::{
    Balances, DailySummary, NonTradingTotals, ReconciliationSummary, SummaryCounts,
    UnmatchedBucket, UnmatchedBuckets, UNKNOWN_DATE,
};
pub use transaction::{
    BookieAction, BookieDescription, BookieTransaction, ExchangeEventInfo, ExchangeTransaction,
    MatchState, Outcome, Side, CROSS_ACCOUNT_TRANSFER,
};
