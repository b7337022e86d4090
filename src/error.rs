//! Error taxonomy for pricing, persistence and the proposal lifecycle

use thiserror::Error;

use crate::proposal::ProposalStatus;

/// Failures while loading a catalog or resolving a price
#[derive(Debug, Error)]
pub enum PricingError {
    #[error("malformed age bracket label {label:?}: {reason}")]
    MalformedLabel { label: String, reason: &'static str },

    #[error("pricing table {0} not found")]
    TableNotFound(u64),

    #[error("pricing table {0} is inactive")]
    TableInactive(u64),

    #[error("no bracket in table {table_id} covers {query}")]
    BracketNotFound { table_id: u64, query: String },

    #[error("age {age} matches {count} brackets in table {table_id}")]
    AmbiguousBracket { table_id: u64, age: u32, count: usize },

    #[error("duplicate bracket {label:?} in table {table_id}")]
    DuplicateLabel { table_id: u64, label: String },

    #[error("bracket {label:?} in table {table_id} has invalid value {value}")]
    InvalidValue { table_id: u64, label: String, value: f64 },

    #[error("table {table_id} has no bracket for ages {from}-{to}")]
    CoverageGap { table_id: u64, from: u32, to: u32 },

    #[error("table {table_id}: brackets {first:?} and {second:?} overlap")]
    CoverageOverlap { table_id: u64, first: String, second: String },

    #[error("table {0} has no open-ended top bracket")]
    MissingOpenBracket(u64),

    #[error("table {0} has no brackets")]
    EmptyTable(u64),

    #[error("birth date {0} is after the quote date")]
    BirthDateInFuture(chrono::NaiveDate),

    #[error("catalog row is malformed: {0}")]
    MalformedRow(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures reported by a persistence store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The table exists but lacks the column. Schema-level.
    #[error("table {table} has no column {column}")]
    UnknownColumn { table: String, column: String },

    /// Transient; safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("row in {table} is malformed: {reason}")]
    Malformed { table: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// True when the failure comes from the shape of the schema rather than the data or the link
    pub fn is_schema(&self) -> bool {
        matches!(self, StoreError::UnknownColumn { .. })
    }

    /// True when a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Failures of proposal lifecycle operations
#[derive(Debug, Error)]
pub enum ProposalError {
    #[error("invalid proposal: {0}")]
    Validation(String),

    #[error("proposal {0} not found")]
    NotFound(u64),

    #[error("cannot move proposal {id} from {from} to {to}")]
    InvalidTransition {
        id: u64,
        from: ProposalStatus,
        to: ProposalStatus,
    },

    #[error("store schema lacks cancellation columns: {0}")]
    SchemaCompatibility(StoreError),

    #[error("session missing or not allowed to {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}
