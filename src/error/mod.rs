//! Error taxonomy for the settlement engine.
//!
//! Errors are categorical: callers map them onto their own presentation
//! layer. Every lifecycle operation fails fast: the first failing step
//! aborts the operation and the error propagates unchanged, with no
//! partial-success value and no automatic retries.

use thiserror::Error;

use crate::city::CityKey;
use crate::pix::EncodeError;

/// Settlement engine error type.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The catch-all city has no ledger shard, ever.
    #[error("city '{0}' is not served by any ledger shard")]
    UnroutableCity(CityKey),

    /// A recognised city whose shard connection is missing from
    /// configuration. A configuration error, not a not-found.
    #[error("ledger shard for city '{0}' is not configured")]
    ShardUnconfigured(CityKey),

    /// Loan missing or no longer active. The two cases are deliberately
    /// indistinguishable so callers cannot probe for loan existence.
    #[error("loan not found")]
    LoanNotFound,

    /// Payment request missing or already settled/rejected. Deliberately
    /// indistinguishable, same as above.
    #[error("payment request not found or already processed")]
    RequestNotPending,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Any I/O failure from either the hub or a shard store.
    #[error("store operation failed: {0}")]
    Store(#[from] sqlx::Error),

    #[error("payload encoding failed: {0}")]
    Encoding(#[from] EncodeError),
}

/// Result type alias used across the engine.
pub type SettlementResult<T> = Result<T, SettlementError>;
