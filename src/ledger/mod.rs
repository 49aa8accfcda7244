//! Ledger domain module: shard-owned loans and payments.
//!
//! Each served city has its own ledger store; the types here describe the
//! rows every shard shares.

mod model;
mod store;

pub use model::*;
pub use store::{renewed_due_date, LedgerStore, RENEWAL_EXTENSION_DAYS};
