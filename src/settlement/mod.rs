//! Payment settlement domain module.
//!
//! Contains the hub-owned models, the payment-request store, the lifecycle
//! service, and the background reconciliation sweeper.

mod model;
mod reconciler;
mod service;
mod store;

pub use model::*;
pub use reconciler::reconciliation_sweeper;
pub use service::{owed_amount, SettlementService};
pub use store::RequestStore;
