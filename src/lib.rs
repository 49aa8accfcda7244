//! Payment settlement engine for a city-sharded loan ledger.
//!
//! Borrowers self-serve loan payments through a generated PIX instruction;
//! staff approve or reject the submitted proof, after which the owning
//! city's ledger is updated. This library exports the city shard router,
//! the hub and ledger stores, the payload codec, and the lifecycle service;
//! the binary target runs the reconciliation daemon.

pub mod audit;
pub mod city;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod pix;
pub mod settlement;
pub mod shard;
