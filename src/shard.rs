//! City → ledger shard routing.

use std::collections::HashMap;

use crate::city::CityKey;
use crate::config::Config;
use crate::db::{self, DbError};
use crate::error::SettlementError;
use crate::ledger::LedgerStore;

/// Routes a city key to the ledger store owning that city's loans.
///
/// Built once at startup from configuration and read-only afterwards;
/// resolution is a pure lookup. Unknown or unconfigured cities fail closed.
pub struct ShardRouter {
    shards: HashMap<CityKey, LedgerStore>,
}

impl ShardRouter {
    /// Build the routing table from configuration. Pools are lazy, so an
    /// unreachable shard does not fail here; it fails on first use.
    pub fn from_config(config: &Config) -> Result<Self, DbError> {
        let mut shards = HashMap::new();
        for city in CityKey::routable() {
            if let Some(url) = config.shard_url(city) {
                let pool = db::create_lazy_pool(url, config.db_max_connections)?;
                shards.insert(city, LedgerStore::new(pool));
            }
        }
        Ok(Self { shards })
    }

    /// Resolve the ledger store for `city`.
    ///
    /// The catch-all city is never routable; a recognised city missing from
    /// the table is a configuration error, reported as such.
    pub fn resolve(&self, city: CityKey) -> Result<&LedgerStore, SettlementError> {
        if city == CityKey::Outro {
            return Err(SettlementError::UnroutableCity(city));
        }
        self.shards
            .get(&city)
            .ok_or(SettlementError::ShardUnconfigured(city))
    }

    /// Cities with a configured ledger, in no particular order.
    pub fn configured_cities(&self) -> impl Iterator<Item = CityKey> + '_ {
        self.shards.keys().copied()
    }
}
