//! City partitioning keys.
//!
//! Loans and payments are partitioned by originating city; each recognised
//! city owns an independent ledger store. `Outro` is the catch-all for
//! unlisted cities and never routes to a ledger.

use serde::{Deserialize, Serialize};

/// City key enum: the closed set of served cities plus the catch-all.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "city_key", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CityKey {
    Franca,
    PraiaGrande,
    Mogiana,
    Imperatriz,
    Outro,
}

impl CityKey {
    /// Cities that own a ledger shard. `Outro` is deliberately absent.
    pub fn routable() -> [CityKey; 4] {
        [
            CityKey::Franca,
            CityKey::PraiaGrande,
            CityKey::Mogiana,
            CityKey::Imperatriz,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CityKey::Franca => "franca",
            CityKey::PraiaGrande => "praia_grande",
            CityKey::Mogiana => "mogiana",
            CityKey::Imperatriz => "imperatriz",
            CityKey::Outro => "outro",
        }
    }

    /// Human-facing label, as shown on the borrower-facing forms.
    pub fn label(&self) -> &'static str {
        match self {
            CityKey::Franca => "Franca",
            CityKey::PraiaGrande => "Praia Grande",
            CityKey::Mogiana => "Mogiana",
            CityKey::Imperatriz => "Imperatriz",
            CityKey::Outro => "Cidade não listada",
        }
    }

    /// Environment variable naming the city's ledger connection string.
    pub fn shard_env_var(&self) -> Option<&'static str> {
        match self {
            CityKey::Franca => Some("SHARD_FRANCA_DATABASE_URL"),
            CityKey::PraiaGrande => Some("SHARD_PRAIA_GRANDE_DATABASE_URL"),
            CityKey::Mogiana => Some("SHARD_MOGIANA_DATABASE_URL"),
            CityKey::Imperatriz => Some("SHARD_IMPERATRIZ_DATABASE_URL"),
            CityKey::Outro => None,
        }
    }
}

impl std::fmt::Display for CityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
