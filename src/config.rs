use serde::{Deserialize, Serialize};

/// Sizing of the ledger and its insert workers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of lock shards the entries and children index are split into.
    pub shards: usize,
    /// Threads draining an `InsertQueue`.
    pub workers: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { shards: 64, workers: 4 }
    }
}

impl LedgerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
