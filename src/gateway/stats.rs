//! Counters kept by the in-process gateway

use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of gateway counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,

    /// Live entries at snapshot time
    pub entries: usize,
    /// Bytes held by live entries
    pub size_bytes: usize,

    /// Entries dropped to respect the entry or byte limit
    pub evicted: u64,
    /// Entries dropped because their TTL ran out
    pub expired: u64,
    /// Entries dropped by `remove` or `clear`
    pub removals: u64,
}

impl CacheStats {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served from the store; `None` before the first lookup
    pub fn hit_ratio(&self) -> Option<f64> {
        match self.lookups() {
            0 => None,
            lookups => Some(self.hits as f64 / lookups as f64),
        }
    }

    /// Entries lost to limits or expiry
    pub fn evictions(&self) -> u64 {
        self.evicted + self.expired
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} hits", self.hits, self.lookups())?;
        if let Some(ratio) = self.hit_ratio() {
            write!(f, " ({:.1}%)", ratio * 100.0)?;
        }
        write!(
            f,
            ", {} stores, {} entries in {} bytes, {} evicted, {} expired",
            self.stores, self.entries, self.size_bytes, self.evicted, self.expired
        )
    }
}
