//! One stored result and its bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serialized result held by [`MemoryGateway`](crate::gateway::MemoryGateway)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    /// JSON text as written by `store_string`
    pub value: String,
    pub metadata: EntryMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub created_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub reads: u64,
    /// Charged against the gateway's byte limit
    pub size_bytes: usize,
}

impl CacheEntry {
    pub fn new(key: String, value: String, ttl: Duration) -> Self {
        let created_at = Utc::now();
        // Out-of-range TTLs saturate instead of failing the write
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let size_bytes = key.len() + value.len() + std::mem::size_of::<EntryMetadata>();

        Self {
            key,
            value,
            metadata: EntryMetadata {
                created_at,
                last_read_at: None,
                expires_at,
                reads: 0,
                size_bytes,
            },
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.metadata.expires_at
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining_ttl(&self) -> Option<Duration> {
        (self.metadata.expires_at - Utc::now()).to_std().ok()
    }

    pub fn record_read(&mut self) {
        self.metadata.last_read_at = Some(Utc::now());
        self.metadata.reads += 1;
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.metadata.created_at)
            .to_std()
            .unwrap_or_default()
    }
}
