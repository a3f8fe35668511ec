//! In-process gateway with TTL expiry and least-recently-used eviction

use crate::error::{CacheError, Result};
use crate::gateway::{
    config::GatewayConfig, entry::CacheEntry, stats::CacheStats, CacheGateway, HealthStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// In-process [`CacheGateway`]
///
/// Entries carry a jittered TTL and are checked for expiry on every read.
/// When the entry or byte limit is reached the least recently used entry is
/// dropped first (least recently written when `enable_lru_eviction` is off).
/// The reported health can be switched by hand so callers can exercise the
/// interceptor's bypass path.
pub struct MemoryGateway {
    pub(crate) config: GatewayConfig,
    store: RwLock<GatewayStore>,
    health: Mutex<HealthStatus>,
}

struct Slot {
    entry: CacheEntry,
    tick: u64,
}

/// Entries plus a tick-ordered index; the lowest tick is evicted first
#[derive(Default)]
struct GatewayStore {
    slots: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
    bytes: usize,
    stats: CacheStats,
}

impl GatewayStore {
    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn put(&mut self, entry: CacheEntry) {
        let tick = self.tick();
        self.bytes += entry.metadata.size_bytes;
        self.order.insert(tick, entry.key.clone());
        self.slots.insert(entry.key.clone(), Slot { entry, tick });
    }

    fn take(&mut self, key: &str) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.tick);
        self.bytes = self.bytes.saturating_sub(slot.entry.metadata.size_bytes);
        Some(slot.entry)
    }

    fn touch(&mut self, key: &str) {
        let tick = self.tick();
        if let Some(slot) = self.slots.get_mut(key) {
            let previous = std::mem::replace(&mut slot.tick, tick);
            if let Some(key) = self.order.remove(&previous) {
                self.order.insert(tick, key);
            }
        }
    }

    fn pop_oldest(&mut self) -> Option<CacheEntry> {
        let (_, key) = self.order.pop_first()?;
        let slot = self.slots.remove(&key)?;
        self.bytes = self.bytes.saturating_sub(slot.entry.metadata.size_bytes);
        Some(slot.entry)
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            entries: self.slots.len(),
            size_bytes: self.bytes,
            ..self.stats.clone()
        }
    }
}

impl MemoryGateway {
    pub fn new(config: GatewayConfig) -> Self {
        if let Err(e) = config.validate() {
            warn!("Memory gateway started with invalid configuration: {}", e);
        }
        info!(
            "Memory gateway ready (ttl: {:?}, max entries: {}, max bytes: {})",
            config.default_ttl, config.max_entries, config.max_size_bytes
        );

        Self {
            config,
            store: RwLock::new(GatewayStore::default()),
            health: Mutex::new(HealthStatus::Healthy),
        }
    }

    /// Like [`new`](Self::new), rejecting invalid configuration
    pub fn try_new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Override the reported health status
    pub fn set_health(&self, status: HealthStatus) {
        info!("Memory gateway health set to {:?}", status);
        *self.health.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Store a serialized value, replacing any previous value for `key`
    pub async fn insert(&self, key: String, value: String) -> Result<()> {
        let entry = CacheEntry::new(key, value, self.config.ttl_with_jitter());
        let size = entry.metadata.size_bytes;

        if size > self.config.max_size_bytes {
            warn!(
                "Refusing {}: {} bytes exceeds the {} byte limit",
                entry.key, size, self.config.max_size_bytes
            );
            return Err(CacheError::GatewayError(format!(
                "entry of {} bytes exceeds the {} byte limit",
                size, self.config.max_size_bytes
            )));
        }

        let mut store = self.store.write().await;

        if store.take(&entry.key).is_some() {
            debug!("Replacing {}", entry.key);
        }

        while store.slots.len() >= self.config.max_entries
            || store.bytes + size > self.config.max_size_bytes
        {
            let Some(victim) = store.pop_oldest() else {
                break;
            };
            store.stats.evicted += 1;
            debug!("Evicted {} to make room", victim.key);
        }

        debug!("Stored {} ({} bytes)", entry.key, size);
        store.put(entry);
        store.stats.stores += 1;
        Ok(())
    }

    /// Read a serialized value; expired entries are dropped and count as misses
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut store = self.store.write().await;

        let Some(expired) = store.slots.get(key).map(|slot| slot.entry.is_expired()) else {
            store.stats.misses += 1;
            debug!("Miss: {}", key);
            return None;
        };

        if expired {
            store.take(key);
            store.stats.misses += 1;
            store.stats.expired += 1;
            debug!("Expired: {}", key);
            return None;
        }

        if self.config.enable_lru_eviction {
            store.touch(key);
        }

        let value = {
            let slot = store.slots.get_mut(key)?;
            slot.entry.record_read();
            slot.entry.value.clone()
        };
        store.stats.hits += 1;
        debug!("Hit: {}", key);
        Some(value)
    }

    /// Whether `key` is held, expired or not; does not count as a read
    pub async fn contains_key(&self, key: &str) -> bool {
        self.store.read().await.slots.contains_key(key)
    }

    pub async fn remove(&self, key: &str) -> Option<String> {
        let mut store = self.store.write().await;
        let entry = store.take(key)?;
        store.stats.removals += 1;
        debug!("Removed {}", key);
        Some(entry.value)
    }

    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.slots.len();

        store.slots.clear();
        store.order.clear();
        store.bytes = 0;
        store.stats.removals += count as u64;

        info!("Cleared {} entries from memory gateway", count);
    }

    /// Drop every expired entry, returning how many went
    pub async fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut store = self.store.write().await;

        let expired: Vec<String> = store
            .slots
            .values()
            .filter(|slot| slot.entry.is_expired_at(now))
            .map(|slot| slot.entry.key.clone())
            .collect();

        for key in &expired {
            store.take(key);
        }
        store.stats.expired += expired.len() as u64;

        if !expired.is_empty() {
            debug!("Dropped {} expired entries", expired.len());
        }
        expired.len()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.snapshot()
    }

    pub async fn size_bytes(&self) -> usize {
        self.store.read().await.bytes
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.slots.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.slots.is_empty()
    }
}

#[async_trait]
impl CacheGateway for MemoryGateway {
    fn health(&self) -> HealthStatus {
        *self.health.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn get_object(&self, key: &str, return_type: &str) -> Result<Option<serde_json::Value>> {
        let Some(raw) = self.get(key).await else {
            return Ok(None);
        };

        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!("Stored value for {} is not a valid {}: {}", key, return_type, e);
            CacheError::from(e)
        })
    }

    async fn store_string(&self, key: &str, serialized: String) -> Result<()> {
        self.insert(key.to_string(), serialized).await
    }
}

/// Periodically drop expired entries; runs until the task is aborted
pub async fn start_auto_cleanup(gateway: Arc<MemoryGateway>) {
    let period = gateway.config.effective_cleanup_interval();
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately
    ticker.tick().await;

    info!("Gateway cleanup running every {:?}", period);

    loop {
        ticker.tick().await;
        let removed = gateway.cleanup_expired().await;
        if removed > 0 {
            debug!("Auto cleanup removed {} entries", removed);
        }
    }
}
