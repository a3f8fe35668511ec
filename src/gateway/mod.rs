//! # Cache Gateway
//!
//! The key/value store contract the dispatcher consumes: an availability
//! probe, an untyped read, a typed read and a string write. Storage
//! semantics (expiry, eviction, consistency) belong to the implementation.
//!
//! [`MemoryGateway`] is the in-process implementation shipped with the crate.
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_memo::gateway::{CacheGateway, CacheGatewayExt, GatewayConfig, MemoryGateway};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let gateway = MemoryGateway::new(GatewayConfig::default());
//!
//! gateway.store_string("answer", "42".to_string()).await?;
//! let value: Option<i32> = gateway.get_typed("answer").await?;
//! assert_eq!(value, Some(42));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entry;
pub mod memory;
pub mod stats;

pub use config::{GatewayConfig, GatewayConfigBuilder};
pub use entry::{CacheEntry, EntryMetadata};
pub use memory::{start_auto_cleanup, MemoryGateway};
pub use stats::CacheStats;

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Gateway health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Store is reachable and responsive
    Healthy,
    /// Store is reachable but slow
    Degraded,
    /// Store is unreachable or erroring
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy or degraded (operational)
    pub fn is_operational(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }
}

/// Key/value store used by the caching interceptor
#[async_trait]
pub trait CacheGateway: Send + Sync {
    /// Current health of the store
    fn health(&self) -> HealthStatus;

    /// Health probe driving the bypass decision
    fn is_operational(&self) -> bool {
        self.health().is_operational()
    }

    /// Untyped read; `return_type` names the type the caller will decode into
    async fn get_object(&self, key: &str, return_type: &str) -> Result<Option<serde_json::Value>>;

    /// Store an already serialized value
    async fn store_string(&self, key: &str, serialized: String) -> Result<()>;
}

/// Typed reads on top of [`CacheGateway::get_object`]
#[async_trait]
pub trait CacheGatewayExt: CacheGateway {
    /// Read and decode a value; a stored JSON `null` counts as absent
    async fn get_typed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send;
}

#[async_trait]
impl<G: CacheGateway + ?Sized> CacheGatewayExt for G {
    async fn get_typed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_object(key, std::any::type_name::<T>()).await? {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }
}
