//! # Ouroboros Memo (ouroboros-memo)
//!
//! Read-through/write-through caching for method calls, placed in front of a
//! pluggable key/value store.
//!
//! ## Features
//!
//! - Deterministic cache keys: base64 SHA-1 over the call's type name,
//!   method name and selected arguments
//! - Three argument selection policies (ignore, one named parameter, all)
//! - Sampling of large lists and maps, truncation at cancellation tokens
//! - Synchronous and deferred (async) calls, with or without return values
//! - Clean bypass when the store is not operational
//! - In-process [`MemoryGateway`] with TTL, jitter and LRU eviction
//!
//! ## Key Derivation
//!
//! ```
//! use ouroboros_memo::{args, derive_key, CacheSettings, ParameterMap};
//!
//! let params = ParameterMap::from_names(["x", "y"]);
//! let key = derive_key("Calculator", "Sum", &args![2, 2], &CacheSettings::Default, &params)?;
//! assert_eq!(key, "Vqzg9UUtXN+Q8OKeTVkR+0LIDqs=");
//! # Ok::<(), ouroboros_memo::KeyDerivationError>(())
//! ```
//!
//! ## Caching a Service
//!
//! ```no_run
//! use ouroboros_memo::{args, CachingInterceptor, GatewayConfig, MemoryGateway, MethodSignature};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = Arc::new(MemoryGateway::new(GatewayConfig::default()));
//!     let interceptor = CachingInterceptor::new(gateway);
//!
//!     let sum = MethodSignature::builder("Calculator", "Sum")
//!         .param("x", "i32")
//!         .param("y", "i32")
//!         .returns::<i32>()
//!         .build();
//!
//!     // First call computes and stores, second is served from the cache
//!     for _ in 0..2 {
//!         let value = interceptor.invoke(&sum, args![2, 2], || Ok(2 + 2)).await?;
//!         println!("2 + 2 = {}", value);
//!     }
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod gateway;
pub mod intercept;
pub mod key;

// Re-export main types for convenience
pub use error::{CacheError, KeyDerivationError, Result};
pub use gateway::{
    CacheGateway, CacheGatewayExt, CacheStats, GatewayConfig, GatewayConfigBuilder, HealthStatus,
    MemoryGateway,
};
pub use intercept::{
    CachingInterceptor, CallDescriptor, DeferredCall, Dispatch, InterceptorConfig,
    KeyFailurePolicy, MethodSignature, Proceed, ReturnShape, ReturnSlot,
};
pub use key::{
    derive_key, derive_key_or_empty, ArgValue, CacheKey, CacheSettings, Parameter, ParameterMap,
    ToArgument,
};
