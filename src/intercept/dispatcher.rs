//! The caching interceptor
//!
//! Routes each [`CallDescriptor`] down one of four paths: bypass when the
//! gateway is down or interception is disabled, straight-through for void
//! calls, inline read/write-through for synchronous values, and a detached
//! task for deferred calls.

use crate::codec;
use crate::error::{CacheError, Result};
use crate::gateway::{CacheGateway, CacheGatewayExt};
use crate::intercept::config::{InterceptorConfig, KeyFailurePolicy};
use crate::intercept::descriptor::{
    CallDescriptor, DeferredFuture, MethodSignature, Proceed, ReturnSlot,
};
use crate::key::{ArgValue, CacheKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a call was handled
#[derive(Debug)]
pub enum Dispatch {
    /// Gateway not operational or interception disabled; the call ran uncached
    Bypassed,
    /// The call ran without cache I/O (void shape, or no usable key)
    Uncached,
    /// Served from the cache; the real method did not run
    Hit { key: CacheKey },
    /// Computed and written back
    Stored { key: CacheKey },
    /// Computed, but the write-back failed
    Computed { key: CacheKey },
    /// Deferred call running in a detached task
    Detached(JoinHandle<()>),
}

impl Dispatch {
    /// Key used for the call, when one was derived inline
    pub fn key(&self) -> Option<&str> {
        match self {
            Dispatch::Hit { key } | Dispatch::Stored { key } | Dispatch::Computed { key } => {
                Some(key.as_str())
            }
            _ => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Dispatch::Hit { .. })
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Dispatch::Detached(_))
    }
}

/// Handle on a deferred call started through [`CachingInterceptor::invoke_deferred`]
#[derive(Debug)]
pub struct DeferredCall<T> {
    handle: Option<JoinHandle<()>>,
    slot: ReturnSlot<T>,
}

impl<T> DeferredCall<T> {
    /// Slot the result lands in once the detached task finishes
    pub fn slot(&self) -> ReturnSlot<T> {
        self.slot.clone()
    }

    pub fn is_detached(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the detached task and take its result
    ///
    /// `None` means the call failed; the failure was only logged.
    pub async fn wait(self) -> Option<T> {
        if let Some(handle) = self.handle {
            if let Err(e) = handle.await {
                warn!("Deferred call task did not complete: {}", e);
            }
        }
        self.slot.take()
    }
}

/// Read-through/write-through cache in front of arbitrary method calls
pub struct CachingInterceptor {
    gateway: Arc<dyn CacheGateway>,
    config: InterceptorConfig,
}

impl CachingInterceptor {
    pub fn new(gateway: Arc<dyn CacheGateway>) -> Self {
        Self::with_config(gateway, InterceptorConfig::default())
    }

    pub fn with_config(gateway: Arc<dyn CacheGateway>, config: InterceptorConfig) -> Self {
        info!(
            "Caching interceptor created (enabled: {}, key failure: {})",
            config.enabled, config.key_failure
        );
        Self { gateway, config }
    }

    pub fn gateway(&self) -> &Arc<dyn CacheGateway> {
        &self.gateway
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Whether calls currently go through the cache
    pub fn is_active(&self) -> bool {
        self.config.enabled && self.gateway.is_operational()
    }

    /// Handle one call
    ///
    /// Synchronous shapes complete before this returns and their result is in
    /// the call's return slot. Deferred shapes return
    /// [`Dispatch::Detached`] at once; a failure inside the detached task is
    /// logged and leaves the slot empty.
    pub async fn handle<T>(&self, call: CallDescriptor<T>) -> Result<Dispatch>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let (signature, arguments, proceed, slot) = call.into_parts();

        if !self.is_active() {
            debug!("Cache unavailable, calling {} directly", signature.qualified_name());
            run_direct(&signature, proceed, &slot).await?;
            return Ok(Dispatch::Bypassed);
        }

        match proceed {
            Proceed::Void(f) => {
                f().map_err(|e| call_failed(&signature, e))?;
                Ok(Dispatch::Uncached)
            }
            Proceed::Value(f) => self.intercept_value(&signature, &arguments, f, &slot).await,
            Proceed::DeferredVoid(f) => Ok(Dispatch::Detached(spawn_deferred_void(&signature, f))),
            Proceed::DeferredValue(f, is_default) => Ok(Dispatch::Detached(
                self.spawn_deferred_value(signature, arguments, f, is_default, slot),
            )),
        }
    }

    /// Run a synchronous value call through the cache and return its result
    pub async fn invoke<T, F>(
        &self,
        signature: &Arc<MethodSignature>,
        arguments: Vec<ArgValue>,
        f: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let call = CallDescriptor::new(Arc::clone(signature), arguments, Proceed::value(f))?;
        let slot = call.return_slot();

        self.handle(call).await?;
        slot.take().ok_or_else(|| CacheError::EmptyReturnSlot {
            method: signature.qualified_name(),
        })
    }

    /// Run a synchronous void call (never cached)
    pub async fn invoke_void<F>(
        &self,
        signature: &Arc<MethodSignature>,
        arguments: Vec<ArgValue>,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let call = CallDescriptor::<()>::new(Arc::clone(signature), arguments, Proceed::void(f))?;
        self.handle(call).await.map(|_| ())
    }

    /// Start a deferred value call
    ///
    /// When the cache is bypassed the call is awaited here and its error is
    /// returned; otherwise it runs detached. A stored `T::default()` does
    /// not count as a hit.
    pub async fn invoke_deferred<T, F, Fut>(
        &self,
        signature: &Arc<MethodSignature>,
        arguments: Vec<ArgValue>,
        f: F,
    ) -> Result<DeferredCall<T>>
    where
        T: Serialize + DeserializeOwned + Default + PartialEq + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let call = CallDescriptor::new(Arc::clone(signature), arguments, Proceed::deferred_value(f))?;
        let slot = call.return_slot();

        let handle = match self.handle(call).await? {
            Dispatch::Detached(handle) => Some(handle),
            _ => None,
        };
        Ok(DeferredCall { handle, slot })
    }

    async fn intercept_value<T>(
        &self,
        signature: &MethodSignature,
        arguments: &[ArgValue],
        proceed: Box<dyn FnOnce() -> anyhow::Result<T> + Send>,
        slot: &ReturnSlot<T>,
    ) -> Result<Dispatch>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let Some(key) = resolve_key(signature, arguments, self.config.key_failure) else {
            slot.set(proceed().map_err(|e| call_failed(signature, e))?);
            return Ok(Dispatch::Uncached);
        };

        match self.gateway.get_object(&key, signature.return_type()).await {
            Ok(Some(stored)) if !stored.is_null() => match codec::from_object::<T>(stored) {
                Ok(value) => {
                    debug!("Cache hit for {}: {}", signature.qualified_name(), key);
                    slot.set(value);
                    return Ok(Dispatch::Hit { key });
                }
                Err(e) => warn!("Discarding undecodable cached value {}: {}", key, e),
            },
            Ok(_) => debug!("Cache miss for {}: {}", signature.qualified_name(), key),
            Err(e) => warn!("Cache read failed for {}: {}", key, e),
        }

        let value = proceed().map_err(|e| call_failed(signature, e))?;
        let stored = match encode(&key, &value) {
            Some(serialized) => write_back(self.gateway.as_ref(), &key, serialized).await,
            None => false,
        };
        slot.set(value);

        Ok(if stored {
            Dispatch::Stored { key }
        } else {
            Dispatch::Computed { key }
        })
    }

    fn spawn_deferred_value<T>(
        &self,
        signature: Arc<MethodSignature>,
        arguments: Vec<ArgValue>,
        proceed: Box<dyn FnOnce() -> DeferredFuture<T> + Send>,
        is_default: fn(&T) -> bool,
        slot: ReturnSlot<T>,
    ) -> JoinHandle<()>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let gateway = Arc::clone(&self.gateway);
        let key_failure = self.config.key_failure;
        let span = deferred_span(&signature);

        tokio::spawn(
            async move {
                let key = resolve_key(&signature, &arguments, key_failure);

                if let Some(key) = &key {
                    match gateway.get_typed::<T>(key).await {
                        Ok(Some(value)) if is_default(&value) => debug!(
                            "Cached default for {} treated as a miss: {}",
                            signature.qualified_name(),
                            key
                        ),
                        Ok(Some(value)) => {
                            debug!("Cache hit for {}: {}", signature.qualified_name(), key);
                            slot.set(value);
                            return;
                        }
                        Ok(None) => debug!("Cache miss for {}: {}", signature.qualified_name(), key),
                        Err(e) => warn!("Cache read failed for {}: {}", key, e),
                    }
                }

                let value = match proceed().await {
                    Ok(value) => value,
                    Err(e) => {
                        error!("Operation {} threw: {:#}", signature.method_name(), e);
                        return;
                    }
                };

                if let Some(key) = &key {
                    if let Some(serialized) = encode(key, &value) {
                        write_back(gateway.as_ref(), key, serialized).await;
                    }
                }
                slot.set(value);
            }
            .instrument(span),
        )
    }
}

fn spawn_deferred_void(
    signature: &MethodSignature,
    proceed: Box<dyn FnOnce() -> DeferredFuture<()> + Send>,
) -> JoinHandle<()> {
    let method = signature.method_name().to_string();
    let span = deferred_span(signature);

    tokio::spawn(
        async move {
            if let Err(e) = proceed().await {
                error!("Operation {} threw: {:#}", method, e);
            }
        }
        .instrument(span),
    )
}

fn deferred_span(signature: &MethodSignature) -> tracing::Span {
    info_span!(
        "deferred_call",
        call_id = %Uuid::new_v4(),
        method = %signature.qualified_name()
    )
}

/// Run the call exactly as it would run without the cache
async fn run_direct<T>(
    signature: &MethodSignature,
    proceed: Proceed<T>,
    slot: &ReturnSlot<T>,
) -> Result<()> {
    match proceed {
        Proceed::Void(f) => f().map_err(|e| call_failed(signature, e)),
        Proceed::Value(f) => {
            slot.set(f().map_err(|e| call_failed(signature, e))?);
            Ok(())
        }
        Proceed::DeferredVoid(f) => f().await.map_err(|e| call_failed(signature, e)),
        Proceed::DeferredValue(f, _) => {
            slot.set(f().await.map_err(|e| call_failed(signature, e))?);
            Ok(())
        }
    }
}

fn resolve_key(
    signature: &MethodSignature,
    arguments: &[ArgValue],
    policy: KeyFailurePolicy,
) -> Option<CacheKey> {
    match signature.derive_key(arguments) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(
                failure = "KeyDerivationFailed",
                method = %signature.qualified_name(),
                policy = %policy,
                "Key derivation failed: {}",
                e
            );
            match policy {
                KeyFailurePolicy::Bypass => None,
                KeyFailurePolicy::EmptyKey => Some(CacheKey::new()),
            }
        }
    }
}

/// Serialize a result for storage; failures are logged and yield `None`
fn encode<T: Serialize>(key: &str, value: &T) -> Option<String> {
    match codec::serialize(value) {
        Ok(serialized) => Some(serialized),
        Err(e) => {
            warn!("Failed to serialize result for {}: {}", key, e);
            None
        }
    }
}

/// Store a serialized result; failures are logged and reported as `false`
async fn write_back(gateway: &dyn CacheGateway, key: &str, serialized: String) -> bool {
    match gateway.store_string(key, serialized).await {
        Ok(()) => {
            debug!("Stored result under {}", key);
            true
        }
        Err(e) => {
            warn!("Cache write failed for {}: {}", key, e);
            false
        }
    }
}

fn call_failed(signature: &MethodSignature, e: anyhow::Error) -> CacheError {
    error!("Operation {} threw: {:#}", signature.method_name(), e);
    CacheError::call_failed(signature.method_name(), e)
}
