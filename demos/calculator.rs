//! Calculator Demo Application
//!
//! A calculator service wrapped by a caching decorator. The first call of
//! each operation runs the real method and stores the result; repeated calls
//! are served from the in-process gateway.
//!
//! Usage:
//!   cargo run --example calculator
//!
//! Environment variables:
//!   RUST_LOG           - log filter (default: info)
//!   MEMO_CACHE_ENABLED - set to false to bypass the cache
//!   MEMO_KEY_FAILURE   - bypass | empty-key

use ouroboros_memo::{
    args, CachingInterceptor, GatewayConfig, InterceptorConfig, MemoryGateway, MethodSignature,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// The service being cached
#[derive(Clone, Copy)]
struct Calculator;

impl Calculator {
    fn sum(&self, x: i32, y: i32) -> anyhow::Result<i32> {
        info!("Calculator::sum running for {} + {}", x, y);
        x.checked_add(y)
            .ok_or_else(|| anyhow::anyhow!("{} + {} overflows", x, y))
    }

    async fn sum_async(&self, x: f64, y: f64) -> anyhow::Result<f64> {
        info!("Calculator::sum_async running for {} + {}", x, y);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(x + y)
    }
}

/// Caching decorator: same operations, each routed through the interceptor
struct CachedCalculator {
    inner: Calculator,
    interceptor: CachingInterceptor,
    sum: Arc<MethodSignature>,
    sum_async: Arc<MethodSignature>,
}

impl CachedCalculator {
    fn new(inner: Calculator, interceptor: CachingInterceptor) -> Self {
        Self {
            inner,
            interceptor,
            sum: MethodSignature::builder("Calculator", "Sum")
                .param_of::<i32>("x")
                .param_of::<i32>("y")
                .returns::<i32>()
                .build(),
            sum_async: MethodSignature::builder("Calculator", "Sum")
                .param_of::<f64>("x")
                .param_of::<f64>("y")
                .returns_deferred::<f64>()
                .build(),
        }
    }

    async fn sum(&self, x: i32, y: i32) -> ouroboros_memo::Result<i32> {
        let inner = self.inner;
        self.interceptor
            .invoke(&self.sum, args![x, y], move || inner.sum(x, y))
            .await
    }

    async fn sum_async(&self, x: f64, y: f64) -> ouroboros_memo::Result<Option<f64>> {
        let inner = self.inner;
        let call = self
            .interceptor
            .invoke_deferred(&self.sum_async, args![x, y], move || async move {
                inner.sum_async(x, y).await
            })
            .await?;
        Ok(call.wait().await)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("=== Cached Calculator Demo ===");

    let gateway = Arc::new(MemoryGateway::try_new(GatewayConfig::small())?);
    let interceptor = CachingInterceptor::with_config(gateway.clone(), InterceptorConfig::from_env()?);
    let calculator = CachedCalculator::new(Calculator, interceptor);

    info!("\n--- Synchronous Sum ---");
    for _ in 0..2 {
        let value = calculator.sum(2, 2).await?;
        info!("Sum(2, 2) = {}", value);
    }

    info!("\n--- Deferred Sum ---");
    for _ in 0..2 {
        match calculator.sum_async(2.5, 4.0).await? {
            Some(value) => info!("Sum(2.5, 4.0) = {}", value),
            None => info!("Sum(2.5, 4.0) failed; see the log above"),
        }
    }

    info!("\n--- Failing Call ---");
    match calculator.sum(i32::MAX, 1).await {
        Ok(value) => info!("Sum(MAX, 1) = {}", value),
        Err(e) => info!("✗ {}", e),
    }

    let stats = gateway.stats().await;
    info!("\n--- Gateway Statistics ---");
    info!("{}", stats);

    Ok(())
}
