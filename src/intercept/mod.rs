//! # Call Interception
//!
//! Explicit decorators describe each call with a [`CallDescriptor`] and hand
//! it to a [`CachingInterceptor`], which decides between bypass,
//! read-through/write-through, and detached execution.
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_memo::gateway::{GatewayConfig, MemoryGateway};
//! use ouroboros_memo::intercept::{CachingInterceptor, MethodSignature};
//! use ouroboros_memo::args;
//! use std::sync::Arc;
//!
//! # async fn example() -> ouroboros_memo::Result<()> {
//! let gateway = Arc::new(MemoryGateway::new(GatewayConfig::default()));
//! let interceptor = CachingInterceptor::new(gateway);
//!
//! let sum = MethodSignature::builder("Calculator", "Sum")
//!     .param("x", "i32")
//!     .param("y", "i32")
//!     .returns::<i32>()
//!     .build();
//!
//! let (x, y) = (2, 2);
//! let value = interceptor.invoke(&sum, args![x, y], move || Ok(x + y)).await?;
//! assert_eq!(value, 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod descriptor;
pub mod dispatcher;

pub use config::{InterceptorConfig, InterceptorConfigBuilder, KeyFailurePolicy};
pub use descriptor::{
    CallDescriptor, DeferredFuture, MethodSignature, MethodSignatureBuilder, Proceed,
    ReturnShape, ReturnSlot,
};
pub use dispatcher::{CachingInterceptor, DeferredCall, Dispatch};
