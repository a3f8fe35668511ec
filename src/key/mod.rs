//! # Key Derivation
//!
//! Turns a call's identity (type name, method name) and its arguments into a
//! stable, opaque cache key.
//!
//! ## Selection policies
//!
//! - `IgnoreParameters`: the key depends only on type and method name
//! - `UseNamedParameter(name)`: the key includes one argument, found by
//!   case-insensitive parameter name
//! - `Default`: every argument contributes according to its shape, with
//!   large lists and maps sampled and a cancellation token ending the
//!   contribution
//!
//! ## Example
//!
//! ```rust
//! use ouroboros_memo::key::{accumulate, digest, CacheSettings, ParameterMap};
//! use ouroboros_memo::args;
//!
//! let params = ParameterMap::from_names(["id"]);
//! let text = accumulate(
//!     "UserService",
//!     "GetById",
//!     &args![42],
//!     &CacheSettings::use_parameter("id"),
//!     &params,
//! )?;
//! assert_eq!(text, "UserServiceGetById42");
//! assert_eq!(digest(&text), "i5LMmuu4DYnD+GY6aot2TunEXNE=");
//! # Ok::<(), ouroboros_memo::KeyDerivationError>(())
//! ```

pub mod argument;
pub mod generator;
pub mod settings;

pub use argument::{short_type_name, ArgValue, Scalar, ToArgument};
pub use generator::{
    accumulate, derive_key, derive_key_or_empty, digest, sample_len, CacheKey, KeyAccumulator,
    SAMPLING_THRESHOLD,
};
pub use settings::{CacheSettings, Parameter, ParameterMap};
