//! Uniform description of one cacheable call
//!
//! A [`MethodSignature`] is registered once per cacheable method: identity,
//! parameters, return shape and selection policy. A [`CallDescriptor`] pairs
//! that signature with one call's arguments, the action that runs the real
//! method, and the slot its result lands in.

use crate::error::{CacheError, KeyDerivationError, Result};
use crate::key::{
    accumulate, derive_key, short_type_name, ArgValue, CacheKey, CacheSettings, Parameter,
    ParameterMap,
};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Return shape of a method, fixed at registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnShape {
    /// No observable return value
    Void,
    /// Synchronous value
    Value,
    /// Future resolving to nothing
    DeferredVoid,
    /// Future resolving to a value
    DeferredValue,
}

impl ReturnShape {
    pub fn is_deferred(&self) -> bool {
        matches!(self, ReturnShape::DeferredVoid | ReturnShape::DeferredValue)
    }

    /// Whether calls of this shape can be served from the cache
    pub fn is_cacheable(&self) -> bool {
        matches!(self, ReturnShape::Value | ReturnShape::DeferredValue)
    }
}

impl fmt::Display for ReturnShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnShape::Void => write!(f, "void"),
            ReturnShape::Value => write!(f, "value"),
            ReturnShape::DeferredVoid => write!(f, "deferred_void"),
            ReturnShape::DeferredValue => write!(f, "deferred_value"),
        }
    }
}

/// Registration-time description of a cacheable method
#[derive(Debug, Clone)]
pub struct MethodSignature {
    type_name: String,
    method_name: String,
    parameters: Vec<Parameter>,
    parameter_map: ParameterMap,
    return_shape: ReturnShape,
    return_type: &'static str,
    settings: CacheSettings,
}

impl MethodSignature {
    /// Start describing `type_name::method_name`
    ///
    /// # Example
    /// ```
    /// use ouroboros_memo::{CacheSettings, MethodSignature, ReturnShape};
    ///
    /// let signature = MethodSignature::builder("UserService", "GetById")
    ///     .param("id", "i64")
    ///     .returns::<String>()
    ///     .settings(CacheSettings::use_parameter("id"))
    ///     .build();
    ///
    /// assert_eq!(signature.return_shape(), ReturnShape::Value);
    /// assert_eq!(signature.qualified_name(), "UserService.GetById");
    /// ```
    pub fn builder(
        type_name: impl Into<String>,
        method_name: impl Into<String>,
    ) -> MethodSignatureBuilder {
        MethodSignatureBuilder {
            type_name: type_name.into(),
            method_name: method_name.into(),
            parameters: Vec::new(),
            return_shape: ReturnShape::Void,
            return_type: "()",
            settings: CacheSettings::default(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// `Type.Method`, for logs and errors
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.type_name, self.method_name)
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter_map(&self) -> &ParameterMap {
        &self.parameter_map
    }

    pub fn return_shape(&self) -> ReturnShape {
        self.return_shape
    }

    /// Name of the (awaited) return type
    pub fn return_type(&self) -> &'static str {
        self.return_type
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Derive the cache key for a call to this method
    pub fn derive_key(&self, arguments: &[ArgValue]) -> std::result::Result<CacheKey, KeyDerivationError> {
        derive_key(
            &self.type_name,
            &self.method_name,
            arguments,
            &self.settings,
            &self.parameter_map,
        )
    }

    /// Key text before digesting, for diagnostics
    pub fn key_text(&self, arguments: &[ArgValue]) -> std::result::Result<String, KeyDerivationError> {
        accumulate(
            &self.type_name,
            &self.method_name,
            arguments,
            &self.settings,
            &self.parameter_map,
        )
    }
}

/// Builder for [`MethodSignature`]
#[derive(Debug)]
pub struct MethodSignatureBuilder {
    type_name: String,
    method_name: String,
    parameters: Vec<Parameter>,
    return_shape: ReturnShape,
    return_type: &'static str,
    settings: CacheSettings,
}

impl MethodSignatureBuilder {
    /// Declare the next positional parameter
    pub fn param(mut self, name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(name, declared_type));
        self
    }

    /// Declare the next positional parameter, naming its type from `P`
    pub fn param_of<P: ?Sized>(self, name: impl Into<String>) -> Self {
        self.param(name, short_type_name::<P>())
    }

    /// Synchronous method returning `T`
    pub fn returns<T>(mut self) -> Self {
        self.return_shape = ReturnShape::Value;
        self.return_type = std::any::type_name::<T>();
        self
    }

    /// Asynchronous method resolving to `T`
    pub fn returns_deferred<T>(mut self) -> Self {
        self.return_shape = ReturnShape::DeferredValue;
        self.return_type = std::any::type_name::<T>();
        self
    }

    /// Synchronous method with no return value
    pub fn returns_nothing(mut self) -> Self {
        self.return_shape = ReturnShape::Void;
        self.return_type = "()";
        self
    }

    /// Asynchronous method with no return value
    pub fn returns_deferred_nothing(mut self) -> Self {
        self.return_shape = ReturnShape::DeferredVoid;
        self.return_type = "()";
        self
    }

    /// Argument selection policy for key derivation
    pub fn settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Arc<MethodSignature> {
        let parameter_map = ParameterMap::new(&self.parameters);
        Arc::new(MethodSignature {
            type_name: self.type_name,
            method_name: self.method_name,
            parameters: self.parameters,
            parameter_map,
            return_shape: self.return_shape,
            return_type: self.return_type,
            settings: self.settings,
        })
    }
}

/// Future produced by a deferred call
pub type DeferredFuture<T> = BoxFuture<'static, anyhow::Result<T>>;

/// Action that executes the real method, one variant per return shape
pub enum Proceed<T> {
    Void(Box<dyn FnOnce() -> anyhow::Result<()> + Send>),
    Value(Box<dyn FnOnce() -> anyhow::Result<T> + Send>),
    DeferredVoid(Box<dyn FnOnce() -> DeferredFuture<()> + Send>),
    /// The second field tells whether a stored value equals `T::default()`;
    /// such a value is treated as absent when read back for a deferred call
    DeferredValue(Box<dyn FnOnce() -> DeferredFuture<T> + Send>, fn(&T) -> bool),
}

impl<T> Proceed<T> {
    pub fn void<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Proceed::Void(Box::new(f))
    }

    pub fn value<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        Proceed::Value(Box::new(f))
    }

    pub fn deferred_void<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Proceed::DeferredVoid(Box::new(move || f().boxed()))
    }

    pub fn deferred_value<F, Fut>(f: F) -> Self
    where
        T: Default + PartialEq,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Proceed::DeferredValue(Box::new(move || f().boxed()), is_default::<T>)
    }

    /// Return shape this action produces
    pub fn shape(&self) -> ReturnShape {
        match self {
            Proceed::Void(_) => ReturnShape::Void,
            Proceed::Value(_) => ReturnShape::Value,
            Proceed::DeferredVoid(_) => ReturnShape::DeferredVoid,
            Proceed::DeferredValue(..) => ReturnShape::DeferredValue,
        }
    }
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

impl<T> fmt::Debug for Proceed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proceed::{}", self.shape())
    }
}

/// Shared cell that receives a call's result
///
/// Cloning yields another handle to the same cell, so the caller can keep
/// one while the dispatcher (or a detached task) fills it.
pub struct ReturnSlot<T> {
    inner: Arc<Mutex<Option<T>>>,
}

impl<T> ReturnSlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set(&self, value: T) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Move the value out, leaving the slot empty
    pub fn take(&self) -> Option<T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn is_filled(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> ReturnSlot<T> {
    /// Copy of the current value
    pub fn get(&self) -> Option<T> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Clone for ReturnSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for ReturnSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ReturnSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReturnSlot")
            .field("filled", &self.is_filled())
            .finish()
    }
}

/// One call: signature, argument values, proceed action and return slot
#[derive(Debug)]
pub struct CallDescriptor<T> {
    signature: Arc<MethodSignature>,
    arguments: Vec<ArgValue>,
    proceed: Proceed<T>,
    return_slot: ReturnSlot<T>,
}

impl<T> CallDescriptor<T> {
    /// Describe a call; the proceed action must match the registered shape
    pub fn new(
        signature: Arc<MethodSignature>,
        arguments: Vec<ArgValue>,
        proceed: Proceed<T>,
    ) -> Result<Self> {
        if proceed.shape() != signature.return_shape() {
            return Err(CacheError::ShapeMismatch {
                method: signature.qualified_name(),
                registered: signature.return_shape().to_string(),
                supplied: proceed.shape().to_string(),
            });
        }

        Ok(Self {
            signature,
            arguments,
            proceed,
            return_slot: ReturnSlot::new(),
        })
    }

    pub fn signature(&self) -> &Arc<MethodSignature> {
        &self.signature
    }

    pub fn type_name(&self) -> &str {
        self.signature.type_name()
    }

    pub fn method_name(&self) -> &str {
        self.signature.method_name()
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.signature.parameters()
    }

    pub fn arguments(&self) -> &[ArgValue] {
        &self.arguments
    }

    pub fn return_shape(&self) -> ReturnShape {
        self.proceed.shape()
    }

    /// Handle to the cell the result is written to
    pub fn return_slot(&self) -> ReturnSlot<T> {
        self.return_slot.clone()
    }

    pub(crate) fn into_parts(self) -> (Arc<MethodSignature>, Vec<ArgValue>, Proceed<T>, ReturnSlot<T>) {
        (self.signature, self.arguments, self.proceed, self.return_slot)
    }
}
