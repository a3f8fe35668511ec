//! Deterministic cache key derivation
//!
//! A key is the base64 encoding of the SHA-1 digest of an accumulator text
//! built from the type name, the method name and the selected arguments.
//! Every derivation owns its accumulator, so concurrent derivations never
//! share key text.

use crate::error::KeyDerivationError;
use crate::key::argument::ArgValue;
use crate::key::settings::{CacheSettings, ParameterMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};

/// Cache key type - base64 text of a 160-bit digest
pub type CacheKey = String;

/// Collections longer than this are sampled
pub const SAMPLING_THRESHOLD: usize = 5;

/// Number of leading elements of a collection that contribute to a key.
///
/// Collections of more than five elements contribute only
/// `ceil(count / 10)` elements; calls whose large collection arguments
/// differ beyond that prefix share a key.
pub fn sample_len(count: usize) -> usize {
    if count > SAMPLING_THRESHOLD {
        count.div_ceil(10)
    } else {
        count
    }
}

/// Per-derivation key text buffer
#[derive(Debug, Default)]
pub struct KeyAccumulator {
    text: String,
}

impl KeyAccumulator {
    /// Seed the accumulator with the call identity; blank names are skipped
    pub fn new(type_name: &str, method_name: &str) -> Self {
        let mut text = String::with_capacity(type_name.len() + method_name.len() + 32);
        if !type_name.trim().is_empty() {
            text.push_str(type_name);
        }
        if !method_name.trim().is_empty() {
            text.push_str(method_name);
        }
        Self { text }
    }

    /// Append the argument contribution selected by `settings`
    pub fn apply(
        &mut self,
        settings: &CacheSettings,
        arguments: &[ArgValue],
        parameters: &ParameterMap,
    ) -> Result<(), KeyDerivationError> {
        match settings {
            CacheSettings::IgnoreParameters => Ok(()),
            CacheSettings::UseNamedParameter(name) => {
                self.push_named(name, arguments, parameters)
            }
            CacheSettings::Default => {
                self.push_arguments(arguments);
                Ok(())
            }
        }
    }

    fn push_named(
        &mut self,
        name: &str,
        arguments: &[ArgValue],
        parameters: &ParameterMap,
    ) -> Result<(), KeyDerivationError> {
        let index = parameters.index_of(name)?;

        let value = arguments
            .get(index)
            .ok_or(KeyDerivationError::MissingArgument {
                index,
                available: arguments.len(),
            })?;

        // Null renders as "Null"
        self.text.push_str(&value.to_string());
        Ok(())
    }

    fn push_arguments(&mut self, arguments: &[ArgValue]) {
        for (index, value) in arguments.iter().enumerate() {
            match value {
                ArgValue::Scalar(s) => {
                    self.text.push_str(&format!("{}:{}:{}_", index, s, s));
                }
                // Nothing after a cancellation token contributes.
                ArgValue::Cancellation => return,
                ArgValue::List(items) => {
                    self.text.push_str(&format!("{}_", index));
                    for item in items.iter().take(sample_len(items.len())) {
                        self.text.push_str(&format!("{}_", item));
                    }
                }
                ArgValue::Map {
                    key_type,
                    value_type,
                    entries,
                } => {
                    self.text.push_str(&format!("{}_", index));
                    self.text.push_str(&format!("{}_{}", key_type, value_type));
                    for (k, v) in entries.iter().take(sample_len(entries.len())) {
                        self.text.push_str(&format!("{}:{}", k, v));
                    }
                }
                ArgValue::Sequence(items) => {
                    self.text.push_str(&format!("{}_", index));
                    for item in items {
                        self.text.push_str(&format!("{}   ", item));
                    }
                }
                ArgValue::Text(s) => {
                    self.text.push_str(&format!("{}:{}", index, s));
                }
                ArgValue::Opaque(hash) => {
                    self.text.push_str(&format!("{}:{}", index, hash));
                }
                ArgValue::Null => {
                    self.text.push_str(&format!("{}:Null", index));
                }
            }
        }
    }

    /// Accumulated key text so far
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the accumulator, returning the raw key text
    pub fn into_text(self) -> String {
        self.text
    }

    /// Consume the accumulator, returning the digested key
    pub fn finish(self) -> CacheKey {
        digest(&self.text)
    }
}

/// Base64 (standard, padded) of the SHA-1 digest of the UTF-8 text
pub fn digest(text: &str) -> CacheKey {
    let hash = Sha1::digest(text.as_bytes());
    STANDARD.encode(hash)
}

/// Build the accumulator text for a call without digesting it
pub fn accumulate(
    type_name: &str,
    method_name: &str,
    arguments: &[ArgValue],
    settings: &CacheSettings,
    parameters: &ParameterMap,
) -> Result<String, KeyDerivationError> {
    let mut acc = KeyAccumulator::new(type_name, method_name);
    acc.apply(settings, arguments, parameters)?;
    Ok(acc.into_text())
}

/// Derive the cache key for a call
///
/// # Example
/// ```
/// use ouroboros_memo::{args, derive_key, CacheSettings, ParameterMap};
///
/// let params = ParameterMap::from_names(["x", "y"]);
/// let key = derive_key("Calculator", "Sum", &args![2, 2], &CacheSettings::Default, &params)?;
/// assert_eq!(key, "Vqzg9UUtXN+Q8OKeTVkR+0LIDqs=");
/// # Ok::<(), ouroboros_memo::KeyDerivationError>(())
/// ```
pub fn derive_key(
    type_name: &str,
    method_name: &str,
    arguments: &[ArgValue],
    settings: &CacheSettings,
    parameters: &ParameterMap,
) -> Result<CacheKey, KeyDerivationError> {
    let mut acc = KeyAccumulator::new(type_name, method_name);
    acc.apply(settings, arguments, parameters)?;
    Ok(acc.finish())
}

/// Fail-open variant of [`derive_key`]: any derivation fault yields the
/// empty string. Every failing call then shares the same key.
pub fn derive_key_or_empty(
    type_name: &str,
    method_name: &str,
    arguments: &[ArgValue],
    settings: &CacheSettings,
    parameters: &ParameterMap,
) -> CacheKey {
    derive_key(type_name, method_name, arguments, settings, parameters).unwrap_or_default()
}
