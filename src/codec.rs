//! Serialization of cached return values (JSON text)

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Serialize a return value for storage
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Deserialize a stored value
pub fn deserialize<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

/// Decode an untyped gateway value into the caller's return type
pub fn from_object<T: DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}
