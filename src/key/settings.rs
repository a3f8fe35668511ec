//! Argument selection policy and parameter metadata

use crate::error::KeyDerivationError;
use serde::{Deserialize, Serialize};

/// Which argument data participates in key derivation
///
/// Fixed per method signature; supplied by configuration rather than
/// derived at call time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "parameter", rename_all = "snake_case")]
pub enum CacheSettings {
    /// Key depends only on type and method name
    IgnoreParameters,

    /// Key includes only the named argument's value
    UseNamedParameter(String),

    /// Key includes every argument according to its shape
    #[default]
    Default,
}

impl CacheSettings {
    /// Shorthand for keying on a parameter called `Id` (matched case-insensitively)
    pub fn use_id() -> Self {
        CacheSettings::UseNamedParameter("Id".to_string())
    }

    /// Key on a specific named parameter
    pub fn use_parameter(name: impl Into<String>) -> Self {
        CacheSettings::UseNamedParameter(name.into())
    }
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub declared_type: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Positional index to declared parameter name, built once per signature
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMap {
    names: Vec<String>,
}

impl ParameterMap {
    /// Build the map from a signature's parameter list
    pub fn new(parameters: &[Parameter]) -> Self {
        Self::from_names(parameters.iter().map(|p| p.name.as_str()))
    }

    /// Build the map from bare parameter names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Resolve a parameter name (case-insensitive) to its position
    ///
    /// Exactly one declared name may match.
    pub fn index_of(&self, name: &str) -> Result<usize, KeyDerivationError> {
        let wanted = name.to_lowercase();
        let mut matches = self
            .names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.to_lowercase() == wanted)
            .map(|(index, _)| index);

        match (matches.next(), matches.next()) {
            (Some(index), None) => Ok(index),
            (None, _) => Err(KeyDerivationError::UnknownParameter {
                name: name.to_string(),
                declared: self.declared(),
            }),
            (Some(_), Some(_)) => Err(KeyDerivationError::AmbiguousParameter {
                name: name.to_string(),
                declared: self.declared(),
            }),
        }
    }

    /// Declared name at a position
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Comma-separated list of declared names, for diagnostics
    pub fn declared(&self) -> String {
        self.names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        assert_eq!(CacheSettings::default(), CacheSettings::Default);
        assert_eq!(
            CacheSettings::use_id(),
            CacheSettings::UseNamedParameter("Id".to_string())
        );
    }

    #[test]
    fn test_settings_serde() {
        let json = serde_json::to_string(&CacheSettings::use_parameter("userId")).unwrap();
        assert_eq!(json, r#"{"mode":"use_named_parameter","parameter":"userId"}"#);

        let parsed: CacheSettings = serde_json::from_str(r#"{"mode":"ignore_parameters"}"#).unwrap();
        assert_eq!(parsed, CacheSettings::IgnoreParameters);
    }

    #[test]
    fn test_parameter_map_lookup() {
        let map = ParameterMap::new(&[
            Parameter::new("tenant", "String"),
            Parameter::new("Id", "i64"),
        ]);

        assert_eq!(map.len(), 2);
        assert_eq!(map.index_of("id"), Ok(1));
        assert_eq!(map.index_of("ID"), Ok(1));
        assert_eq!(map.index_of("Tenant"), Ok(0));
        assert!(matches!(
            map.index_of("missing"),
            Err(KeyDerivationError::UnknownParameter { .. })
        ));
        assert_eq!(map.name_at(0), Some("tenant"));
        assert_eq!(map.declared(), "tenant, Id");
    }

    #[test]
    fn test_empty_parameter_map() {
        let map = ParameterMap::default();
        assert!(map.is_empty());
        assert!(map.index_of("id").is_err());
    }

    #[test]
    fn test_names_differing_only_in_case_are_ambiguous() {
        let map = ParameterMap::from_names(["id", "Id"]);

        match map.index_of("ID") {
            Err(KeyDerivationError::AmbiguousParameter { name, declared }) => {
                assert_eq!(name, "ID");
                assert_eq!(declared, "id, Id");
            }
            other => panic!("expected ambiguous parameter, got {:?}", other),
        }
    }
}
