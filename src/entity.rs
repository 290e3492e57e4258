// ABOUTME: Catalog entity reference parsing and formatting
// ABOUTME: Validates the kind:namespace/name triple carried in session token claims
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Entity References
//!
//! Session tokens carry catalog entity references in their `sub` and `ent`
//! claims. Only parsing and formatting live here; resolving a reference to an
//! actual catalog entity is the sign-in resolver's job.

use crate::errors::{GatewayError, GatewayResult};
use std::fmt;

/// Default namespace applied when a reference omits one
pub const DEFAULT_NAMESPACE: &str = "default";

/// A parsed `kind:namespace/name` entity reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    kind: String,
    namespace: String,
    name: String,
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl EntityRef {
    /// Build a reference from its parts
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Input`] if any segment is empty or contains
    /// characters outside `[a-zA-Z0-9_.-]`.
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> GatewayResult<Self> {
        let kind = kind.into().to_lowercase();
        let namespace = namespace.into().to_lowercase();
        let name = name.into().to_lowercase();
        for (label, segment) in [("kind", &kind), ("namespace", &namespace), ("name", &name)] {
            if !valid_segment(segment) {
                return Err(GatewayError::input(format!(
                    "invalid entity reference {label}: {segment:?}"
                )));
            }
        }
        Ok(Self {
            kind,
            namespace,
            name,
        })
    }

    /// Parse a `kind:namespace/name` string; the namespace may be omitted and
    /// defaults to [`DEFAULT_NAMESPACE`]
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Input`] if the kind is missing or any segment
    /// is invalid.
    pub fn parse(value: &str) -> GatewayResult<Self> {
        let (kind, rest) = value.split_once(':').ok_or_else(|| {
            GatewayError::input(format!("entity reference {value:?} is missing a kind"))
        })?;
        let (namespace, name) = rest
            .split_once('/')
            .map_or((DEFAULT_NAMESPACE, rest), |(ns, n)| (ns, n));
        Self::new(kind, namespace, name)
    }

    /// Entity kind, lowercased
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Entity namespace, lowercased
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Entity name, lowercased
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.namespace, self.name)
    }
}

impl std::str::FromStr for EntityRef {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_reference() {
        let entity = EntityRef::parse("user:default/alice").unwrap();
        assert_eq!(entity.kind(), "user");
        assert_eq!(entity.namespace(), "default");
        assert_eq!(entity.name(), "alice");
        assert_eq!(entity.to_string(), "user:default/alice");
    }

    #[test]
    fn test_parse_defaults_namespace() {
        let entity = EntityRef::parse("group:team-a").unwrap();
        assert_eq!(entity.to_string(), "group:default/team-a");
    }

    #[test]
    fn test_parse_lowercases() {
        let entity = EntityRef::parse("User:Default/Alice").unwrap();
        assert_eq!(entity.to_string(), "user:default/alice");
    }

    #[test]
    fn test_parse_rejects_missing_kind() {
        assert!(EntityRef::parse("default/alice").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_characters() {
        assert!(EntityRef::parse("user:default/al ice").is_err());
        assert!(EntityRef::parse("user:default/").is_err());
        assert!(EntityRef::parse(":default/alice").is_err());
    }
}
