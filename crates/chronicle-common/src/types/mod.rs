//! Common types used across Chronicle

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{ChronicleError, Result};

/// Attribute name to value mapping captured from an audited entity.
///
/// A `BTreeMap` keeps serialized `old_values` / `new_values` stable across runs.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Pattern accepted for table and column names interpolated into SQL.
pub const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,62}$";

// ============================================================================
// Subject Identifiers
// ============================================================================

/// Identifier scheme used by the polymorphic `subject_id` column.
///
/// `String` is the recommended scheme: it stores integer, UUID and opaque
/// identifiers alike. The narrower schemes reject raw ids that do not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MorphKeyType {
    #[default]
    String,
    Integer,
    Uuid,
}

impl MorphKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Uuid => "uuid",
        }
    }
}

impl std::str::FromStr for MorphKeyType {
    type Err = ChronicleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "string" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "uuid" => Ok(Self::Uuid),
            other => Err(ChronicleError::config(format!("unknown morph key type: {other}"))),
        }
    }
}

impl std::fmt::Display for MorphKeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an audited entity within its subject type.
///
/// Ids are stored as text, so `Integer(7)` and `Key("7")` share a storage
/// key. Each subject type uses a single key scheme (`MorphKeyType`), which
/// keeps its ids distinct in the audit table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubjectId {
    Integer(i64),
    Uuid(Uuid),
    Key(String),
}

impl SubjectId {
    /// Parse a raw identifier according to the configured key scheme.
    pub fn parse(raw: &str, key_type: MorphKeyType) -> Result<Self> {
        let raw = raw.trim();
        match key_type {
            MorphKeyType::Integer => raw.parse::<i64>().map(Self::Integer).map_err(|_| {
                ChronicleError::InvalidSubjectId {
                    expected: "integer",
                    raw: raw.to_string(),
                }
            }),
            MorphKeyType::Uuid => Uuid::parse_str(raw).map(Self::Uuid).map_err(|_| {
                ChronicleError::InvalidSubjectId {
                    expected: "uuid",
                    raw: raw.to_string(),
                }
            }),
            MorphKeyType::String => {
                if raw.is_empty() {
                    return Err(ChronicleError::InvalidSubjectId {
                        expected: "string",
                        raw: raw.to_string(),
                    });
                }
                Ok(Self::Key(raw.to_string()))
            },
        }
    }

    /// Text form persisted in the `subject_id` column.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for SubjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Uuid(id) => write!(f, "{}", id.hyphenated()),
            Self::Key(key) => f.write_str(key),
        }
    }
}

impl From<i64> for SubjectId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<Uuid> for SubjectId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<&str> for SubjectId {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

// ============================================================================
// SQL Identifiers
// ============================================================================

/// Check that a configured table or column name is safe to interpolate.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let pattern = Regex::new(IDENTIFIER_PATTERN)
        .map_err(|e| ChronicleError::config(format!("identifier pattern: {e}")))?;

    if pattern.is_match(name) {
        Ok(name)
    } else {
        Err(ChronicleError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate and double-quote an identifier for Postgres.
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name).map(|name| format!("\"{name}\""))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_subject_id_parse_by_scheme() {
        assert_eq!(
            SubjectId::parse("42", MorphKeyType::Integer).unwrap(),
            SubjectId::Integer(42)
        );
        assert_eq!(
            SubjectId::parse("42", MorphKeyType::String).unwrap(),
            SubjectId::Key("42".to_string())
        );

        let id = Uuid::new_v4();
        assert_eq!(
            SubjectId::parse(&id.to_string(), MorphKeyType::Uuid).unwrap(),
            SubjectId::Uuid(id)
        );
    }

    #[test]
    fn test_subject_id_parse_rejects_mismatched_scheme() {
        assert!(matches!(
            SubjectId::parse("abc", MorphKeyType::Integer),
            Err(ChronicleError::InvalidSubjectId { expected: "integer", .. })
        ));
        assert!(SubjectId::parse("12", MorphKeyType::Uuid).is_err());
        assert!(SubjectId::parse("  ", MorphKeyType::String).is_err());
    }

    #[test]
    fn test_storage_key_matches_display() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(SubjectId::from(id).storage_key(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert_eq!(SubjectId::from(7).storage_key(), "7");
        assert_eq!(SubjectId::from("01HZX").storage_key(), "01HZX");
    }

    #[test]
    fn test_storage_key_is_shared_across_variants() {
        assert_eq!(SubjectId::from(7).storage_key(), SubjectId::from("7").storage_key());
        assert_ne!(SubjectId::from(7), SubjectId::from("7"));
    }

    #[test]
    fn test_morph_key_type_from_str() {
        assert_eq!("STRING".parse::<MorphKeyType>().unwrap(), MorphKeyType::String);
        assert_eq!("int".parse::<MorphKeyType>().unwrap(), MorphKeyType::Integer);
        assert_eq!("uuid".parse::<MorphKeyType>().unwrap(), MorphKeyType::Uuid);
        assert!("ulid".parse::<MorphKeyType>().is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("model_audits").is_ok());
        assert!(validate_identifier("_private1").is_ok());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("users; DROP TABLE x").is_err());
        assert!(validate_identifier("").is_err());
        assert_eq!(quote_identifier("audit_id").unwrap(), "\"audit_id\"");
    }

    proptest! {
        #[test]
        fn prop_integer_ids_round_trip(id in any::<i64>()) {
            let parsed = SubjectId::parse(&SubjectId::Integer(id).storage_key(), MorphKeyType::Integer).unwrap();
            prop_assert_eq!(parsed, SubjectId::Integer(id));
        }

        #[test]
        fn prop_quoted_identifiers_never_contain_quotes(name in "[A-Za-z_][A-Za-z0-9_]{0,20}") {
            let quoted = quote_identifier(&name).unwrap();
            prop_assert_eq!(quoted.matches('"').count(), 2);
        }
    }
}
