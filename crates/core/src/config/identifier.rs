//! SQL identifier validation
//!
//! Values are always bound as query parameters, but identifiers (the ledger
//! table name, the database name in `CREATE DATABASE`) cannot be. They are
//! validated once here, when configuration is loaded, and only the validated
//! forms are ever interpolated into SQL text.

use regex::Regex;
use std::fmt;

use super::validation::{ConfigError, ConfigResult, ConfigValidator};

/// PostgreSQL truncates identifiers longer than this many bytes
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Validator for plain (unquoted) SQL identifiers
pub struct IdentifierValidator {
    pub max_length: usize,
}

impl Default for IdentifierValidator {
    fn default() -> Self {
        Self {
            max_length: MAX_IDENTIFIER_LENGTH,
        }
    }
}

impl ConfigValidator<str> for IdentifierValidator {
    fn validate(&self, field: &str, value: &str) -> ConfigResult<()> {
        let pattern = Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| ConfigError::validation_failed(e.to_string()))?;

        if value.is_empty() || value.len() > self.max_length || !pattern.is_match(value) {
            return Err(ConfigError::invalid_value(
                field,
                value,
                format!(
                    "identifier of at most {} characters using letters, digits and underscores, not starting with a digit",
                    self.max_length
                ),
            ));
        }
        Ok(())
    }
}

/// A validated SQL identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `value` as an identifier for the setting named `field`
    pub fn parse(field: &str, value: &str) -> ConfigResult<Self> {
        let value = value.trim();
        IdentifierValidator::default().validate(field, value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier in double quotes, preserving case
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger table name, optionally schema qualified (`schema.table`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName {
    schema: Option<Identifier>,
    name: Identifier,
}

impl TableName {
    pub fn parse(field: &str, value: &str) -> ConfigResult<Self> {
        let value = value.trim();
        match value.split_once('.') {
            Some((schema, name)) => Ok(Self {
                schema: Some(Identifier::parse(field, schema)?),
                name: Identifier::parse(field, name)?,
            }),
            None => Ok(Self {
                schema: None,
                name: Identifier::parse(field, value)?,
            }),
        }
    }

    pub fn schema(&self) -> Option<&Identifier> {
        self.schema.as_ref()
    }

    pub fn name(&self) -> &Identifier {
        &self.name
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_and_qualified_names() {
        let table = TableName::parse("DB_MIGRATION_TABLE", "migration_log").unwrap();
        assert_eq!(table.to_string(), "migration_log");
        assert!(table.schema().is_none());

        let table = TableName::parse("DB_MIGRATION_TABLE", " admin.MigrationLog ").unwrap();
        assert_eq!(table.to_string(), "admin.MigrationLog");
        assert_eq!(table.schema().unwrap().as_str(), "admin");
        assert_eq!(table.name().as_str(), "MigrationLog");
    }

    #[test]
    fn test_rejects_injection_attempts() {
        for value in [
            "",
            "log; DROP TABLE users",
            "1log",
            "log name",
            "a.b.c",
            "log\"",
            "public.",
        ] {
            assert!(
                TableName::parse("DB_MIGRATION_TABLE", value).is_err(),
                "{value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_overlong_identifier() {
        let long = "x".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(Identifier::parse("DB_NAME", &long).is_err());
        let max = "x".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(Identifier::parse("DB_NAME", &max).is_ok());
    }

    #[test]
    fn test_quoted_preserves_case() {
        let ident = Identifier::parse("DB_NAME", "SalesDb").unwrap();
        assert_eq!(ident.quoted(), "\"SalesDb\"");
    }
}
