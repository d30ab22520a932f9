//! Credpool core types.
//!
//! Categories, credential records, and the `identifier:secret` wire format.
//! Validation lives here so every surface (store, dispenser, interface)
//! shares one rule set.

#![deny(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between identifier and secret in record text.
pub const RECORD_SEPARATOR: char = ':';

/// Reserved name suffix marking a category's archive store.
pub const ARCHIVE_SUFFIX: &str = "_used";

/// A named partition of the credential pool (e.g. a service name).
///
/// Category names are case-insensitive; they are normalized to ASCII
/// lowercase on construction so `"Netflix"` and `"netflix"` address the
/// same pool. Names are restricted to ASCII alphanumerics, `-` and `_`,
/// and may not end in the reserved `_used` suffix, so a category can
/// always name a store file without colliding with another category's
/// archive or escaping the data directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CategoryId(String);

impl CategoryId {
    pub fn parse(name: impl AsRef<str>) -> Result<Self, CategoryParseError> {
        let value = name.as_ref().trim().to_ascii_lowercase();
        if value.is_empty() {
            return Err(CategoryParseError::Empty);
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CategoryParseError::InvalidCharacter);
        }
        if value.ends_with(ARCHIVE_SUFFIX) {
            return Err(CategoryParseError::ReservedSuffix);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CategoryId {
    type Error = CategoryParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CategoryId> for String {
    fn from(value: CategoryId) -> Self {
        value.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validated credential text in `identifier:secret` form.
///
/// Exactly one separator, both halves non-empty, no whitespace anywhere.
/// The string is opaque beyond that: no assumption that the identifier is
/// an email address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordText(String);

impl RecordText {
    pub fn parse(raw: &str) -> Result<Self, RecordParseError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(RecordParseError::MissingSeparator);
        }
        if value.chars().any(char::is_whitespace) {
            return Err(RecordParseError::EmbeddedWhitespace);
        }
        match value.matches(RECORD_SEPARATOR).count() {
            0 => return Err(RecordParseError::MissingSeparator),
            1 => {}
            _ => return Err(RecordParseError::MultipleSeparators),
        }
        let (identifier, secret) = value
            .split_once(RECORD_SEPARATOR)
            .ok_or(RecordParseError::MissingSeparator)?;
        if identifier.is_empty() || secret.is_empty() {
            return Err(RecordParseError::EmptyHalf);
        }
        Ok(Self(value.to_string()))
    }

    pub fn identifier(&self) -> &str {
        self.0
            .split_once(RECORD_SEPARATOR)
            .map(|(identifier, _)| identifier)
            .unwrap_or(&self.0)
    }

    pub fn secret(&self) -> &str {
        self.0
            .split_once(RECORD_SEPARATOR)
            .map(|(_, secret)| secret)
            .unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RecordText {
    type Error = RecordParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordText> for String {
    fn from(value: RecordText) -> Self {
        value.0
    }
}

/// A credential waiting in a category's available pool.
///
/// Immutable once created; provenance travels with the record into the
/// archive when it is dispensed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub account: RecordText,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
}

impl PoolRecord {
    pub fn new(account: RecordText, added_by: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        Self {
            account,
            added_by: added_by.into(),
            added_at,
        }
    }

    /// Consume the pool record into its archived form.
    pub fn into_archived(self, dispensed_at: DateTime<Utc>) -> ArchivedRecord {
        ArchivedRecord {
            account: self.account,
            added_by: self.added_by,
            dispensed_at,
        }
    }
}

/// A previously dispensed credential in a category's append-only archive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedRecord {
    pub account: RecordText,
    pub added_by: String,
    pub dispensed_at: DateTime<Utc>,
}

/// The one record in flight during a dispense.
///
/// Persisted before the archive append and cleared after the pool rewrite,
/// so recovery can finish or discard exactly that dispense. Carries the
/// full pool row: `added_at` tells the picked copy apart from any
/// duplicate of the same credential text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseIntent {
    pub record: PoolRecord,
    pub dispensed_at: DateTime<Utc>,
}

impl DispenseIntent {
    pub fn new(record: PoolRecord, dispensed_at: DateTime<Utc>) -> Self {
        Self {
            record,
            dispensed_at,
        }
    }

    /// The archive row this dispense appends.
    pub fn archived(&self) -> ArchivedRecord {
        self.record.clone().into_archived(self.dispensed_at)
    }
}

/// Category name validation errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CategoryParseError {
    #[error("category name must not be empty")]
    Empty,

    #[error("category name may only contain ascii letters, digits, `-` and `_`")]
    InvalidCharacter,

    #[error("category names ending in `_used` are reserved")]
    ReservedSuffix,
}

/// Record text validation errors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RecordParseError {
    #[error("record must contain a `:` separating identifier and secret")]
    MissingSeparator,

    #[error("record must contain exactly one `:` separator")]
    MultipleSeparators,

    #[error("identifier and secret must both be non-empty")]
    EmptyHalf,

    #[error("record must not contain whitespace")]
    EmbeddedWhitespace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_record_parses() {
        let record = RecordText::parse("a@x.com:pw1").unwrap();
        assert_eq!(record.identifier(), "a@x.com");
        assert_eq!(record.secret(), "pw1");
        assert_eq!(record.as_str(), "a@x.com:pw1");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let record = RecordText::parse("  user:pass  ").unwrap();
        assert_eq!(record.as_str(), "user:pass");
    }

    #[test]
    fn missing_separator_is_rejected() {
        assert_eq!(
            RecordText::parse("userpass"),
            Err(RecordParseError::MissingSeparator)
        );
    }

    #[test]
    fn embedded_whitespace_is_rejected() {
        assert_eq!(
            RecordText::parse("user name:pass"),
            Err(RecordParseError::EmbeddedWhitespace)
        );
    }

    #[test]
    fn multiple_separators_are_rejected() {
        assert_eq!(
            RecordText::parse("user:pa:ss"),
            Err(RecordParseError::MultipleSeparators)
        );
    }

    #[test]
    fn empty_halves_are_rejected() {
        assert_eq!(RecordText::parse(":pass"), Err(RecordParseError::EmptyHalf));
        assert_eq!(RecordText::parse("user:"), Err(RecordParseError::EmptyHalf));
    }

    #[test]
    fn category_names_are_normalized() {
        assert_eq!(
            CategoryId::parse(" Netflix ").unwrap(),
            CategoryId::parse("netflix").unwrap()
        );
        assert_eq!(CategoryId::parse("HBO").unwrap().as_str(), "hbo");
    }

    #[test]
    fn category_names_reject_path_and_reserved_forms() {
        assert_eq!(CategoryId::parse(""), Err(CategoryParseError::Empty));
        assert_eq!(
            CategoryId::parse("net/flix"),
            Err(CategoryParseError::InvalidCharacter)
        );
        assert_eq!(
            CategoryId::parse("../escape"),
            Err(CategoryParseError::InvalidCharacter)
        );
        assert_eq!(
            CategoryId::parse("netflix_used"),
            Err(CategoryParseError::ReservedSuffix)
        );
    }

    #[test]
    fn record_text_serde_roundtrip_enforces_validation() {
        let record: RecordText = serde_json::from_str("\"u:p\"").unwrap();
        assert_eq!(record.as_str(), "u:p");
        assert!(serde_json::from_str::<RecordText>("\"up\"").is_err());
    }

    #[test]
    fn pool_record_archives_with_provenance() {
        let added_at = Utc::now();
        let record = PoolRecord::new(RecordText::parse("u:p").unwrap(), "alice", added_at);
        let dispensed_at = Utc::now();
        let archived = record.into_archived(dispensed_at);
        assert_eq!(archived.account.as_str(), "u:p");
        assert_eq!(archived.added_by, "alice");
        assert_eq!(archived.dispensed_at, dispensed_at);
    }
}
