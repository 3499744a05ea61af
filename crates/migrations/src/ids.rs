//! Migration and batch identifiers
//!
//! A migration id is the script's file name, `<YYYYMMDDHHMMSS>_<slug>.sql`.
//! Timestamps are fixed width and zero padded, so ordering ids as strings
//! orders them in time.
//!
//! A batch id is the start time of a `migrate` run, read as the 14-digit
//! number `YYYYMMDDHHMMSS` and written in upper-case base 36.

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{MigrationError, MigrationResult};

/// Extension of migration script files
pub const SCRIPT_EXTENSION: &str = "sql";

/// Rollback input at most this long is read as a batch id
pub const MAX_BATCH_ID_LENGTH: usize = 15;

/// Format of the timestamp prefix in migration ids
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const TIMESTAMP_WIDTH: usize = 14;
const BASE36_DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Identifier of a migration unit
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MigrationId(String);

impl MigrationId {
    /// Wrap an id exactly as stored (ledger rows, directory entries)
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Normalize user input: trimmed, lower-cased, with the script extension
    pub fn normalize(input: &str, extension: &str) -> Self {
        let mut id = input.trim().to_lowercase();
        let suffix = format!(".{}", extension);
        if !id.ends_with(&suffix) {
            id.push_str(&suffix);
        }
        Self(id)
    }

    /// Build the id for a new script created at `at`
    pub fn for_new_script(at: DateTime<Utc>, name: &str, extension: &str) -> MigrationResult<Self> {
        let slug = clean_name(name);
        if slug.chars().all(|c| c == '_') {
            return Err(MigrationError::invalid_argument(
                "no valid name provided for the migration",
            ));
        }

        Ok(Self(format!(
            "{}_{}.{}",
            at.format(TIMESTAMP_FORMAT),
            slug,
            extension
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The leading timestamp, if the id follows the naming convention
    pub fn timestamp(&self) -> Option<&str> {
        let prefix = self.0.get(..TIMESTAMP_WIDTH)?;
        let well_formed = prefix.bytes().all(|b| b.is_ascii_digit())
            && self.0.as_bytes().get(TIMESTAMP_WIDTH) == Some(&b'_');
        well_formed.then_some(prefix)
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MigrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MigrationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identifier shared by every migration applied in one `migrate` run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(String);

impl BatchId {
    /// Wrap a batch id exactly as stored
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Normalize user input: trimmed and upper-cased
    pub fn normalize(input: &str) -> Self {
        Self(input.trim().to_uppercase())
    }

    /// Derive the batch id for a run started at `at`
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        let year = u64::try_from(at.year()).unwrap_or(0);
        let stamp = year * 10_000_000_000
            + u64::from(at.month()) * 100_000_000
            + u64::from(at.day()) * 1_000_000
            + u64::from(at.hour()) * 10_000
            + u64::from(at.minute()) * 100
            + u64::from(at.second());
        Self(to_base36(stamp))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BatchId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What a rollback command points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackTarget {
    Migration(MigrationId),
    Batch(BatchId),
}

impl RollbackTarget {
    /// Dispatch on the shape of the input: short values are batch ids,
    /// everything else is a migration id
    pub fn parse(input: &str, extension: &str) -> MigrationResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MigrationError::invalid_argument(
                "migration name or migration batch ID missing",
            ));
        }

        if trimmed.chars().count() <= MAX_BATCH_ID_LENGTH {
            Ok(RollbackTarget::Batch(BatchId::normalize(trimmed)))
        } else {
            Ok(RollbackTarget::Migration(MigrationId::normalize(trimmed, extension)))
        }
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// Make a migration name safe for use in a file name
fn clean_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}
