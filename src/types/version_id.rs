// ABOUTME: Time-ordered version identifiers for released artifacts.
// ABOUTME: Canonical form YYYYMMDD-HHMMSS.ffffff; lexicographic order is chronological.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionIdError {
    #[error("version id cannot be empty")]
    Empty,

    #[error("version id is not a valid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Identifier for one released version of a site.
///
/// Derived from the UTC wall clock at stage time. The textual form sorts
/// lexicographically in chronological order, which the store backends rely
/// on when listing and retaining versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(String);

/// Timestamp layout with microseconds, as produced by `VersionId::now`.
const FORMAT_FRACTION: &str = "%Y%m%d-%H%M%S%.6f";
/// Older deployments were stamped without the fraction; still accepted.
const FORMAT_SECONDS: &str = "%Y%m%d-%H%M%S";

impl VersionId {
    /// Mint a fresh identifier from the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now().format(FORMAT_FRACTION).to_string())
    }

    /// Parse and validate an identifier from its textual form.
    pub fn parse(value: &str) -> Result<Self, VersionIdError> {
        if value.is_empty() {
            return Err(VersionIdError::Empty);
        }

        let valid = NaiveDateTime::parse_from_str(value, FORMAT_FRACTION).is_ok()
            || NaiveDateTime::parse_from_str(value, FORMAT_SECONDS).is_ok();
        if !valid {
            return Err(VersionIdError::InvalidTimestamp(value.to_string()));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(serde::de::Error::custom)
    }
}
