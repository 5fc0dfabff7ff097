// ABOUTME: Site name validation (DNS hostname shaped).
// ABOUTME: Site names become remote directory names and lock file names.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SiteNameError {
    #[error("site name cannot be empty")]
    Empty,

    #[error("site name exceeds maximum length of 253 characters")]
    TooLong,

    #[error("site name labels cannot be empty (leading, trailing, or doubled dot)")]
    EmptyLabel,

    #[error("site name labels cannot start or end with a hyphen")]
    HyphenLabel,

    #[error("site name must be lowercase")]
    NotLowercase,

    #[error("invalid character in site name: '{0}'")]
    InvalidChar(char),
}

/// The domain name of the site being managed, e.g. `example.com`.
///
/// Used verbatim as a directory name under the site root and as the lock
/// file name, so the character set is restricted to DNS hostname labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteName(String);

impl SiteName {
    pub fn new(value: &str) -> Result<Self, SiteNameError> {
        if value.is_empty() {
            return Err(SiteNameError::Empty);
        }

        if value.len() > 253 {
            return Err(SiteNameError::TooLong);
        }

        for label in value.split('.') {
            if label.is_empty() {
                return Err(SiteNameError::EmptyLabel);
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(SiteNameError::HyphenLabel);
            }
            for c in label.chars() {
                if c.is_ascii_uppercase() {
                    return Err(SiteNameError::NotLowercase);
                }
                if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                    return Err(SiteNameError::InvalidChar(c));
                }
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
