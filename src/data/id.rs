//! Validated update identifiers
//!
//! Upstream announcements are addressed either by a numeric id or by a GUID.
//! Anything else is rejected here, before a request or a cache lookup is made.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("numeric id pattern is valid"));

static GUID_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("guid pattern is valid")
});

/// Errors produced when parsing an identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Neither all digits nor a canonical GUID
    #[error("Invalid update id: '{0}'. Expected digits or a GUID")]
    Invalid(String),
}

/// An identifier that has passed validation
///
/// Numeric ids keep their leading zeros. GUIDs are lowercased so that both
/// spellings of the same GUID share one cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UpdateId(String);

impl UpdateId {
    /// Validates and normalizes a raw identifier
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let trimmed = raw.trim();
        if NUMERIC_ID.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else if GUID_ID.is_match(trimmed) {
            Ok(Self(trimmed.to_ascii_lowercase()))
        } else {
            Err(IdError::Invalid(raw.to_string()))
        }
    }

    /// Returns the normalized identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UpdateId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UpdateId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UpdateId> for String {
    fn from(id: UpdateId) -> Self {
        id.0
    }
}
