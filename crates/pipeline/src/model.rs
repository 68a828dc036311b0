use std::{borrow::Borrow, fmt, str::FromStr};

use anyhow::{Result, ensure};
use serde::Serialize;

/// Identifier of a model registry entry.
///
/// Ids name a directory under the models dir and appear in URL paths, so
/// they are trimmed and must be a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn parse(raw: &str) -> Result<Self> {
        let id = raw.trim();
        ensure!(!id.is_empty(), "model id must be non-empty");
        ensure!(
            !id.chars().any(char::is_whitespace),
            "model id `{id}` must not contain whitespace"
        );
        ensure!(
            !id.contains(['/', '\\']) && id != "." && id != "..",
            "model id `{id}` must be a single path segment"
        );
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModelId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for ModelId {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

impl TryFrom<&str> for ModelId {
    type Error = anyhow::Error;

    fn try_from(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for ModelId {
    type Error = anyhow::Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}
