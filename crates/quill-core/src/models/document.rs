//! Stored document and revision token

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque version token issued by the store on every successful write.
///
/// Formatted as `{generation}-{suffix}`. The generation counts writes to the
/// same id; the suffix makes every token unique even across a delete and a
/// concurrent re-write at the same generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    /// Revision for the first write of a document
    #[must_use]
    pub fn first() -> Self {
        Self::with_generation(1)
    }

    /// Revision that supersedes this one
    #[must_use]
    pub fn next(&self) -> Self {
        Self::with_generation(self.generation().saturating_add(1))
    }

    fn with_generation(generation: u64) -> Self {
        Self(format!("{generation}-{}", Uuid::now_v7().simple()))
    }

    /// Write count encoded in the token, `0` if the token is malformed
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.0
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
            .unwrap_or(0)
    }

    /// Get the string representation of this revision
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Revision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("revision must not be empty".to_string());
        }
        Ok(Self(s.to_string()))
    }
}

/// A committed document as held by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document key
    pub id: String,
    /// Revision of this committed version
    pub revision: Revision,
    /// JSON body, written and read as one unit
    pub body: serde_json::Value,
}
