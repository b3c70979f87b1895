//! Derived views over the document collection
//!
//! A view is declared as an [`IndexSpec`]: a key-extraction function plus a
//! reduction. Stores own a [`ViewSet`] and recompute a document's rows on
//! every write, so index rows never exist without their source document.

mod index;
mod specs;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::Document;

pub use index::{ViewIndex, ViewSet};
pub use specs::{archive_keys, tag_keys, ARCHIVE, ARCHIVE_KEY_PARTS, TAGS};

/// One component of an index key. Integers sort before text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Int(i64),
    Text(String),
}

impl KeyPart {
    /// Text value, if this part is text
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Composite index key, compared part by part
pub type IndexKey = Vec<KeyPart>;

/// Views maintained by the stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewName {
    /// Entries keyed by creation time, `[YYYY, MM, DD, hh, mm, ss]`
    Archive,
    /// One row per entry tag, `[tag, createdAt]`
    Tags,
}

impl ViewName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Tags => "tags",
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(Self::Archive),
            "tags" => Ok(Self::Tags),
            other => Err(format!("unknown view: {other}")),
        }
    }
}

/// How grouped rows are folded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Number of rows in the group
    Count,
}

/// Declarative view definition evaluated by the store engine
#[derive(Debug, Clone, Copy)]
pub struct IndexSpec {
    pub name: ViewName,
    /// Keys emitted for a document; empty for documents the view ignores
    pub emit: fn(&Document) -> Vec<IndexKey>,
    pub reduce: Reduction,
}

/// Key filter applied before ordering and grouping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRange {
    /// Keys starting with the given parts
    Prefix(IndexKey),
    /// Keys between `start` and `end`, both inclusive
    Between { start: IndexKey, end: IndexKey },
}

impl KeyRange {
    #[must_use]
    pub fn contains(&self, key: &IndexKey) -> bool {
        match self {
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Between { start, end } => key >= start && key <= end,
        }
    }
}

/// Options for a view query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub descending: bool,
    pub limit: Option<usize>,
    pub range: Option<KeyRange>,
    /// Reduce rows, grouping on the first `n` key parts
    pub group_level: Option<usize>,
    /// Attach the source document to each (unreduced) row
    pub include_docs: bool,
}

/// One row of a view query result
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub key: IndexKey,
    /// Source document id; `None` for reduced rows
    pub id: Option<String>,
    /// `1` for map rows, the group count for reduced rows
    pub value: u64,
    pub doc: Option<Document>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_parts_sort_before_text() {
        assert!(KeyPart::Int(i64::MAX) < KeyPart::Text(String::new()));
        assert!(KeyPart::from("a") < KeyPart::from("b"));
    }

    #[test]
    fn keys_compare_lexicographically() {
        let short: IndexKey = vec!["rust".into()];
        let long: IndexKey = vec!["rust".into(), 5.into()];
        assert!(short < long);
    }

    #[test]
    fn prefix_range_matches_whole_parts_only() {
        let range = KeyRange::Prefix(vec!["ru".into()]);
        assert!(range.contains(&vec!["ru".into(), 1.into()]));
        assert!(!range.contains(&vec!["rust".into(), 1.into()]));
    }

    #[test]
    fn between_range_is_inclusive() {
        let range = KeyRange::Between {
            start: vec!["2024".into()],
            end: vec!["2024".into(), "12".into()],
        };
        assert!(range.contains(&vec!["2024".into()]));
        assert!(range.contains(&vec!["2024".into(), "06".into()]));
        assert!(range.contains(&vec!["2024".into(), "12".into()]));
        assert!(!range.contains(&vec!["2024".into(), "12".into(), "01".into()]));
    }

    #[test]
    fn view_name_roundtrips_through_str() {
        for name in [ViewName::Archive, ViewName::Tags] {
            assert_eq!(name.as_str().parse::<ViewName>().unwrap(), name);
        }
        assert!("recent".parse::<ViewName>().is_err());
    }

    #[test]
    fn key_part_serializes_untagged() {
        let key: IndexKey = vec!["rust".into(), 7.into()];
        assert_eq!(serde_json::to_string(&key).unwrap(), r#"["rust",7]"#);
    }
}
