//! Entry model

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::{NoContext, Timestamp, Uuid};

use super::document::{Document, Revision};
use crate::error::{Error, Result};

/// Body discriminator for entry documents
pub const ENTRY_TYPE: &str = "entry";

/// Maximum number of tags accepted on one entry
pub const MAX_TAGS: usize = 32;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S{1,64}$").expect("Invalid regex"));

/// A unique identifier for an entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Create a new unique entry ID stamped with the current time
    #[must_use]
    pub fn new() -> Self {
        Self::at(crate::util::now_millis())
    }

    /// Create a new unique entry ID whose embedded timestamp is `created_at`
    /// (Unix ms), so id order follows creation order.
    #[must_use]
    pub fn at(created_at: i64) -> Self {
        let millis = u64::try_from(created_at).unwrap_or_default();
        let nanos = u32::try_from((millis % 1000) * 1_000_000).unwrap_or_default();
        let timestamp = Timestamp::from_unix(NoContext, millis / 1000, nanos);
        Self(Uuid::new_v7(timestamp))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A journal entry as last committed to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier
    pub id: EntryId,
    /// Markdown-like source text
    pub content: String,
    /// Ordered tags; duplicates allowed
    pub tags: Vec<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last edit timestamp (Unix ms), absent until the first edit
    pub updated_at: Option<i64>,
    /// Store revision this copy was read or written at
    pub revision: Revision,
}

impl Entry {
    /// Decode an entry from a stored document
    pub fn from_document(document: &Document) -> Result<Self> {
        let id = document
            .id
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid entry id: {}", document.id)))?;
        let body = EntryBody::from_value(&document.body)?
            .ok_or_else(|| Error::InvalidInput(format!("document {} is not an entry", document.id)))?;

        Ok(Self {
            id,
            content: body.content,
            tags: body.tags,
            created_at: body.created_at,
            updated_at: body.updated_at,
            revision: document.revision.clone(),
        })
    }

    /// True when `content` and `tags` equal the stored fields byte for byte
    #[must_use]
    pub fn has_fields(&self, content: &str, tags: &[String]) -> bool {
        self.content == content && self.tags == tags
    }

    /// Next version of this entry carrying new fields and `updated_at = now`
    #[must_use]
    pub fn revised(&self, content: &str, tags: &[String], now: i64) -> EntryDraft {
        EntryDraft {
            id: self.id,
            content: content.to_string(),
            tags: tags.to_vec(),
            created_at: self.created_at,
            updated_at: Some(now),
        }
    }

    /// First line with whitespace collapsed, cut to `max_chars` with a
    /// trailing `...` when longer
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.content.lines().next().unwrap_or("");
        let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

        if collapsed.chars().count() <= max_chars {
            collapsed
        } else {
            let mut truncated = collapsed
                .chars()
                .take(max_chars.saturating_sub(3))
                .collect::<String>();
            truncated.push_str("...");
            truncated
        }
    }
}

/// An entry version that has not been committed yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub id: EntryId,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl EntryDraft {
    /// Draft for a brand new entry created at `created_at`
    #[must_use]
    pub fn new(content: &str, tags: &[String], created_at: i64) -> Self {
        Self {
            id: EntryId::at(created_at),
            content: content.to_string(),
            tags: tags.to_vec(),
            created_at,
            updated_at: None,
        }
    }

    /// JSON body written to the store
    pub fn body(&self) -> Result<serde_json::Value> {
        let body = EntryBody {
            kind: ENTRY_TYPE.to_string(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(serde_json::to_value(body)?)
    }

    /// Attach the revision the store issued for this draft
    #[must_use]
    pub fn committed(self, revision: Revision) -> Entry {
        Entry {
            id: self.id,
            content: self.content,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            revision,
        }
    }
}

/// Wire shape of an entry document body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EntryBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl EntryBody {
    /// Parse a body, returning `None` for documents of another type
    pub(crate) fn from_value(value: &serde_json::Value) -> Result<Option<Self>> {
        if value.get("type").and_then(serde_json::Value::as_str) != Some(ENTRY_TYPE) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value.clone())?))
    }
}

/// Validate user-supplied entry fields
///
/// Content must not be blank. Each tag must be 1-64 non-whitespace
/// characters, and at most [`MAX_TAGS`] tags are accepted.
pub fn validate_entry_input(content: &str, tags: &[String]) -> Result<()> {
    if content.trim().is_empty() {
        return Err(Error::InvalidInput("entry content cannot be empty".into()));
    }
    if tags.len() > MAX_TAGS {
        return Err(Error::InvalidInput(format!(
            "too many tags ({}), at most {MAX_TAGS} allowed",
            tags.len()
        )));
    }
    if let Some(tag) = tags.iter().find(|tag| !TAG_PATTERN.is_match(tag)) {
        return Err(Error::InvalidInput(format!(
            "invalid tag {tag:?}: tags are 1-64 characters without whitespace"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    #[test]
    fn test_entry_id_unique() {
        let id1 = EntryId::new();
        let id2 = EntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_entry_id_parse() {
        let id = EntryId::new();
        let parsed: EntryId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_entry_ids_sort_by_creation_time() {
        let earlier = EntryId::at(1_700_000_000_000);
        let later = EntryId::at(1_700_000_000_001);
        assert!(earlier < later);
    }

    #[test]
    fn test_draft_body_shape() {
        let draft = EntryDraft::new("Hello", &tags(&["a", "b"]), 42);
        assert_eq!(
            draft.body().unwrap(),
            json!({"type": "entry", "content": "Hello", "tags": ["a", "b"], "createdAt": 42})
        );
    }

    #[test]
    fn test_entry_from_document_roundtrip() {
        let draft = EntryDraft::new("Hello", &tags(&["a"]), 42);
        let document = Document {
            id: draft.id.as_str(),
            revision: Revision::first(),
            body: draft.body().unwrap(),
        };

        let entry = Entry::from_document(&document).unwrap();
        assert_eq!(entry, draft.committed(document.revision.clone()));
    }

    #[test]
    fn test_non_entry_document_is_rejected() {
        let document = Document {
            id: EntryId::new().as_str(),
            revision: Revision::first(),
            body: json!({"type": "settings"}),
        };
        assert!(matches!(
            Entry::from_document(&document),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_has_fields_is_exact() {
        let entry = EntryDraft::new("Hello", &tags(&["a"]), 1).committed(Revision::first());
        assert!(entry.has_fields("Hello", &tags(&["a"])));
        assert!(!entry.has_fields("Hello ", &tags(&["a"])));
        assert!(!entry.has_fields("Hello", &tags(&["a", "a"])));
    }

    #[test]
    fn test_revised_keeps_identity() {
        let entry = EntryDraft::new("Hello", &[], 1).committed(Revision::first());
        let draft = entry.revised("Hi", &tags(&["x"]), 99);
        assert_eq!(draft.id, entry.id);
        assert_eq!(draft.created_at, 1);
        assert_eq!(draft.updated_at, Some(99));
    }

    #[test]
    fn test_validate_rejects_blank_content() {
        assert!(validate_entry_input("  \n", &[]).is_err());
        assert!(validate_entry_input("ok", &[]).is_ok());
    }

    #[test]
    fn test_validate_tags() {
        assert!(validate_entry_input("ok", &tags(&["rust", "rust", "día"])).is_ok());
        assert!(validate_entry_input("ok", &tags(&[""])).is_err());
        assert!(validate_entry_input("ok", &tags(&["two words"])).is_err());
        assert!(validate_entry_input("ok", &[String::from("x").repeat(65)]).is_err());
        assert!(validate_entry_input("ok", &vec!["t".to_string(); MAX_TAGS + 1]).is_err());
    }

    #[test]
    fn test_preview_uses_collapsed_first_line() {
        let entry = EntryDraft::new("  First   line \nSecond line", &[], 1)
            .committed(Revision::first());
        assert_eq!(entry.preview(50), "First line");
        assert_eq!(entry.preview(8), "First...");
    }
}
