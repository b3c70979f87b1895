//! Archive and tag view definitions

use chrono::{DateTime, Datelike, Timelike};

use super::{IndexKey, IndexSpec, KeyPart, Reduction, ViewName};
use crate::models::{Document, EntryBody};

/// Number of parts in an archive key (year through second)
pub const ARCHIVE_KEY_PARTS: usize = 6;

/// Entries by creation time
pub const ARCHIVE: IndexSpec = IndexSpec {
    name: ViewName::Archive,
    emit: archive_keys,
    reduce: Reduction::Count,
};

/// Entries by tag
pub const TAGS: IndexSpec = IndexSpec {
    name: ViewName::Tags,
    emit: tag_keys,
    reduce: Reduction::Count,
};

fn entry_body(document: &Document) -> Option<EntryBody> {
    EntryBody::from_value(&document.body).ok().flatten()
}

/// `[YYYY, MM, DD, hh, mm, ss]` in UTC, zero padded
pub fn archive_keys(document: &Document) -> Vec<IndexKey> {
    let Some(body) = entry_body(document) else {
        return Vec::new();
    };
    let Some(at) = DateTime::from_timestamp_millis(body.created_at) else {
        return Vec::new();
    };

    vec![vec![
        KeyPart::Text(format!("{:04}", at.year())),
        KeyPart::Text(format!("{:02}", at.month())),
        KeyPart::Text(format!("{:02}", at.day())),
        KeyPart::Text(format!("{:02}", at.hour())),
        KeyPart::Text(format!("{:02}", at.minute())),
        KeyPart::Text(format!("{:02}", at.second())),
    ]]
}

/// One `[tag, createdAt]` key per tag
pub fn tag_keys(document: &Document) -> Vec<IndexKey> {
    let Some(body) = entry_body(document) else {
        return Vec::new();
    };

    body.tags
        .iter()
        .map(|tag| vec![KeyPart::Text(tag.clone()), KeyPart::Int(body.created_at)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryDraft, Revision};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry_document(created_at: i64, tags: &[&str]) -> Document {
        let tags: Vec<String> = tags.iter().map(|tag| (*tag).to_string()).collect();
        let draft = EntryDraft::new("body", &tags, created_at);
        Document {
            id: draft.id.as_str(),
            revision: Revision::first(),
            body: draft.body().unwrap(),
        }
    }

    #[test]
    fn archive_key_decomposes_created_at_in_utc() {
        // 2024-03-05T07:08:09.500Z
        let document = entry_document(1_709_622_489_500, &[]);
        let expected: IndexKey = ["2024", "03", "05", "07", "08", "09"]
            .into_iter()
            .map(KeyPart::from)
            .collect();
        assert_eq!(archive_keys(&document), vec![expected]);
    }

    #[test]
    fn tag_keys_emit_one_row_per_tag() {
        let document = entry_document(42, &["a", "b"]);
        assert_eq!(
            tag_keys(&document),
            vec![
                vec![KeyPart::from("a"), KeyPart::Int(42)],
                vec![KeyPart::from("b"), KeyPart::Int(42)],
            ]
        );
    }

    #[test]
    fn non_entry_documents_emit_nothing() {
        let document = Document {
            id: "settings".into(),
            revision: Revision::first(),
            body: json!({"type": "settings", "theme": "dark"}),
        };
        assert!(archive_keys(&document).is_empty());
        assert!(tag_keys(&document).is_empty());
    }
}
