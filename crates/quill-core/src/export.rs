//! Entry export as JSON or Markdown with frontmatter.

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::models::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

/// Serializable entry record; tags keep their stored order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub id: String,
    pub revision: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl From<&Entry> for ExportEntry {
    fn from(entry: &Entry) -> Self {
        Self {
            id: entry.id.as_str(),
            revision: entry.revision.to_string(),
            content: entry.content.clone(),
            tags: entry.tags.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }
    }
}

/// Render entries as pretty-printed JSON
pub fn render_json_export(entries: &[Entry]) -> serde_json::Result<String> {
    let items = entries.iter().map(ExportEntry::from).collect::<Vec<_>>();
    serde_json::to_string_pretty(&items)
}

fn rfc3339(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |at| at.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Render entries as Markdown documents separated by blank lines
#[must_use]
pub fn render_markdown_export(entries: &[Entry]) -> String {
    let mut output = String::new();

    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", entry.id);
        let _ = writeln!(output, "created: {}", rfc3339(entry.created_at));
        if let Some(updated_at) = entry.updated_at {
            let _ = writeln!(output, "updated: {}", rfc3339(updated_at));
        }
        if entry.tags.is_empty() {
            let _ = writeln!(output, "tags: []");
        } else {
            let _ = writeln!(output, "tags:");
            for tag in &entry.tags {
                let _ = writeln!(output, "  - {tag}");
            }
        }
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        output.push_str(entry.content.trim_end());
        output.push('\n');
    }

    output
}

pub fn render_entries_export(entries: &[Entry], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(entries),
        ExportFormat::Markdown => Ok(render_markdown_export(entries)),
    }
}

/// Default file name for an export taken at `timestamp_ms`
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("quill-export-{timestamp_ms}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryDraft, Revision};
    use pretty_assertions::assert_eq;

    fn entry(content: &str, tags: &[&str]) -> Entry {
        let tags: Vec<String> = tags.iter().map(|tag| (*tag).to_string()).collect();
        EntryDraft::new(content, &tags, 1_709_622_489_500).committed(Revision::first())
    }

    #[test]
    fn json_export_keeps_tag_order_and_omits_missing_update() {
        let rendered = render_json_export(&[entry("hi", &["zeta", "alpha", "zeta"])]).unwrap();
        let items: Vec<ExportEntry> = serde_json::from_str(&rendered).unwrap();

        assert_eq!(items[0].tags, vec!["zeta", "alpha", "zeta"]);
        assert!(!rendered.contains("updatedAt"));
    }

    #[test]
    fn markdown_export_includes_frontmatter_and_content() {
        let mut edited = entry("Hello export", &["tag"]);
        edited.updated_at = Some(1_709_622_489_500 + 1_000);

        let rendered = render_markdown_export(&[edited.clone(), entry("Bare", &[])]);
        assert!(rendered.contains(&format!("id: {}", edited.id)));
        assert!(rendered.contains("created: 2024-03-05T07:08:09.500Z"));
        assert!(rendered.contains("updated: 2024-03-05T07:08:10.500Z"));
        assert!(rendered.contains("tags:\n  - tag"));
        assert!(rendered.contains("tags: []"));
        assert!(rendered.contains("Hello export\n"));
    }

    #[test]
    fn export_format_parses_aliases() {
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Markdown);
        assert_eq!(" JSON ".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert!("xml".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "quill-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "quill-export-456.md"
        );
    }
}
