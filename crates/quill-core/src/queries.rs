//! Read queries over the archive and tag views

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::models::Entry;
use crate::ops::EntryStore;
use crate::views::{KeyRange, QueryOptions, ViewName, ViewRow, ARCHIVE_KEY_PARTS};

/// Ordering and paging for entry listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Newest first
    pub descending: bool,
    pub limit: Option<usize>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            descending: true,
            limit: None,
        }
    }
}

/// Number of entries created within one time prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Leading archive key parts, e.g. `["2024", "03"]` for a month
    pub key: Vec<String>,
    pub count: u64,
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SEPARATORS: [&str; ARCHIVE_KEY_PARTS] = ["", "-", "-", " ", ":", ":"];
        for (part, separator) in self.key.iter().zip(SEPARATORS) {
            write!(f, "{separator}{part}")?;
        }
        Ok(())
    }
}

/// Number of entries carrying one tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

fn entries_from_rows(rows: Vec<ViewRow>) -> Result<Vec<Entry>> {
    rows.into_iter()
        .filter_map(|row| row.doc)
        .map(|document| Entry::from_document(&document))
        .collect()
}

impl EntryStore {
    /// Entries ordered by creation time
    pub async fn list_by_time(&self, options: ListOptions) -> Result<Vec<Entry>> {
        let rows = self
            .store()
            .query(
                ViewName::Archive,
                QueryOptions {
                    descending: options.descending,
                    limit: options.limit,
                    include_docs: true,
                    ..QueryOptions::default()
                },
            )
            .await?;
        entries_from_rows(rows)
    }

    /// Entries carrying `tag`, ordered by creation time
    pub async fn list_by_tag(&self, tag: &str, options: ListOptions) -> Result<Vec<Entry>> {
        let rows = self
            .store()
            .query(
                ViewName::Tags,
                QueryOptions {
                    descending: options.descending,
                    limit: options.limit,
                    range: Some(KeyRange::Prefix(vec![tag.into()])),
                    include_docs: true,
                    ..QueryOptions::default()
                },
            )
            .await?;
        entries_from_rows(rows)
    }

    /// Entry counts grouped on the first `group_level` archive key parts
    /// (1 = year through 6 = second)
    pub async fn count_by_time_group(&self, group_level: usize) -> Result<Vec<TimeBucket>> {
        if !(1..=ARCHIVE_KEY_PARTS).contains(&group_level) {
            return Err(Error::InvalidInput(format!(
                "group level must be between 1 and {ARCHIVE_KEY_PARTS}, got {group_level}"
            )));
        }

        let rows = self
            .store()
            .query(
                ViewName::Archive,
                QueryOptions {
                    group_level: Some(group_level),
                    ..QueryOptions::default()
                },
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TimeBucket {
                key: row.key.iter().map(ToString::to_string).collect(),
                count: row.value,
            })
            .collect())
    }

    /// Entry counts per tag, in tag order
    pub async fn count_by_tag_group(&self) -> Result<Vec<TagCount>> {
        let rows = self
            .store()
            .query(
                ViewName::Tags,
                QueryOptions {
                    group_level: Some(1),
                    ..QueryOptions::default()
                },
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let tag = row.key.first()?.as_text()?.to_string();
                Some(TagCount {
                    tag,
                    count: row.value,
                })
            })
            .collect())
    }
}
