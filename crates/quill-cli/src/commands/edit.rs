use quill_core::EditOutcome;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, normalize_entry_identifier,
    normalize_tags, resolve_entry, App,
};
use crate::error::CliError;

/// How `quill edit` should change the tags
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEdit {
    Keep,
    Replace(Vec<String>),
}

impl TagEdit {
    pub fn from_args(tags: &[String], clear_tags: bool) -> Self {
        if clear_tags {
            Self::Replace(Vec::new())
        } else if tags.is_empty() {
            Self::Keep
        } else {
            Self::Replace(normalize_tags(tags))
        }
    }
}

pub async fn run_edit(
    app: &App,
    id: &str,
    content_parts: &[String],
    tag_edit: TagEdit,
) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let entry = resolve_entry(&normalized_id, &app.rights).await?;

    let content = if content_parts.is_empty() {
        capture_editor_input_with_initial(&entry.content)?
    } else {
        normalize_content(&content_parts.join(" "))
    };
    let Some(content) = content else {
        return Err(CliError::EmptyEditedContent);
    };
    let tags = match tag_edit {
        TagEdit::Keep => entry.tags.clone(),
        TagEdit::Replace(tags) => tags,
    };

    match app.rights.edit(entry.id, &content, &tags).await? {
        EditOutcome::Updated(updated) => println!("{}", updated.id),
        EditOutcome::Unchanged(unchanged) => {
            tracing::info!("Entry {} unchanged", unchanged.id);
            println!("{}", unchanged.id);
        }
    }
    Ok(())
}
