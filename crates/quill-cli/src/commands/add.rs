use crate::commands::common::{normalize_tags, resolve_entry_content, App};
use crate::error::CliError;

pub async fn run_add(app: &App, content_parts: &[String], tags: &[String]) -> Result<(), CliError> {
    let content = resolve_entry_content(content_parts)?;

    let entry = app.rights.add(&content, &normalize_tags(tags)).await?;

    println!("{}", entry.id);
    Ok(())
}
