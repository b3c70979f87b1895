use crate::commands::common::{normalize_entry_identifier, resolve_entry, App};
use crate::error::CliError;

pub async fn run_delete(app: &App, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let entry = resolve_entry(&normalized_id, &app.rights).await?;

    app.rights.remove(entry.id).await?;
    println!("{}", entry.id);
    Ok(())
}
