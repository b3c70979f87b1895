use std::path::Path;

use quill_core::export::render_entries_export;

use crate::cli::ExportFormat;
use crate::commands::common::{list_all_entries, App};
use crate::error::CliError;

pub async fn run_export(
    app: &App,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let entries = list_all_entries(&app.rights).await?;
    let rendered = render_entries_export(&entries, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
