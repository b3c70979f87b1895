use quill_core::TagCount;

use crate::commands::common::App;
use crate::error::CliError;

pub fn format_tag_lines(counts: &[TagCount]) -> Vec<String> {
    let width = counts
        .iter()
        .map(|count| count.tag.chars().count() + 1)
        .max()
        .unwrap_or_default();
    counts
        .iter()
        .map(|count| format!("{:<width$}  {}", format!("#{}", count.tag), count.count))
        .collect()
}

pub async fn run_tags(app: &App, as_json: bool) -> Result<(), CliError> {
    let counts = app.rights.tag_counts().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        for line in format_tag_lines(&counts) {
            println!("{line}");
        }
    }

    Ok(())
}
