use quill_core::TimeBucket;

use crate::cli::Granularity;
use crate::commands::common::App;
use crate::error::CliError;

pub fn format_bucket_lines(buckets: &[TimeBucket]) -> Vec<String> {
    let width = buckets
        .iter()
        .map(|bucket| bucket.to_string().len())
        .max()
        .unwrap_or_default();
    buckets
        .iter()
        .map(|bucket| format!("{:<width$}  {}", bucket.to_string(), bucket.count))
        .collect()
}

pub async fn run_archive(app: &App, by: Granularity, as_json: bool) -> Result<(), CliError> {
    let buckets = app.rights.archive_counts(by.group_level()).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&buckets)?);
    } else {
        for line in format_bucket_lines(&buckets) {
            println!("{line}");
        }
    }

    Ok(())
}
