use quill_core::ListOptions;

use crate::commands::common::{entry_to_list_item, format_entry_lines, App, EntryListItem};
use crate::error::CliError;

pub async fn run_list(
    app: &App,
    tag: Option<&str>,
    limit: usize,
    oldest_first: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let options = ListOptions {
        descending: !oldest_first,
        limit: Some(limit),
    };
    let entries = match tag {
        Some(tag) => app.rights.list_by_tag(tag.trim_start_matches('#'), options).await?,
        None => app.rights.list_recent(options).await?,
    };

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
