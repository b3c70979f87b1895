use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quill_core::{CoreConfig, Entry, ListOptions, Rights, SqliteStore, Vat};
use serde::Serialize;

use crate::error::CliError;

/// Open store plus the capabilities spawned over it
pub struct App {
    pub rights: Rights,
    pub store: Arc<SqliteStore>,
}

pub fn open_app(db_path: &Path, config: &CoreConfig) -> Result<App, CliError> {
    let store = Arc::new(SqliteStore::open(db_path)?);
    let rights = Rights::spawn(&Vat::new("quill-cli"), store.clone(), config);
    Ok(App { rights, store })
}

pub fn resolve_config(cli_config_path: Option<&Path>) -> Result<CoreConfig, CliError> {
    let path = cli_config_path.map_or_else(default_config_path, Path::to_path_buf);
    Ok(CoreConfig::load_from_path(&path)?.apply_env()?)
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(env::temp_dir)
        .join("quill")
        .join("config.json")
}

/// `--db-path`, then the configured path (`QUILL_DB_PATH` included), then the
/// per-user data directory
pub fn resolve_db_path(cli_db_path: Option<PathBuf>, config: &CoreConfig) -> PathBuf {
    cli_db_path
        .or_else(|| config.database_path.clone())
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("quill")
        .join("quill.db")
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub revision: String,
    pub preview: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: Option<i64>,
    pub relative_time: String,
    pub tags: Vec<String>,
}

pub async fn list_all_entries(rights: &Rights) -> Result<Vec<Entry>, CliError> {
    Ok(rights
        .list_recent(ListOptions {
            descending: false,
            limit: None,
        })
        .await?)
}

/// Find an entry by exact id or unique id prefix
pub async fn resolve_entry(entry_query: &str, rights: &Rights) -> Result<Entry, CliError> {
    let entries = rights
        .list_recent(ListOptions {
            descending: true,
            limit: None,
        })
        .await?;

    if let Some(entry) = entries.iter().find(|entry| entry.id.as_str() == entry_query) {
        return Ok(entry.clone());
    }

    let query = entry_query.to_ascii_lowercase();
    let mut matching = entries
        .into_iter()
        .filter(|entry| entry.id.as_str().starts_with(&query));

    match (matching.next(), matching.next()) {
        (None, _) => Err(CliError::EntryNotFound(entry_query.to_string())),
        (Some(entry), None) => Ok(entry),
        (Some(first), Some(second)) => {
            let options = [first, second]
                .into_iter()
                .chain(matching.take(1))
                .map(|entry| short_id(&entry))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousEntryId(format!(
                "ID prefix '{entry_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(entry: &Entry) -> String {
    entry.id.as_str().chars().take(13).collect()
}

pub fn format_entry_lines(entries: &[Entry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let short_id = short_id(entry);
            let preview = entry.preview(40);
            let relative_time = format_relative_time(last_touched(entry), now_ms);
            let tags = render_tags(entry);

            if tags.is_empty() {
                format!("{short_id:<13}  {preview:<40}  {relative_time}")
            } else {
                format!("{short_id:<13}  {preview:<40}  {relative_time:<10}  {tags}")
            }
        })
        .collect()
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();

    EntryListItem {
        id: entry.id.as_str(),
        revision: entry.revision.to_string(),
        preview: entry.preview(80),
        content: entry.content.clone(),
        created_at: entry.created_at,
        updated_at: entry.updated_at,
        relative_time: format_relative_time(last_touched(entry), now_ms),
        tags: entry.tags.clone(),
    }
}

/// One line describing a change seen by `quill watch`
pub fn format_change_line(entry: &Entry, deleted: bool) -> String {
    let marker = if deleted {
        '-'
    } else if entry.updated_at.is_some() {
        '~'
    } else {
        '+'
    };
    let at = if deleted {
        Utc::now().timestamp_millis()
    } else {
        last_touched(entry)
    };
    format!(
        "{marker} {}  {}  {}",
        format_timestamp(at),
        short_id(entry),
        entry.preview(60)
    )
}

fn last_touched(entry: &Entry) -> i64 {
    entry.updated_at.unwrap_or(entry.created_at)
}

pub fn render_tags(entry: &Entry) -> String {
    entry
        .tags
        .iter()
        .map(|tag| format!("#{tag}"))
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Trim tags and drop a leading `#`; empty tags are skipped
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim().trim_start_matches('#').to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

pub fn resolve_entry_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let entry_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&entry_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    let status = match Command::new(editor).arg(file_path).status() {
        Ok(status) => status,
        // EDITOR may carry arguments, e.g. "code --wait"
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };
            Command::new(program).args(parts).arg(file_path).status()?
        }
        Err(err) => return Err(CliError::Io(err)),
    };

    if status.success() {
        Ok(())
    } else {
        Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        )))
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quill-entry-{}-{now}.md", std::process::id()))
}
