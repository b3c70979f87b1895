//! Runtime configuration for the persistence core.
//!
//! Values come from an optional JSON file, then environment overrides. Every
//! field has a default, so a missing file is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::capability::DEFAULT_MAILBOX_CAPACITY;
use crate::error::{Error, Result};
use crate::ops::{RetryPolicy, DEFAULT_MAX_WRITE_ATTEMPTS};

pub const DB_PATH_ENV: &str = "QUILL_DB_PATH";
pub const MAX_WRITE_ATTEMPTS_ENV: &str = "QUILL_MAX_WRITE_ATTEMPTS";
pub const MAILBOX_CAPACITY_ENV: &str = "QUILL_MAILBOX_CAPACITY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct CoreConfig {
    /// Conditional writes attempted per edit or delete before `WriteConflict`
    pub max_write_attempts: u32,
    /// Queued messages per capability before senders wait
    pub mailbox_capacity: usize,
    /// SQLite database file; callers pick a default when unset
    pub database_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            database_path: None,
        }
    }
}

impl CoreConfig {
    /// Load a config file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(error) => return Err(error.into()),
        };

        let config: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidInput(format!("invalid config file {}: {error}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `QUILL_*` environment overrides
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Blank variables count as unset
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(path) = value(DB_PATH_ENV) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = value(MAX_WRITE_ATTEMPTS_ENV) {
            self.max_write_attempts = parse_env(MAX_WRITE_ATTEMPTS_ENV, &raw)?;
        }
        if let Some(raw) = value(MAILBOX_CAPACITY_ENV) {
            self.mailbox_capacity = parse_env(MAILBOX_CAPACITY_ENV, &raw)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_write_attempts == 0 {
            return Err(Error::InvalidInput(
                "max_write_attempts must be at least 1".to_string(),
            ));
        }
        if self.mailbox_capacity == 0 {
            return Err(Error::InvalidInput(
                "mailbox_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_write_attempts)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a positive integer, got {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = CoreConfig::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_write_attempts": 9}"#).unwrap();

        let config = CoreConfig::load_from_path(&path).unwrap();
        assert_eq!(config.max_write_attempts, 9);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_write_atempts": 9}"#).unwrap();

        assert!(matches!(
            CoreConfig::load_from_path(&path),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn env_overrides_win() {
        let config = CoreConfig::default()
            .apply_overrides(env(&[
                (DB_PATH_ENV, " /tmp/quill.db "),
                (MAX_WRITE_ATTEMPTS_ENV, "2"),
                (MAILBOX_CAPACITY_ENV, "   "),
            ]))
            .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/quill.db")));
        assert_eq!(config.max_write_attempts, 2);
        assert_eq!(config.mailbox_capacity, DEFAULT_MAILBOX_CAPACITY);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        for (key, value) in [(MAX_WRITE_ATTEMPTS_ENV, "0"), (MAILBOX_CAPACITY_ENV, "lots")] {
            assert!(matches!(
                CoreConfig::default().apply_overrides(env(&[(key, value)])),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}
