//! Tracker configuration.
//!
//! # Responsibility
//! - Describe where and how the project slot is stored.
//! - Load optional `gtracker.json` overrides from the data directory.
//! - Normalize user-supplied backend and level strings.
//!
//! # Invariants
//! - A missing config file yields defaults; an unreadable one is an error.
//! - `storage_key` is always a valid slot key after `validate()`.

use crate::repo::project_repo::DEFAULT_STORAGE_KEY;
use crate::storage::{
    validate_key, FileStorage, MemoryStorage, SqliteStorage, StorageBackend, StorageError,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File name looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "gtracker.json";
/// SQLite file name used by the `sqlite` backend.
pub const SQLITE_FILE_NAME: &str = "gtracker.sqlite3";
const DEFAULT_DATA_DIR_NAME: &str = "gtracker";

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    #[default]
    File,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Configuration failure.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Runtime configuration for a tracker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub backend: BackendKind,
    pub storage_key: String,
    /// `None` means the build-mode default from `default_log_level()`.
    pub log_level: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join(DEFAULT_DATA_DIR_NAME),
            backend: BackendKind::default(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            log_level: None,
        }
    }
}

impl TrackerConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Reads `gtracker.json` from `data_dir` when present.
    ///
    /// `data_dir` always wins over a `data_dir` value inside the file.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.as_ref();
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<Self>(&raw)
                .map_err(|source| ConfigError::Parse { path, source })?,
            Err(err) if err.kind() == ErrorKind::NotFound => Self::default(),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        config.data_dir = data_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Checks key and level values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_key(&self.storage_key)
            .map_err(|err| ConfigError::Invalid(format!("storage_key: {err}")))?;
        if let Some(level) = &self.log_level {
            crate::logging::normalize_level(level).map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    /// Opens the configured backend.
    pub fn open_storage(&self) -> Result<Box<dyn StorageBackend>, StorageError> {
        let storage: Box<dyn StorageBackend> = match self.backend {
            BackendKind::Memory => Box::new(MemoryStorage::new()),
            BackendKind::File => Box::new(FileStorage::open(&self.data_dir)?),
            BackendKind::Sqlite => {
                std::fs::create_dir_all(&self.data_dir).map_err(|source| StorageError::Io {
                    key: self.data_dir.display().to_string(),
                    source,
                })?;
                Box::new(SqliteStorage::open(self.data_dir.join(SQLITE_FILE_NAME))?)
            }
        };
        Ok(storage)
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

/// Parses a backend name (`memory|file|sqlite`, case-insensitive).
pub fn normalize_backend(value: &str) -> Result<BackendKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "memory" | "mem" => Ok(BackendKind::Memory),
        "file" | "json" => Ok(BackendKind::File),
        "sqlite" | "db" => Ok(BackendKind::Sqlite),
        other => Err(format!(
            "unsupported backend `{other}`; expected memory|file|sqlite"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_backend, BackendKind, ConfigError, TrackerConfig, CONFIG_FILE_NAME};

    #[test]
    fn missing_file_yields_defaults_for_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrackerConfig::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.storage_key, "projects");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"backend":"sqlite","storage_key":"airdrops","log_level":"debug","data_dir":"/elsewhere"}"#,
        )
        .unwrap();

        let config = TrackerConfig::load(dir.path()).unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.storage_key, "airdrops");
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.data_dir, dir.path());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{"storage_key":"../escape"}"#,
        )
        .unwrap();
        let err = TrackerConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{").unwrap();
        let err = TrackerConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn normalize_backend_accepts_aliases() {
        assert_eq!(normalize_backend(" SQLite ").unwrap(), BackendKind::Sqlite);
        assert_eq!(normalize_backend("json").unwrap(), BackendKind::File);
        assert!(normalize_backend("redis").unwrap_err().contains("unsupported"));
    }
}
