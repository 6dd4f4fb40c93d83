//! Named key-value slot storage.
//!
//! # Responsibility
//! - Model the durable single-writer slot store the project list lives in.
//! - Offer interchangeable memory, file and SQLite backends behind one trait.
//!
//! # Invariants
//! - `set` replaces the full slot value; there are no partial writes.
//! - `get` on a missing slot returns `Ok(None)`, never an error.
//! - Slot keys are restricted to `[A-Za-z0-9._-]` so every backend can map
//!   them without escaping.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod file;
mod memory;
mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::{SqliteStorage, SLOT_SCHEMA_VERSION};

pub type StorageResult<T> = Result<T, StorageError>;

/// Backend-level failure for slot reads and writes.
#[derive(Debug)]
pub enum StorageError {
    /// Key is empty or contains characters outside `[A-Za-z0-9._-]`.
    InvalidKey(String),
    /// Filesystem failure on the slot file.
    Io {
        key: String,
        source: std::io::Error,
    },
    /// Slot file exists but is not UTF-8 text.
    InvalidEncoding { key: String },
    /// SQLite failure on the slot table.
    Sqlite(rusqlite::Error),
    /// Database was written by a newer slot table layout.
    UnsupportedSchema { found: u32, supported: u32 },
    /// Write would exceed the configured byte quota.
    QuotaExceeded {
        key: String,
        required: usize,
        quota: usize,
    },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(key) => write!(f, "invalid storage key `{key}`"),
            Self::Io { key, source } => write!(f, "storage slot `{key}` i/o failed: {source}"),
            Self::InvalidEncoding { key } => {
                write!(f, "storage slot `{key}` does not hold UTF-8 text")
            }
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchema { found, supported } => write!(
                f,
                "slot database layout version {found} is newer than supported {supported}"
            ),
            Self::QuotaExceeded {
                key,
                required,
                quota,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: {required} bytes needed, quota is {quota}"
            ),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::InvalidKey(_)
            | Self::InvalidEncoding { .. }
            | Self::UnsupportedSchema { .. }
            | Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Durable named-slot storage.
pub trait StorageBackend {
    /// Short backend label used in log events.
    fn kind(&self) -> &'static str;
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&mut self, key: &str) -> StorageResult<()>;

    /// Whether `key` currently holds a value, readable or not.
    fn contains(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Copies the raw value of `from` into `to`. Returns `false` when `from`
    /// is empty.
    fn copy(&mut self, from: &str, to: &str) -> StorageResult<bool> {
        match self.get(from)? {
            Some(value) => {
                self.set(to, &value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether both slots hold byte-identical values.
    fn same_value(&self, left: &str, right: &str) -> StorageResult<bool> {
        Ok(self.get(left)? == self.get(right)?)
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for &mut S {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        (**self).contains(key)
    }

    fn copy(&mut self, from: &str, to: &str) -> StorageResult<bool> {
        (**self).copy(from, to)
    }

    fn same_value(&self, left: &str, right: &str) -> StorageResult<bool> {
        (**self).same_value(left, right)
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for Box<S> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        (**self).contains(key)
    }

    fn copy(&mut self, from: &str, to: &str) -> StorageResult<bool> {
        (**self).copy(from, to)
    }

    fn same_value(&self, left: &str, right: &str) -> StorageResult<bool> {
        (**self).same_value(left, right)
    }
}

/// Rejects keys that cannot be used verbatim as a file name or row key.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
