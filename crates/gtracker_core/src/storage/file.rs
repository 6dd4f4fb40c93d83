//! Directory-backed slot storage: one `<key>.json` file per slot.
//!
//! # Invariants
//! - Writes go to `<key>.json.tmp` and are renamed over the slot file, so a
//!   crash mid-write never leaves a truncated slot behind.
//! - Slot copies are byte-exact, including files that are not UTF-8.

use super::{validate_key, StorageBackend, StorageError, StorageResult};
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SLOT_EXTENSION: &str = "json";

/// Slot storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens (and creates when missing) the storage directory.
    pub fn open(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            key: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path backing `key`.
    pub fn slot_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{SLOT_EXTENSION}")))
    }

    fn read_bytes(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let path = self.slot_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn write_bytes(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.slot_path(key)?;
        let tmp_path = path.with_extension(format!("{SLOT_EXTENSION}.tmp"));
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        fs::write(&tmp_path, bytes).map_err(io_err)?;
        fs::rename(&tmp_path, &path).map_err(io_err)?;
        debug!(
            "event=slot_write module=storage status=ok backend=file bytes={}",
            bytes.len()
        );
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn kind(&self) -> &'static str {
        "file"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let Some(bytes) = self.read_bytes(key)? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| StorageError::InvalidEncoding {
                key: key.to_string(),
            })
    }

    fn set(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.write_bytes(key, value.as_bytes())
    }

    fn remove(&mut self, key: &str) -> StorageResult<()> {
        let path = self.slot_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    fn contains(&self, key: &str) -> StorageResult<bool> {
        let path = self.slot_path(key)?;
        path.try_exists().map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })
    }

    fn copy(&mut self, from: &str, to: &str) -> StorageResult<bool> {
        match self.read_bytes(from)? {
            Some(bytes) => {
                self.write_bytes(to, &bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn same_value(&self, left: &str, right: &str) -> StorageResult<bool> {
        Ok(self.read_bytes(left)? == self.read_bytes(right)?)
    }
}
