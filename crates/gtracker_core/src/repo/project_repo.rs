//! Project list repository contract and slot-backed implementation.
//!
//! # Responsibility
//! - Serialize `Vec<Project>` as a JSON array under a named slot.
//! - Preserve unreadable payloads before they can be overwritten.
//!
//! # Invariants
//! - A missing slot decodes as `Ok(None)`; an unreadable one as an error.
//! - Every decoded record passes `Project::validate()`.
//! - Decoded ids are unique; later duplicates are re-derived.
//! - Ids filled in for legacy or duplicate entries depend only on the payload,
//!   so repeated reads of the same slot agree on them.
//! - Quarantine never overwrites an earlier backup holding other content.

use crate::model::project::{Project, ValidationError};
use crate::storage::{validate_key, StorageBackend, StorageError};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Slot name used by the original dashboard.
pub const DEFAULT_STORAGE_KEY: &str = "projects";
/// Suffix appended to the slot key when quarantining an unreadable payload.
pub const QUARANTINE_SUFFIX: &str = ".corrupt";
/// Backup slots tried per key before quarantine gives up.
pub const MAX_QUARANTINE_SLOTS: usize = 16;

const LEGACY_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6a3f_1c2e_94b7_4d0a_8e51_27c9_f0d4_b613);

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for project list persistence.
#[derive(Debug)]
pub enum RepoError {
    Storage(StorageError),
    /// Slot holds a value that is not a JSON project array.
    Malformed {
        key: String,
        source: serde_json::Error,
    },
    /// Slot decodes but one record violates field validation.
    InvalidRecord {
        index: usize,
        source: ValidationError,
    },
    Encode(serde_json::Error),
    /// Every backup slot for `key` already holds a different payload.
    QuarantineFull { key: String },
    /// The slot could not be read or preserved, so it must not be
    /// overwritten.
    Unpreserved,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::Malformed { key, source } => {
                write!(f, "storage slot `{key}` is not a valid project list: {source}")
            }
            Self::InvalidRecord { index, source } => {
                write!(f, "persisted project at index {index} is invalid: {source}")
            }
            Self::Encode(err) => write!(f, "failed to encode project list: {err}"),
            Self::QuarantineFull { key } => {
                write!(f, "no free backup slot left for `{key}`")
            }
            Self::Unpreserved => write!(
                f,
                "persisted project list was neither read nor backed up; writes are blocked"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::Malformed { source, .. } => Some(source),
            Self::InvalidRecord { source, .. } => Some(source),
            Self::Encode(err) => Some(err),
            Self::QuarantineFull { .. } | Self::Unpreserved => None,
        }
    }
}

impl From<StorageError> for RepoError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Persistence contract for the whole project list.
pub trait ProjectRepository {
    /// Returns `None` when nothing has been persisted yet.
    fn load_projects(&self) -> RepoResult<Option<Vec<Project>>>;
    fn save_projects(&mut self, projects: &[Project]) -> RepoResult<()>;
    /// Copies the raw slot payload aside and returns the backup key, or
    /// `None` when the slot is empty. A backup already holding the same
    /// payload is reused.
    fn quarantine(&mut self) -> RepoResult<Option<String>>;
}

/// Repository storing the list as JSON in one storage slot.
pub struct SlotProjectRepository<S: StorageBackend> {
    storage: S,
    key: String,
}

impl<S: StorageBackend> SlotProjectRepository<S> {
    /// Uses the default `projects` slot.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }

    /// Uses a caller-chosen slot key.
    ///
    /// # Errors
    /// - Returns `StorageError::InvalidKey` for keys outside `[A-Za-z0-9._-]`.
    pub fn with_key(storage: S, key: impl Into<String>) -> RepoResult<Self> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Self { storage, key })
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

impl<S: StorageBackend> ProjectRepository for SlotProjectRepository<S> {
    fn load_projects(&self) -> RepoResult<Option<Vec<Project>>> {
        let Some(raw) = self.storage.get(&self.key)? else {
            debug!(
                "event=slot_read module=repo status=empty backend={}",
                self.storage.kind()
            );
            return Ok(None);
        };
        let projects = decode_projects(&self.key, &raw)?;
        debug!(
            "event=slot_read module=repo status=ok backend={} bytes={} count={}",
            self.storage.kind(),
            raw.len(),
            projects.len()
        );
        Ok(Some(projects))
    }

    fn save_projects(&mut self, projects: &[Project]) -> RepoResult<()> {
        let encoded = serde_json::to_string(projects).map_err(RepoError::Encode)?;
        self.storage.set(&self.key, &encoded)?;
        debug!(
            "event=slot_write module=repo status=ok backend={} bytes={} count={}",
            self.storage.kind(),
            encoded.len(),
            projects.len()
        );
        Ok(())
    }

    fn quarantine(&mut self) -> RepoResult<Option<String>> {
        if !self.storage.contains(&self.key)? {
            return Ok(None);
        }

        for attempt in 0..MAX_QUARANTINE_SLOTS {
            let backup_key = quarantine_key(&self.key, attempt);
            if !self.storage.contains(&backup_key)? {
                self.storage.copy(&self.key, &backup_key)?;
                warn!(
                    "event=slot_quarantine module=repo status=ok backend={} backup_key={}",
                    self.storage.kind(),
                    backup_key
                );
                return Ok(Some(backup_key));
            }
            if self.storage.same_value(&self.key, &backup_key)? {
                return Ok(Some(backup_key));
            }
        }

        Err(RepoError::QuarantineFull {
            key: self.key.clone(),
        })
    }
}

/// Backup slot name for the given attempt: `<key>.corrupt`, then
/// `<key>.corrupt.1`, `<key>.corrupt.2`, ...
pub fn quarantine_key(key: &str, attempt: usize) -> String {
    if attempt == 0 {
        format!("{key}{QUARANTINE_SUFFIX}")
    } else {
        format!("{key}{QUARANTINE_SUFFIX}.{attempt}")
    }
}

/// Decodes and validates a raw slot payload.
pub fn decode_projects(key: &str, raw: &str) -> RepoResult<Vec<Project>> {
    let malformed = |source| RepoError::Malformed {
        key: key.to_string(),
        source,
    };
    let records: Vec<Value> = serde_json::from_str(raw).map_err(malformed)?;

    let mut projects = Vec::with_capacity(records.len());
    let mut filled = 0;
    for (index, mut record) in records.into_iter().enumerate() {
        if record.is_object() && record.get("id").is_none() {
            let id = derived_id(index, &record);
            if let Some(fields) = record.as_object_mut() {
                fields.insert("id".to_string(), Value::String(id.to_string()));
                filled += 1;
            }
        }
        let project: Project = serde_json::from_value(record).map_err(malformed)?;
        project
            .validate()
            .map_err(|source| RepoError::InvalidRecord { index, source })?;
        projects.push(project);
    }

    let reassigned = reassign_duplicate_ids(&mut projects);
    if filled > 0 || reassigned > 0 {
        warn!(
            "event=project_load module=repo status=fixup missing_ids={filled} duplicate_ids={reassigned}"
        );
    }

    Ok(projects)
}

// Name-based ids: the same record at the same position always maps to the
// same id until the list is saved with explicit ids.
fn derived_id(index: usize, record: &Value) -> Uuid {
    let seed = format!("{index}:{record}");
    Uuid::new_v5(&LEGACY_ID_NAMESPACE, seed.as_bytes())
}

fn reassign_duplicate_ids(projects: &mut [Project]) -> usize {
    let mut seen = HashSet::with_capacity(projects.len());
    let mut reassigned = 0;
    for (index, project) in projects.iter_mut().enumerate() {
        if seen.insert(project.id) {
            continue;
        }
        let mut salt = 0usize;
        let mut candidate = project.id;
        while seen.contains(&candidate) {
            let seed = format!("{index}:{salt}:{}", project.id);
            candidate = Uuid::new_v5(&LEGACY_ID_NAMESPACE, seed.as_bytes());
            salt += 1;
        }
        project.id = candidate;
        seen.insert(candidate);
        reassigned += 1;
    }
    reassigned
}
