//! Project list store.
//!
//! # Responsibility
//! - Hold the authoritative in-memory project list.
//! - Validate and apply add/update/delete/toggle mutations.
//! - Re-persist the full list after every mutation.
//!
//! # Invariants
//! - Validation failures and out-of-range indices abort before any mutation.
//! - A failed write keeps the in-memory change and marks the store dirty;
//!   nothing retries automatically.
//! - After a failed read the slot is only written again once its payload has
//!   been backed up or a later `load()` succeeds.
//! - Deletion only happens after the caller's confirmation returns `true`.
//! - Check-in state is derived from `checked_until` and the injected clock on
//!   every read.

use crate::clock::{Clock, SystemClock};
use crate::model::project::{
    Project, ProjectDraft, ProjectId, ValidationError, CHECK_WINDOW_MS,
};
use crate::repo::project_repo::{ProjectRepository, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// Submitted record failed field validation; nothing was changed.
    Validation(ValidationError),
    /// Index does not address an existing record. Indicates a caller bug.
    OutOfRange { index: usize, len: usize },
    /// Persisted list could not be read or decoded.
    StorageRead(RepoError),
    /// Persisting the list failed; the in-memory change is kept.
    StorageWrite(RepoError),
}

impl StoreError {
    /// Message suitable for showing directly to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(err) => err.user_message().to_string(),
            Self::OutOfRange { .. } => "That project no longer exists.".to_string(),
            Self::StorageRead(RepoError::Unpreserved) => {
                "Saved projects could not be read or backed up; changes are disabled.".to_string()
            }
            Self::StorageRead(_) => {
                "Saved projects could not be read; starting with an empty list.".to_string()
            }
            Self::StorageWrite(_) => {
                "Changes could not be saved and may be lost on reload.".to_string()
            }
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::OutOfRange { index, len } => {
                write!(f, "project index {index} out of range for list of {len}")
            }
            Self::StorageRead(err) => write!(f, "failed to read projects: {err}"),
            Self::StorageWrite(err) => write!(f, "failed to save projects: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::OutOfRange { .. } => None,
            Self::StorageRead(err) | Self::StorageWrite(err) => Some(err),
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Result of routing a form submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Added { index: usize },
    Updated { index: usize },
}

/// Single source of truth for the tracked project list.
pub struct ProjectStore<R: ProjectRepository, C: Clock = SystemClock> {
    repo: R,
    clock: C,
    projects: Vec<Project>,
    dirty: bool,
    writes_blocked: bool,
    startup_warning: Option<StoreError>,
}

impl<R: ProjectRepository, C: Clock> ProjectStore<R, C> {
    /// Creates an empty store without touching storage.
    pub fn new(repo: R, clock: C) -> Self {
        Self {
            repo,
            clock,
            projects: Vec::new(),
            dirty: false,
            writes_blocked: false,
            startup_warning: None,
        }
    }

    /// Creates a store and loads the persisted list once.
    ///
    /// A read failure does not abort startup: it is logged, the unreadable
    /// payload is copied to `<key>.corrupt`, the store starts empty and the
    /// failure is kept in `startup_warning()`. When the payload cannot be
    /// copied, mutations fail until a `load()` succeeds.
    pub fn open(repo: R, clock: C) -> Self {
        let mut store = Self::new(repo, clock);
        let loaded = store.load().map(|_| ());
        if let Err(err) = loaded {
            warn!("event=store_open module=store status=degraded error={err}");
            match store.repo.quarantine() {
                Ok(Some(backup_key)) => {
                    store.writes_blocked = false;
                    info!("event=store_quarantine module=store status=ok backup_key={backup_key}");
                }
                Ok(None) => store.writes_blocked = false,
                Err(quarantine_err) => {
                    error!(
                        "event=store_quarantine module=store status=error writes_blocked=true error={quarantine_err}"
                    );
                }
            }
            store.startup_warning = Some(err);
        }
        store
    }

    /// Replaces the in-memory list with the persisted one.
    ///
    /// # Errors
    /// - `StorageRead` when the slot is unreadable or malformed; the in-memory
    ///   list is left empty and mutations fail until a later load succeeds.
    pub fn load(&mut self) -> StoreResult<&[Project]> {
        self.dirty = false;
        match self.repo.load_projects() {
            Ok(loaded) => {
                self.projects = loaded.unwrap_or_default();
                self.writes_blocked = false;
                info!(
                    "event=project_load module=store status=ok count={}",
                    self.projects.len()
                );
                Ok(&self.projects)
            }
            Err(err) => {
                self.projects.clear();
                self.writes_blocked = true;
                error!("event=project_load module=store status=error error={err}");
                Err(StoreError::StorageRead(err))
            }
        }
    }

    /// Checks cost and link fields without side effects.
    pub fn validate(&self, draft: &ProjectDraft) -> Result<(), ValidationError> {
        draft.validate()
    }

    /// Current in-memory snapshot.
    pub fn get_all(&self) -> &[Project] {
        &self.projects
    }

    pub fn get(&self, index: usize) -> Option<&Project> {
        self.projects.get(index)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Resolves a stable id to its current position.
    pub fn position(&self, id: ProjectId) -> Option<usize> {
        self.projects.iter().position(|project| project.id == id)
    }

    /// Current time according to the injected clock.
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Whether the record at `index` is checked right now.
    pub fn is_checked(&self, index: usize) -> StoreResult<bool> {
        let now = self.clock.now_ms();
        Ok(self.project_at(index)?.is_checked(now))
    }

    /// Appends a validated record under a fresh id and persists.
    ///
    /// Duplicate names are accepted.
    pub fn add(&mut self, draft: ProjectDraft) -> StoreResult<&[Project]> {
        self.ensure_writable("project_add")?;
        if let Err(err) = draft.validate() {
            reject("project_add", err);
            return Err(err.into());
        }

        self.projects.push(Project::from_draft(Uuid::new_v4(), draft));
        self.persist("project_add")?;
        Ok(&self.projects)
    }

    /// Replaces the record at `index` in place, keeping its id, and persists.
    pub fn update(&mut self, index: usize, draft: ProjectDraft) -> StoreResult<&[Project]> {
        self.ensure_writable("project_update")?;
        if let Err(err) = draft.validate() {
            reject("project_update", err);
            return Err(err.into());
        }
        let id = self.project_at(index)?.id;

        self.projects[index] = Project::from_draft(id, draft);
        self.persist("project_update")?;
        Ok(&self.projects)
    }

    /// Removes the record at `index` once `confirm` approves it.
    ///
    /// Returns `Ok(None)` and leaves the list untouched when the confirmation
    /// is declined. Records after `index` shift down by one.
    pub fn delete(
        &mut self,
        index: usize,
        confirm: impl FnOnce(&Project) -> bool,
    ) -> StoreResult<Option<Project>> {
        self.ensure_writable("project_delete")?;
        let target = self.project_at(index)?;
        if !confirm(target) {
            info!("event=project_delete module=store status=declined index={index}");
            return Ok(None);
        }

        let removed = self.projects.remove(index);
        self.persist("project_delete")?;
        Ok(Some(removed))
    }

    /// Flips the check-in state of the record at `index` and persists.
    ///
    /// Checked records reset to `0`; anything else is checked until
    /// `now + 24h`.
    pub fn toggle_check(&mut self, index: usize) -> StoreResult<&Project> {
        self.ensure_writable("project_toggle_check")?;
        let now = self.clock.now_ms();
        let len = self.projects.len();
        let project = self
            .projects
            .get_mut(index)
            .ok_or(StoreError::OutOfRange { index, len })?;

        project.checked_until = if project.is_checked(now) {
            Some(0)
        } else {
            Some(now.saturating_add(CHECK_WINDOW_MS))
        };

        self.persist("project_toggle_check")?;
        Ok(&self.projects[index])
    }

    /// Routes a form submit to `add` or `update`.
    pub fn submit(
        &mut self,
        draft: ProjectDraft,
        editing_index: Option<usize>,
    ) -> StoreResult<SubmitOutcome> {
        match editing_index {
            Some(index) => {
                self.update(index, draft)?;
                Ok(SubmitOutcome::Updated { index })
            }
            None => {
                self.add(draft)?;
                Ok(SubmitOutcome::Added {
                    index: self.projects.len() - 1,
                })
            }
        }
    }

    /// Whether the in-memory list has changes that failed to persist.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read failure captured by `open()`, if any.
    pub fn startup_warning(&self) -> Option<&StoreError> {
        self.startup_warning.as_ref()
    }

    /// Re-saves the in-memory list on explicit caller request.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.ensure_writable("project_flush")?;
        self.persist("project_flush")
    }

    /// Whether mutations are refused because the persisted list was neither
    /// read nor backed up.
    pub fn is_write_blocked(&self) -> bool {
        self.writes_blocked
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repo
    }

    fn ensure_writable(&self, event: &str) -> StoreResult<()> {
        if !self.writes_blocked {
            return Ok(());
        }
        warn!("event={event} module=store status=rejected error_code=writes_blocked");
        Err(StoreError::StorageRead(RepoError::Unpreserved))
    }

    fn project_at(&self, index: usize) -> StoreResult<&Project> {
        self.projects.get(index).ok_or(StoreError::OutOfRange {
            index,
            len: self.projects.len(),
        })
    }

    fn persist(&mut self, event: &str) -> StoreResult<()> {
        match self.repo.save_projects(&self.projects) {
            Ok(()) => {
                self.dirty = false;
                info!(
                    "event={} module=store status=ok count={}",
                    event,
                    self.projects.len()
                );
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                error!(
                    "event={} module=store status=error error_code=storage_write_failed count={} error={}",
                    event,
                    self.projects.len(),
                    err
                );
                Err(StoreError::StorageWrite(err))
            }
        }
    }
}

fn reject(event: &str, err: ValidationError) {
    warn!(
        "event={} module=store status=rejected error_code={}",
        event,
        err.code()
    );
}
