//! Core domain logic for GTracker.
//! This crate is the single source of truth for project list invariants.

pub mod clock;
pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{normalize_backend, BackendKind, ConfigError, TrackerConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::project::{
    is_checked, is_valid_link, Chain, Project, ProjectDraft, ProjectId, ProjectStatus,
    ProjectType, ValidationError, CHECK_WINDOW_MS,
};
pub use repo::project_repo::{
    ProjectRepository, RepoError, RepoResult, SlotProjectRepository, DEFAULT_STORAGE_KEY,
};
pub use service::project_store::{ProjectStore, StoreError, StoreResult, SubmitOutcome};
pub use service::project_view::{derive_favicon_url, format_cost, project_rows, ProjectRow};
pub use storage::{
    FileStorage, MemoryStorage, SqliteStorage, StorageBackend, StorageError, StorageResult,
    SLOT_SCHEMA_VERSION,
};

/// Store type assembled from a runtime-selected backend.
pub type DynProjectStore =
    ProjectStore<SlotProjectRepository<Box<dyn StorageBackend>>, SystemClock>;

/// Opens the store described by `config` with the system clock.
///
/// Read failures are absorbed by `ProjectStore::open` and reported through
/// `startup_warning()`; only backend setup failures are returned here.
pub fn open_store(config: &TrackerConfig) -> Result<DynProjectStore, StoreError> {
    let storage = config
        .open_storage()
        .map_err(|err| StoreError::StorageRead(RepoError::Storage(err)))?;
    let repo = SlotProjectRepository::with_key(storage, config.storage_key.clone())
        .map_err(StoreError::StorageRead)?;
    Ok(ProjectStore::open(repo, SystemClock))
}

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
