//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the dashboard's presentation boundary (list, submit, delete
//!   confirmation, check toggle, favicon) as sync functions.
//! - Keep error semantics simple: envelopes with `ok` and a user message.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Every call opens the store, applies one operation and persists before
//!   returning; no state is cached between calls.
//! - Deletion only happens when the caller passes `confirmed = true`.
//! - A given startup warning is reported once per process, not on every
//!   reopen.

use gtracker_core::{
    core_version as core_version_inner, derive_favicon_url, init_logging as init_logging_inner,
    normalize_backend, open_store, ping as ping_inner, project_rows, BackendKind, Chain,
    DynProjectStore, ProjectDraft, ProjectRow, ProjectStatus, ProjectType, StoreError,
    SubmitOutcome, TrackerConfig,
};
use log::warn;
use std::sync::{Mutex, OnceLock, PoisonError};

static STORE_CONFIG: OnceLock<TrackerConfig> = OnceLock::new();
static LAST_REPORTED_WARNING: Mutex<Option<String>> = Mutex::new(None);

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.trim()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Points the store at an app data directory.
///
/// Input semantics:
/// - `data_dir`: directory holding the project slot (and optional
///   `gtracker.json`).
/// - `backend`: `file` or `sqlite`; `memory` is rejected because every call
///   reopens the store.
///
/// # FFI contract
/// - First successful call wins; repeating it with the same values is a no-op.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_store(data_dir: String, backend: String) -> String {
    let trimmed = data_dir.trim();
    if trimmed.is_empty() {
        return "data_dir cannot be empty".to_string();
    }
    let backend = match normalize_backend(&backend) {
        Ok(BackendKind::Memory) => {
            return "memory backend cannot persist across calls".to_string();
        }
        Ok(kind) => kind,
        Err(err) => return err,
    };
    let mut config = match TrackerConfig::load(trimmed) {
        Ok(config) => config,
        Err(err) => return err.to_string(),
    };
    config.backend = backend;

    let active = STORE_CONFIG.get_or_init(|| config.clone());
    if *active == config {
        String::new()
    } else {
        format!(
            "store already configured at `{}` ({}); refusing to switch",
            active.data_dir.display(),
            active.backend.as_str()
        )
    }
}

/// Form values submitted from the add/edit dialog.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInput {
    pub name: String,
    /// `Testnet|DePin|Point|MiniApp|Wallet`.
    pub kind: String,
    /// `Ethereum|Solana|BNB|Base|Polygon|OP|Other`.
    pub chain: String,
    /// `Waitlist|Early Access|Active|Snapshot|Claim|End`.
    pub status: String,
    pub cost: f64,
    pub twitter: String,
    pub website: String,
    /// Preserved when editing so an open check-in survives the edit.
    pub checked_until: Option<i64>,
}

/// One table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    pub index: u32,
    pub id: String,
    pub name: String,
    pub kind: String,
    pub chain: String,
    pub status: String,
    pub cost_label: String,
    pub twitter: String,
    pub website: String,
    pub checked: bool,
    pub check_label: String,
    pub check_hint: String,
    pub favicon_url: String,
    pub checked_until: Option<i64>,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectListResponse {
    pub items: Vec<ProjectItem>,
    /// Human-readable status, e.g. "No projects available".
    pub message: String,
    /// Startup read problem the user should see once; empty otherwise.
    pub warning: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectActionResponse {
    pub ok: bool,
    /// Position of the affected project after the operation.
    pub index: Option<u32>,
    pub project_id: Option<String>,
    /// Human-readable response message for the UI.
    pub message: String,
}

impl ProjectActionResponse {
    fn success(message: impl Into<String>, index: Option<usize>, project_id: Option<String>) -> Self {
        Self {
            ok: true,
            index: index.and_then(|value| u32::try_from(value).ok()),
            project_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            index: None,
            project_id: None,
            message: message.into(),
        }
    }
}

/// Returns the current project list with derived check-in state.
///
/// # FFI contract
/// - Sync call, storage-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn list_projects() -> ProjectListResponse {
    let store = match open_configured_store() {
        Ok(store) => store,
        Err(err) => {
            return ProjectListResponse {
                items: Vec::new(),
                message: format!("list_projects failed: {err}"),
                warning: String::new(),
            };
        }
    };

    let items = project_rows(store.get_all(), store.now_ms())
        .into_iter()
        .zip(store.get_all())
        .map(|(row, project)| to_project_item(row, project.checked_until))
        .collect::<Vec<_>>();
    let message = if items.is_empty() {
        "No projects available".to_string()
    } else {
        format!("{} project(s).", items.len())
    };
    ProjectListResponse {
        items,
        message,
        warning: unreported_warning(&store),
    }
}

/// Saves the dialog form: adds when `editing_index` is `None`, updates the
/// row at `editing_index` otherwise.
///
/// # FFI contract
/// - Validation failures return `ok = false` with the user-facing message.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn submit_project(input: ProjectInput, editing_index: Option<u32>) -> ProjectActionResponse {
    let draft = match to_draft(input) {
        Ok(draft) => draft,
        Err(message) => return ProjectActionResponse::failure(message),
    };
    let mut store = match open_configured_store() {
        Ok(store) => store,
        Err(err) => return ProjectActionResponse::failure(format!("submit_project failed: {err}")),
    };

    match store.submit(draft, editing_index.map(|index| index as usize)) {
        Ok(SubmitOutcome::Added { index }) => {
            ProjectActionResponse::success("Project added.", Some(index), id_at(&store, index))
        }
        Ok(SubmitOutcome::Updated { index }) => {
            ProjectActionResponse::success("Project updated.", Some(index), id_at(&store, index))
        }
        Err(err) => failure_from(&err),
    }
}

/// Deletes the row at `index` after the UI obtained user confirmation.
///
/// # FFI contract
/// - `confirmed = false` never mutates and reports `ok = true`.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn request_delete_project(index: u32, confirmed: bool) -> ProjectActionResponse {
    let mut store = match open_configured_store() {
        Ok(store) => store,
        Err(err) => {
            return ProjectActionResponse::failure(format!("request_delete_project failed: {err}"))
        }
    };

    match store.delete(index as usize, |_| confirmed) {
        Ok(Some(removed)) => ProjectActionResponse::success(
            "Project deleted.",
            Some(index as usize),
            Some(removed.id.to_string()),
        ),
        Ok(None) => ProjectActionResponse::success("Delete cancelled.", None, None),
        Err(err) => failure_from(&err),
    }
}

/// Toggles the 24-hour check-in of the row at `index`.
#[flutter_rust_bridge::frb(sync)]
pub fn toggle_project_check(index: u32) -> ProjectActionResponse {
    let mut store = match open_configured_store() {
        Ok(store) => store,
        Err(err) => {
            return ProjectActionResponse::failure(format!("toggle_project_check failed: {err}"))
        }
    };

    let now = store.now_ms();
    match store.toggle_check(index as usize) {
        Ok(project) => {
            let message = if project.is_checked(now) {
                "Checked for 24 hours."
            } else {
                "Check reset."
            };
            let id = project.id.to_string();
            ProjectActionResponse::success(message, Some(index as usize), Some(id))
        }
        Err(err) => failure_from(&err),
    }
}

/// Best-effort `{origin}/favicon.ico`; empty string when unparsable.
#[flutter_rust_bridge::frb(sync)]
pub fn favicon_url(website: String) -> String {
    derive_favicon_url(&website)
}

fn resolve_store_config() -> &'static TrackerConfig {
    STORE_CONFIG.get_or_init(TrackerConfig::default)
}

fn open_configured_store() -> Result<DynProjectStore, StoreError> {
    open_store(resolve_store_config())
}

fn unreported_warning(store: &DynProjectStore) -> String {
    let mut last = LAST_REPORTED_WARNING
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let Some(err) = store.startup_warning() else {
        *last = None;
        return String::new();
    };

    let detail = err.to_string();
    if last.as_deref() == Some(detail.as_str()) {
        return String::new();
    }
    *last = Some(detail);
    err.user_message()
}

fn to_draft(input: ProjectInput) -> Result<ProjectDraft, String> {
    let kind = ProjectType::parse(&input.kind)
        .ok_or_else(|| format!("Unknown project type `{}`", input.kind))?;
    let chain =
        Chain::parse(&input.chain).ok_or_else(|| format!("Unknown chain `{}`", input.chain))?;
    let status = ProjectStatus::parse(&input.status)
        .ok_or_else(|| format!("Unknown status `{}`", input.status))?;

    let mut draft = ProjectDraft::new(input.name.trim(), kind, chain, status);
    draft.cost = input.cost;
    draft.twitter = input.twitter.trim().to_string();
    draft.website = input.website.trim().to_string();
    draft.checked_until = input.checked_until;
    Ok(draft)
}

fn failure_from(err: &StoreError) -> ProjectActionResponse {
    if !matches!(err, StoreError::Validation(_)) {
        warn!("event=ffi_call module=ffi status=error error={err}");
    }
    ProjectActionResponse::failure(err.user_message())
}

fn id_at(store: &DynProjectStore, index: usize) -> Option<String> {
    store.get(index).map(|project| project.id.to_string())
}

fn to_project_item(row: ProjectRow, checked_until: Option<i64>) -> ProjectItem {
    ProjectItem {
        index: u32::try_from(row.index).unwrap_or(u32::MAX),
        id: row.id,
        name: row.name,
        kind: row.kind.to_string(),
        chain: row.chain.to_string(),
        status: row.status.to_string(),
        cost_label: row.cost,
        twitter: row.twitter,
        website: row.website,
        checked: row.checked,
        check_label: row.check_label.to_string(),
        check_hint: row.check_hint.to_string(),
        favicon_url: row.favicon_url,
        checked_until,
    }
}
