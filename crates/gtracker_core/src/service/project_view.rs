//! Read-side projections for presentation layers.
//!
//! # Responsibility
//! - Turn stored projects into display rows with derived check-in state.
//! - Derive favicon URLs from website links.
//!
//! # Invariants
//! - Nothing here mutates or persists state.
//! - `derive_favicon_url` never panics and returns `""` when it cannot derive
//!   an origin.

use crate::model::project::Project;
use once_cell::sync::Lazy;
use regex::Regex;

static ORIGIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(https?)://(?:[^/?#@\s]*@)?(\[[0-9a-f:.]+\]|[^/?#:@\[\]\s]+)(?::([0-9]*))?(?:[/?#]\S*)?$")
        .expect("valid origin regex")
});

/// Check column glyph when the window is open.
pub const CHECKED_LABEL: &str = "✔";
/// Check column glyph otherwise.
pub const UNCHECKED_LABEL: &str = "✘";

/// One rendered table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRow {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub kind: &'static str,
    pub chain: &'static str,
    pub status: &'static str,
    /// Cost formatted as `$<amount>`.
    pub cost: String,
    pub twitter: String,
    pub website: String,
    pub checked: bool,
    pub check_label: &'static str,
    pub check_hint: &'static str,
    /// Empty when the project has no usable website.
    pub favicon_url: String,
}

/// Builds display rows, evaluating check-in state against `now_ms`.
pub fn project_rows(projects: &[Project], now_ms: i64) -> Vec<ProjectRow> {
    projects
        .iter()
        .enumerate()
        .map(|(index, project)| {
            let checked = project.is_checked(now_ms);
            ProjectRow {
                index,
                id: project.id.to_string(),
                name: project.name.clone(),
                kind: project.kind.label(),
                chain: project.chain.label(),
                status: project.status.label(),
                cost: format_cost(project.cost),
                twitter: project.twitter.clone(),
                website: project.website.clone(),
                checked,
                check_label: if checked { CHECKED_LABEL } else { UNCHECKED_LABEL },
                check_hint: if checked {
                    "Checked (click to reset)"
                } else {
                    "Not checked (click to check)"
                },
                favicon_url: derive_favicon_url(&project.website),
            }
        })
        .collect()
}

/// Formats a cost the way the dashboard prints it: `$3`, `$12.5`.
pub fn format_cost(cost: f64) -> String {
    format!("${cost}")
}

/// Returns `{origin}/favicon.ico` for an http(s) URL, or `""`.
///
/// Scheme and host are lower-cased, userinfo, path, query and fragment are
/// dropped, and default ports (80/443) are omitted.
pub fn derive_favicon_url(url: &str) -> String {
    let Some(captures) = ORIGIN_RE.captures(url.trim()) else {
        return String::new();
    };
    let (Some(scheme), Some(host)) = (captures.get(1), captures.get(2)) else {
        return String::new();
    };
    let scheme = scheme.as_str().to_ascii_lowercase();
    let host = host.as_str().to_ascii_lowercase();

    let port = match captures.get(3).map(|port| port.as_str()) {
        None | Some("") => None,
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => return String::new(),
        },
    };
    let default_port = if scheme == "https" { 443 } else { 80 };

    match port {
        Some(port) if port != default_port => format!("{scheme}://{host}:{port}/favicon.ico"),
        _ => format!("{scheme}://{host}/favicon.ico"),
    }
}
