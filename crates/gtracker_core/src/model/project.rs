//! Project domain model.
//!
//! # Responsibility
//! - Define the persisted project record and the enums it is built from.
//! - Validate cost and link fields before any write reaches storage.
//! - Derive checked/unchecked state from the stored check-in deadline.
//!
//! # Invariants
//! - `cost` is finite and `>= 0` for every record accepted by `validate()`.
//! - `twitter`/`website` are empty or match `^https?://.+$`.
//! - `checked_until` of `None`, `0` or any past instant means "not checked".

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Length of one check-in window in milliseconds (24 hours).
pub const CHECK_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\n\r\x{2028}\x{2029}]+$").expect("valid link regex"));

/// Stable identifier assigned to a project when it is first added.
pub type ProjectId = Uuid;

/// Project category shown in the dashboard `Type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectType {
    Testnet,
    DePin,
    Point,
    MiniApp,
    Wallet,
}

impl ProjectType {
    pub const ALL: [ProjectType; 5] = [
        ProjectType::Testnet,
        ProjectType::DePin,
        ProjectType::Point,
        ProjectType::MiniApp,
        ProjectType::Wallet,
    ];

    /// Returns the wire/display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Testnet => "Testnet",
            Self::DePin => "DePin",
            Self::Point => "Point",
            Self::MiniApp => "MiniApp",
            Self::Wallet => "Wallet",
        }
    }

    /// Parses a label case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(value.trim()))
    }
}

/// Chain the project lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Ethereum,
    Solana,
    #[serde(rename = "BNB")]
    Bnb,
    Base,
    Polygon,
    #[serde(rename = "OP")]
    Op,
    Other,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Solana,
        Chain::Bnb,
        Chain::Base,
        Chain::Polygon,
        Chain::Op,
        Chain::Other,
    ];

    /// Returns the wire/display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ethereum => "Ethereum",
            Self::Solana => "Solana",
            Self::Bnb => "BNB",
            Self::Base => "Base",
            Self::Polygon => "Polygon",
            Self::Op => "OP",
            Self::Other => "Other",
        }
    }

    /// Parses a label case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|chain| chain.label().eq_ignore_ascii_case(value.trim()))
    }
}

/// Participation stage of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectStatus {
    Waitlist,
    #[serde(rename = "Early Access")]
    EarlyAccess,
    Active,
    Snapshot,
    Claim,
    End,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 6] = [
        ProjectStatus::Waitlist,
        ProjectStatus::EarlyAccess,
        ProjectStatus::Active,
        ProjectStatus::Snapshot,
        ProjectStatus::Claim,
        ProjectStatus::End,
    ];

    /// Returns the wire/display label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Waitlist => "Waitlist",
            Self::EarlyAccess => "Early Access",
            Self::Active => "Active",
            Self::Snapshot => "Snapshot",
            Self::Claim => "Claim",
            Self::End => "End",
        }
    }

    /// Parses a label case-insensitively. `early-access` and `early_access`
    /// are accepted for shell convenience.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().replace(['-', '_'], " ");
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(&normalized))
    }
}

/// Field-level validation failures for submitted or persisted projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// `cost` is negative or not a finite number.
    InvalidCost,
    /// `twitter` is non-empty and not an http(s) URL.
    InvalidTwitterUrl,
    /// `website` is non-empty and not an http(s) URL.
    InvalidWebsiteUrl,
}

impl ValidationError {
    /// Stable machine-readable code.
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidCost => "invalid-cost",
            Self::InvalidTwitterUrl => "invalid-twitter-url",
            Self::InvalidWebsiteUrl => "invalid-website-url",
        }
    }

    /// Message shown to the user when a submit is rejected.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidCost => "Cost must not be negative",
            Self::InvalidTwitterUrl | Self::InvalidWebsiteUrl => {
                "Invalid Twitter/Website URL — must start with http:// or https://"
            }
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCost => write!(f, "cost must be a finite number >= 0"),
            Self::InvalidTwitterUrl => {
                write!(f, "twitter link must be empty or start with http:// or https://")
            }
            Self::InvalidWebsiteUrl => {
                write!(f, "website link must be empty or start with http:// or https://")
            }
        }
    }
}

impl Error for ValidationError {}

/// Submitted form values for one project.
///
/// Carries every persisted field except the identifier, which the store
/// assigns on add and preserves on update.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub kind: ProjectType,
    pub chain: Chain,
    pub status: ProjectStatus,
    pub cost: f64,
    pub twitter: String,
    pub website: String,
    /// Unix epoch milliseconds; see `is_checked`.
    pub checked_until: Option<i64>,
}

impl ProjectDraft {
    /// Creates a draft with zero cost, empty links and no check-in.
    pub fn new(
        name: impl Into<String>,
        kind: ProjectType,
        chain: Chain,
        status: ProjectStatus,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            chain,
            status,
            cost: 0.0,
            twitter: String::new(),
            website: String::new(),
            checked_until: None,
        }
    }

    /// Validates cost and link fields.
    ///
    /// Checks run in order twitter, website, cost; the first failure wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(self.cost, &self.twitter, &self.website)
    }
}

/// Persisted project record.
///
/// Wire shape matches the dashboard's storage slot: `type` and
/// `checkedUntil` keep their original names, `id` is filled in for legacy
/// entries that predate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default = "Uuid::new_v4")]
    pub id: ProjectId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    pub chain: Chain,
    pub status: ProjectStatus,
    #[serde(deserialize_with = "deserialize_cost")]
    pub cost: f64,
    #[serde(default)]
    pub twitter: String,
    #[serde(default)]
    pub website: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_until: Option<i64>,
}

impl Project {
    /// Materializes a draft under the given identifier.
    pub fn from_draft(id: ProjectId, draft: ProjectDraft) -> Self {
        Self {
            id,
            name: draft.name,
            kind: draft.kind,
            chain: draft.chain,
            status: draft.status,
            cost: draft.cost,
            twitter: draft.twitter,
            website: draft.website,
            checked_until: draft.checked_until,
        }
    }

    /// Returns the editable form values of this record.
    pub fn to_draft(&self) -> ProjectDraft {
        ProjectDraft {
            name: self.name.clone(),
            kind: self.kind,
            chain: self.chain,
            status: self.status,
            cost: self.cost,
            twitter: self.twitter.clone(),
            website: self.website.clone(),
            checked_until: self.checked_until,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_fields(self.cost, &self.twitter, &self.website)
    }

    /// Returns whether the check-in window is still open at `now_ms`.
    pub fn is_checked(&self, now_ms: i64) -> bool {
        is_checked(self, now_ms)
    }
}

/// Derived check-in state: checked only while `checked_until > now_ms`.
///
/// Must be evaluated on every read; an elapsed deadline flips the record back
/// to unchecked without any mutation.
pub fn is_checked(project: &Project, now_ms: i64) -> bool {
    project
        .checked_until
        .is_some_and(|deadline| deadline > now_ms)
}

/// Returns whether `url` is empty or an http(s) link.
pub fn is_valid_link(url: &str) -> bool {
    url.is_empty() || LINK_RE.is_match(url)
}

fn validate_fields(cost: f64, twitter: &str, website: &str) -> Result<(), ValidationError> {
    if !is_valid_link(twitter) {
        return Err(ValidationError::InvalidTwitterUrl);
    }
    if !is_valid_link(website) {
        return Err(ValidationError::InvalidWebsiteUrl);
    }
    if !cost.is_finite() || cost < 0.0 {
        return Err(ValidationError::InvalidCost);
    }
    Ok(())
}

// Older dashboard builds stored the raw form input, so cost may arrive as a
// numeric string.
fn deserialize_cost<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCost {
        Number(f64),
        Text(String),
    }

    match RawCost::deserialize(deserializer)? {
        RawCost::Number(value) => Ok(value),
        RawCost::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("invalid cost value `{text}`")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        is_checked, is_valid_link, Chain, Project, ProjectDraft, ProjectStatus, ProjectType,
        ValidationError, CHECK_WINDOW_MS,
    };
    use uuid::Uuid;

    fn draft() -> ProjectDraft {
        ProjectDraft::new("Foo", ProjectType::Testnet, Chain::Ethereum, ProjectStatus::Active)
    }

    #[test]
    fn link_pattern_requires_scheme_and_body() {
        assert!(is_valid_link(""));
        assert!(is_valid_link("https://x.com/foo"));
        assert!(is_valid_link("http://a"));
        assert!(!is_valid_link("https://"));
        assert!(!is_valid_link("ftp://example.com"));
        assert!(!is_valid_link("HTTPS://example.com"));
        assert!(!is_valid_link("example.com"));
        assert!(!is_valid_link("https://a\nb"));
        assert!(!is_valid_link("https://a\rb"));
        assert!(!is_valid_link("https://a\u{2028}b"));
        assert!(!is_valid_link("https://a\u{2029}"));
    }

    #[test]
    fn validate_checks_links_before_cost() {
        let mut value = draft();
        value.cost = -1.0;
        value.twitter = "nope".to_string();
        value.website = "www.example.com".to_string();
        assert_eq!(value.validate(), Err(ValidationError::InvalidTwitterUrl));

        value.twitter.clear();
        assert_eq!(value.validate(), Err(ValidationError::InvalidWebsiteUrl));

        value.website.clear();
        assert_eq!(value.validate(), Err(ValidationError::InvalidCost));
    }

    #[test]
    fn validate_rejects_non_finite_cost() {
        let mut value = draft();
        value.cost = f64::NAN;
        assert_eq!(value.validate(), Err(ValidationError::InvalidCost));
        value.cost = f64::INFINITY;
        assert_eq!(value.validate(), Err(ValidationError::InvalidCost));
    }

    #[test]
    fn twitter_and_website_share_user_message() {
        assert_eq!(
            ValidationError::InvalidTwitterUrl.user_message(),
            ValidationError::InvalidWebsiteUrl.user_message()
        );
        assert_eq!(
            ValidationError::InvalidCost.user_message(),
            "Cost must not be negative"
        );
    }

    #[test]
    fn is_checked_treats_past_and_zero_as_unchecked() {
        let now = 1_700_000_000_000;
        let mut project = Project::from_draft(Uuid::new_v4(), draft());
        assert!(!is_checked(&project, now));

        project.checked_until = Some(0);
        assert!(!is_checked(&project, now));

        project.checked_until = Some(now - 1_000);
        assert!(!project.is_checked(now));

        project.checked_until = Some(now);
        assert!(!project.is_checked(now));

        project.checked_until = Some(now + CHECK_WINDOW_MS);
        assert!(project.is_checked(now));
    }

    #[test]
    fn labels_parse_case_insensitively() {
        assert_eq!(ProjectType::parse("depin"), Some(ProjectType::DePin));
        assert_eq!(Chain::parse("bnb"), Some(Chain::Bnb));
        assert_eq!(Chain::parse("op"), Some(Chain::Op));
        assert_eq!(
            ProjectStatus::parse("early-access"),
            Some(ProjectStatus::EarlyAccess)
        );
        assert_eq!(ProjectStatus::parse("Early Access"), Some(ProjectStatus::EarlyAccess));
        assert_eq!(ProjectType::parse("mainnet"), None);
    }
}
