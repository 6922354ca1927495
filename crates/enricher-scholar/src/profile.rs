//! External collaborator: where candidate links and profile pages come from.
//!
//! The engine only sees these traits. [`crate::http::HttpProfileSource`] is
//! the concrete HTTP + HTML implementation; tests plug in scripted sources.

use std::collections::BTreeMap;

use enricher_core::FetchError;

/// Opens one isolated session per fetch invocation.
pub trait ProfileSource: Sync {
    type Session: ProfileSession;

    /// Acquire a fresh session. It is dropped when the invocation ends,
    /// on every exit path.
    fn open_session(&self) -> Result<Self::Session, FetchError>;
}

/// Per-invocation handle onto the external resource. Each call honours the
/// configured per-invocation timeout, reporting it as
/// [`FetchError::Transient`].
pub trait ProfileSession {
    /// Canonical profile link for an entity, or `NotFound`.
    fn resolve_candidate_link(
        &mut self,
        name: &str,
        organization: &str,
    ) -> Result<String, FetchError>;

    /// Structured fields of a profile page, or `NotFound` when the page has
    /// no profile container.
    fn fetch_profile(&mut self, link: &str) -> Result<ProfileFields, FetchError>;
}

/// Yearly metric history (year -> count), ordered by year.
pub type CitationHistory = BTreeMap<u16, u64>;

/// Fields extracted from a profile page. Missing sub-fields are `None`,
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub image_link: Option<String>,
    pub name: Option<String>,
    pub organization: Option<String>,
    /// `None` when the page has no history table at all
    pub citations: Option<CitationHistory>,
}

/// Encode a history as a single checkpoint cell: a JSON object keyed by year,
/// e.g. `{"2019":12,"2020":40}`.
pub fn encode_history(history: &CitationHistory) -> String {
    // map of integers to integers cannot fail to serialize
    serde_json::to_string(history).unwrap_or_default()
}
