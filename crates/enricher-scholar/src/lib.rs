//! Enricher Scholar - scholar profile enrichment phases
//!
//! `resolve` turns entity records into profile links via a search endpoint;
//! `details` fetches each profile page and extracts its fields. Both run on
//! the `enricher-core` engine through the [`ProfileSource`] collaborator.

pub mod config;
pub mod extract;
pub mod fetcher;
pub mod http;
pub mod phase;
pub mod profile;
pub mod runner;
pub mod status;

// Re-exports
pub use config::{ColumnNames, Config, SearchSettings};
pub use fetcher::{DetailFetcher, ResolveFetcher, ResolveInput};
pub use http::{HttpProfileSource, HttpSession};
pub use phase::Phase;
pub use profile::{CitationHistory, ProfileFields, ProfileSession, ProfileSource, encode_history};
pub use runner::run;
pub use status::{PhaseStatus, StatusReport};
