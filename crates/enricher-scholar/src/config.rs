//! Runtime configuration for the scholar phases

use std::path::PathBuf;
use std::time::Duration;

use enricher_core::{DEFAULT_ENCODINGS, TextEncoding};

/// Column names of the caller's input table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    pub id: String,
    pub name: String,
    pub organization: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            name: "name".to_string(),
            organization: "organization".to_string(),
        }
    }
}

/// Search endpoint and per-invocation limits
#[derive(Debug, Clone)]
pub struct SearchSettings {
    /// Search endpoint; the query is appended as `?q=`
    pub search_url: String,
    /// Restricts results to profile pages (`site:` operator)
    pub site_filter: String,
    pub user_agent: String,
    /// Hard limit for one fetch invocation, all requests included
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            search_url: "https://www.google.com/search".to_string(),
            site_filter: "scholar.google.com".to_string(),
            user_agent: concat!("enricher/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything one phase run needs, resolved by the caller
#[derive(Debug, Clone)]
pub struct Config {
    /// Entity table (resolve input)
    pub input: PathBuf,
    /// Resolve checkpoint, also the details input
    pub output_resolve: PathBuf,
    /// Details checkpoint
    pub output_details: PathBuf,
    /// Diagnostic sink
    pub error_log: PathBuf,
    pub columns: ColumnNames,
    pub workers: usize,
    pub encodings: Vec<TextEncoding>,
    pub search: SearchSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("researchers.csv"),
            output_resolve: PathBuf::from("scholar_links.csv"),
            output_details: PathBuf::from("scholar_details.csv"),
            error_log: PathBuf::from("errors.log"),
            columns: ColumnNames::default(),
            workers: 5,
            encodings: DEFAULT_ENCODINGS.to_vec(),
            search: SearchSettings::default(),
        }
    }
}
