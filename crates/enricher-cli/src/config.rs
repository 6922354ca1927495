//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use enricher_core::TextEncoding;
use serde::Deserialize;

/// Global configuration for enricher
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub files: FilesConfig,
    pub columns: ColumnsConfig,
    pub search: SearchConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
    /// File this config was read from, `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    pub input: PathBuf,
    pub output_resolve: PathBuf,
    pub output_details: PathBuf,
    pub error_log: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        let d = enricher_scholar::Config::default();
        Self {
            input: d.input,
            output_resolve: d.output_resolve,
            output_details: d.output_details,
            error_log: d.error_log,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    pub id: String,
    pub name: String,
    pub organization: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        let d = enricher_scholar::ColumnNames::default();
        Self {
            id: d.id,
            name: d.name,
            organization: d.organization,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_workers: usize,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub search_url: String,
    pub site_filter: String,
    pub user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let d = enricher_scholar::SearchSettings::default();
        Self {
            max_workers: enricher_scholar::Config::default().workers,
            timeout_secs: d.timeout.as_secs(),
            connect_timeout_secs: d.connect_timeout.as_secs(),
            search_url: d.search_url,
            site_filter: d.site_filter,
            user_agent: d.user_agent,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Tried in order when decoding the input table
    pub encodings: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            encodings: enricher_core::DEFAULT_ENCODINGS
                .iter()
                .map(|e| e.label().to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./enricher.toml (current directory)
    /// 2. ~/.config/enricher/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("enricher.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "enricher") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    fn encodings(&self) -> Result<Vec<TextEncoding>> {
        anyhow::ensure!(
            !self.input.encodings.is_empty(),
            "input.encodings must list at least one encoding"
        );
        self.input
            .encodings
            .iter()
            .map(|label| {
                TextEncoding::from_label(label)
                    .with_context(|| format!("Unknown encoding in input.encodings: {label}"))
            })
            .collect()
    }

    /// Reject settings no run can work with
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.search.max_workers > 0,
            "search.max_workers must be at least 1"
        );
        anyhow::ensure!(
            self.search.timeout_secs > 0,
            "search.timeout_secs must be at least 1"
        );
        anyhow::ensure!(
            self.search.connect_timeout_secs > 0,
            "search.connect_timeout_secs must be at least 1"
        );
        anyhow::ensure!(
            !self.columns.id.trim().is_empty(),
            "columns.id must not be empty"
        );
        self.encodings()?;
        Ok(())
    }

    /// Runtime config for one phase run; `workers` overrides `search.max_workers`
    pub fn to_run_config(&self, workers: Option<usize>) -> Result<enricher_scholar::Config> {
        let mut config = self.clone();
        if let Some(workers) = workers {
            config.search.max_workers = workers;
        }
        config.validate()?;

        Ok(enricher_scholar::Config {
            input: config.files.input.clone(),
            output_resolve: config.files.output_resolve.clone(),
            output_details: config.files.output_details.clone(),
            error_log: config.files.error_log.clone(),
            columns: enricher_scholar::ColumnNames {
                id: config.columns.id.clone(),
                name: config.columns.name.clone(),
                organization: config.columns.organization.clone(),
            },
            workers: config.search.max_workers,
            encodings: config.encodings()?,
            search: enricher_scholar::SearchSettings {
                search_url: config.search.search_url,
                site_filter: config.search.site_filter,
                user_agent: config.search.user_agent,
                timeout: Duration::from_secs(config.search.timeout_secs),
                connect_timeout: Duration::from_secs(config.search.connect_timeout_secs),
            },
        })
    }
}
