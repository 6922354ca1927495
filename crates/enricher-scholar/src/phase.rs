//! The two enrichment phases and their table layouts

use std::path::Path;

use enricher_core::PhaseLayout;

use crate::config::{ColumnNames, Config};

// Checkpoint column names
pub const NAME_COL: &str = "Name";
pub const ORGANIZATION_COL: &str = "Organization";
pub const LINK_COL: &str = "Google Scholar Link";
pub const IMAGE_COL: &str = "img_link";
pub const PROFILE_NAME_COL: &str = "google_scholar_name";
pub const PROFILE_ORGANIZATION_COL: &str = "google_scholar_organization";
pub const CITATIONS_COL: &str = "citation_data";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Entity -> profile link
    Resolve,
    /// Profile link -> profile fields
    Details,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Resolve, Phase::Details];

    /// Parse CLI string; `initial` is the historical name of `resolve`
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "resolve" | "initial" => Some(Self::Resolve),
            "details" => Some(Self::Details),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Details => "details",
        }
    }

    pub fn layout(self, columns: &ColumnNames) -> PhaseLayout {
        let strings =
            |cols: &[&str]| -> Vec<String> { cols.iter().map(|c| c.to_string()).collect() };
        match self {
            Self::Resolve => PhaseLayout {
                name: self.name().to_string(),
                id_column: columns.id.clone(),
                required: vec![columns.name.clone()],
                optional: vec![columns.organization.clone()],
                output: strings(&[NAME_COL, ORGANIZATION_COL, LINK_COL]),
            },
            Self::Details => PhaseLayout {
                name: self.name().to_string(),
                id_column: columns.id.clone(),
                required: vec![LINK_COL.to_string()],
                optional: Vec::new(),
                output: strings(&[
                    LINK_COL,
                    IMAGE_COL,
                    PROFILE_NAME_COL,
                    PROFILE_ORGANIZATION_COL,
                    CITATIONS_COL,
                ]),
            },
        }
    }

    pub fn input_path(self, config: &Config) -> &Path {
        match self {
            Self::Resolve => &config.input,
            Self::Details => &config.output_resolve,
        }
    }

    /// Checkpoint this phase appends to
    pub fn output_path(self, config: &Config) -> &Path {
        match self {
            Self::Resolve => &config.output_resolve,
            Self::Details => &config.output_details,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
