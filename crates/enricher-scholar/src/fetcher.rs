//! Fetcher variants for the two phases

use enricher_core::{FetchError, FetchResult, Fetcher, Record, WorkItem};

use crate::config::ColumnNames;
use crate::phase::{
    CITATIONS_COL, IMAGE_COL, LINK_COL, NAME_COL, ORGANIZATION_COL, PROFILE_NAME_COL,
    PROFILE_ORGANIZATION_COL,
};
use crate::profile::{ProfileSession, ProfileSource, encode_history};

/// What the resolve phase needs from an entity record
#[derive(Debug, Clone)]
pub struct ResolveInput {
    pub name: String,
    pub organization: String,
}

/// Entity -> candidate profile link.
///
/// Failure rows keep the entity's name and organization with an empty link.
pub struct ResolveFetcher<'a, S> {
    source: &'a S,
    columns: ColumnNames,
}

impl<'a, S: ProfileSource> ResolveFetcher<'a, S> {
    pub fn new(source: &'a S, columns: ColumnNames) -> Self {
        Self { source, columns }
    }
}

impl<S: ProfileSource> Fetcher for ResolveFetcher<'_, S> {
    type Input = ResolveInput;

    fn input(&self, record: &Record) -> ResolveInput {
        ResolveInput {
            name: record.get(&self.columns.name).unwrap_or_default().to_string(),
            organization: record
                .get(&self.columns.organization)
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn fetch(&self, item: &WorkItem<ResolveInput>) -> FetchResult {
        let input = &item.input;
        let link = if input.name.trim().is_empty() {
            Err(FetchError::NotFound("empty name".to_string()))
        } else {
            self.source
                .open_session()
                .and_then(|mut session| {
                    session.resolve_candidate_link(&input.name, &input.organization)
                })
        };

        let base = match link {
            Ok(link) => FetchResult::success(item.id.clone()).with(LINK_COL, Some(link)),
            Err(e) => FetchResult::failure(item.id.clone(), e).with(LINK_COL, None),
        };
        base.with(NAME_COL, non_empty(&input.name))
            .with(ORGANIZATION_COL, non_empty(&input.organization))
    }
}

/// Profile link -> profile fields.
///
/// Rows whose link is empty (failed resolve rows) fail as `NotFound`
/// without opening a session.
pub struct DetailFetcher<'a, S> {
    source: &'a S,
}

impl<'a, S: ProfileSource> DetailFetcher<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }
}

impl<S: ProfileSource> Fetcher for DetailFetcher<'_, S> {
    type Input = String;

    fn input(&self, record: &Record) -> String {
        record.get(LINK_COL).unwrap_or_default().trim().to_string()
    }

    fn fetch(&self, item: &WorkItem<String>) -> FetchResult {
        let link = &item.input;
        let fields = if link.is_empty() {
            Err(FetchError::NotFound("no profile link".to_string()))
        } else {
            self.source
                .open_session()
                .and_then(|mut session| session.fetch_profile(link))
        };

        let result = match fields {
            Ok(fields) => FetchResult::success(item.id.clone())
                .with(IMAGE_COL, fields.image_link)
                .with(PROFILE_NAME_COL, fields.name)
                .with(PROFILE_ORGANIZATION_COL, fields.organization)
                .with(CITATIONS_COL, fields.citations.as_ref().map(encode_history)),
            Err(e) => FetchResult::failure(item.id.clone(), e)
                .with(IMAGE_COL, None)
                .with(PROFILE_NAME_COL, None)
                .with(PROFILE_ORGANIZATION_COL, None)
                .with(CITATIONS_COL, None),
        };
        result.with(LINK_COL, non_empty(link))
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
