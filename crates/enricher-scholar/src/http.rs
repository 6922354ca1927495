//! HTTP + HTML profile source.
//!
//! Uses async reqwest on a runtime owned by the source, but presents a sync
//! interface for the rayon workers. Every request of one session shares the
//! session's deadline, so a whole fetch invocation is bounded by
//! `SearchSettings::timeout`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use enricher_core::FetchError;
use reqwest::{StatusCode, Url};

use crate::config::SearchSettings;
use crate::extract;
use crate::profile::{ProfileFields, ProfileSession, ProfileSource};

/// Runtime worker threads; requests are I/O bound and driven by `block_on`
const RUNTIME_THREADS: usize = 2;

pub struct HttpProfileSource {
    settings: Arc<SearchSettings>,
    search_url: Url,
    runtime: tokio::runtime::Runtime,
}

impl HttpProfileSource {
    pub fn new(settings: SearchSettings) -> anyhow::Result<Self> {
        let search_url = Url::parse(&settings.search_url)
            .with_context(|| format!("Invalid search URL: {}", settings.search_url))?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("enricher-http")
            .enable_all()
            .build()
            .context("Failed to build tokio runtime")?;
        Ok(Self {
            settings: Arc::new(settings),
            search_url,
            runtime,
        })
    }
}

impl ProfileSource for HttpProfileSource {
    type Session = HttpSession;

    fn open_session(&self) -> Result<HttpSession, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(self.settings.user_agent.as_str())
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| FetchError::Internal(format!("cannot build HTTP client: {e}")))?;
        Ok(HttpSession {
            client,
            runtime: self.runtime.handle().clone(),
            settings: Arc::clone(&self.settings),
            search_url: self.search_url.clone(),
            deadline: Instant::now() + self.settings.timeout,
        })
    }
}

/// One fetch invocation's client. Dropping it closes its connections.
pub struct HttpSession {
    client: reqwest::Client,
    runtime: tokio::runtime::Handle,
    settings: Arc<SearchSettings>,
    search_url: Url,
    deadline: Instant,
}

impl HttpSession {
    /// GET `url` within the remaining session budget.
    /// Returns the final (post-redirect) URL and the body.
    fn get(&self, url: Url) -> Result<(Url, String), FetchError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out(self.settings.timeout));
        }

        let request = self.client.get(url);
        let outcome = self.runtime.block_on(async {
            // timer must be created inside the runtime
            tokio::time::timeout(remaining, async {
                let response = request.send().await?;
                let status = response.status();
                let final_url = response.url().clone();
                let body = response.text().await?;
                Ok::<_, reqwest::Error>((status, final_url, body))
            })
            .await
        });

        match outcome {
            Err(_) => Err(timed_out(self.settings.timeout)),
            Ok(Err(e)) => Err(from_reqwest(e)),
            Ok(Ok((status, final_url, body))) => {
                check_status(status, &final_url)?;
                Ok((final_url, body))
            }
        }
    }
}

impl ProfileSession for HttpSession {
    fn resolve_candidate_link(
        &mut self,
        name: &str,
        organization: &str,
    ) -> Result<String, FetchError> {
        let query = search_query(name, organization, &self.settings.site_filter);
        let mut url = self.search_url.clone();
        url.query_pairs_mut().append_pair("q", &query);

        log::debug!("Searching: {query}");
        let (page_url, body) = self.get(url)?;
        extract::first_result_link(&body, &page_url)
            .ok_or_else(|| FetchError::NotFound(format!("no candidate link for \"{name}\"")))
    }

    fn fetch_profile(&mut self, link: &str) -> Result<ProfileFields, FetchError> {
        let url = Url::parse(link)
            .map_err(|e| FetchError::NotFound(format!("invalid profile link {link}: {e}")))?;
        let (page_url, body) = self.get(url)?;
        extract::parse_profile(&body, &page_url)
    }
}

/// `"{name} {organization} site:{filter}"`, skipping empty parts
fn search_query(name: &str, organization: &str, site_filter: &str) -> String {
    let site = (!site_filter.is_empty()).then(|| format!("site:{site_filter}"));
    [Some(name.trim()), Some(organization.trim()), site.as_deref()]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_status(status: StatusCode, url: &Url) -> Result<(), FetchError> {
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(format!("{url} returned 404")));
    }
    if !status.is_success() {
        return Err(FetchError::Transient(format!("{url} returned {status}")));
    }
    Ok(())
}

fn timed_out(limit: Duration) -> FetchError {
    FetchError::Transient(format!("timed out after {}s", limit.as_secs()))
}

fn from_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        return FetchError::Transient(format!("request timed out: {}", e.without_url()));
    }
    match e.status() {
        Some(StatusCode::NOT_FOUND) => FetchError::NotFound(e.to_string()),
        _ => FetchError::Transient(e.to_string()),
    }
}
