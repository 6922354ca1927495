//! Markup extraction for search results and profile pages

use std::sync::LazyLock;

use enricher_core::FetchError;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::profile::{CitationHistory, ProfileFields};

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("invalid selector")
}

/// Search result container; the first link inside is the candidate
static RESULTS: LazyLock<Selector> = LazyLock::new(|| selector("div.dURPMd"));
static RESULT_ENTRY: LazyLock<Selector> = LazyLock::new(|| selector("div"));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));

/// Profile page container (required)
static PROFILE_BODY: LazyLock<Selector> = LazyLock::new(|| selector("#gsc_bdy"));
static PROFILE_IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("#gsc_prf_pup-img"));
static PROFILE_NAME: LazyLock<Selector> = LazyLock::new(|| selector("#gsc_prf_in"));
static PROFILE_AFFILIATION: LazyLock<Selector> = LazyLock::new(|| selector(".gsc_prf_il"));
static HISTORY: LazyLock<Selector> = LazyLock::new(|| selector(".gsc_md_hist_b"));
static HISTORY_YEAR: LazyLock<Selector> = LazyLock::new(|| selector(".gsc_g_t"));
static HISTORY_COUNT: LazyLock<Selector> = LazyLock::new(|| selector(".gsc_g_al"));

/// Visible text of an element, whitespace-collapsed; `None` when empty
fn text_of(el: ElementRef<'_>) -> Option<String> {
    let text = el.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Resolve `href` against `base`, unwrapping search-engine redirect links
/// (`/url?q=<target>`).
fn absolute_link(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    if url.path() == "/url" {
        if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "q" || k == "url") {
            return Url::parse(&target).ok().map(String::from);
        }
    }
    Some(url.into())
}

/// First candidate link on a search results page
pub fn first_result_link(html: &str, base: &Url) -> Option<String> {
    let doc = Html::parse_document(html);
    let container = doc.select(&RESULTS).next()?;
    let entry = container.select(&RESULT_ENTRY).next()?;
    let href = entry.select(&ANCHOR).next()?.value().attr("href")?;
    absolute_link(base, href)
}

/// Extract profile fields. Only a missing profile container is an error.
pub fn parse_profile(html: &str, base: &Url) -> Result<ProfileFields, FetchError> {
    let doc = Html::parse_document(html);
    let body = doc
        .select(&PROFILE_BODY)
        .next()
        .ok_or_else(|| FetchError::NotFound(format!("no profile container on {base}")))?;

    let image_link = body
        .select(&PROFILE_IMAGE)
        .next()
        .and_then(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .and_then(|src| absolute_link(base, src));

    Ok(ProfileFields {
        image_link,
        name: body.select(&PROFILE_NAME).next().and_then(text_of),
        organization: body.select(&PROFILE_AFFILIATION).next().and_then(text_of),
        citations: body.select(&HISTORY).next().map(parse_history),
    })
}

/// Zip year labels with counts. Pairs that don't parse are skipped.
fn parse_history(hist: ElementRef<'_>) -> CitationHistory {
    let years = hist.select(&HISTORY_YEAR).filter_map(text_of);
    let counts = hist.select(&HISTORY_COUNT).filter_map(text_of);
    years
        .zip(counts)
        .filter_map(|(year, count)| {
            let parsed = year
                .parse::<u16>()
                .ok()
                .zip(count.replace(',', "").parse::<u64>().ok());
            if parsed.is_none() {
                log::debug!("Skipping history pair ({year}, {count})");
            }
            parsed
        })
        .collect()
}
