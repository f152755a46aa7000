//! Pagination driver shared by every adapter.
//!
//! [`crawl`] yields one [`CrawledPage`] per fetched page so callers can
//! persist results as they arrive. The stream ends after the first error,
//! when a page has no next link, when a page adds no unseen listing URLs,
//! or when the page cap is reached.

use std::collections::HashSet;

use futures::stream::{self, Stream, StreamExt};
use oraculo_core::{RunStatus, ScrapedOffer, MAX_PAGES_CEILING};
use reqwest::Url;

use crate::adapters::SiteAdapter;
use crate::error::ScraperError;
use crate::normalize::{absolute_url, normalize_page};
use crate::session::ScrapeSession;

#[derive(Debug, Clone)]
pub struct CrawledPage {
    /// 1-based page number within the crawl.
    pub number: usize,
    pub url: Url,
    /// Offers whose URL had not been seen earlier in this crawl.
    pub offers: Vec<ScrapedOffer>,
    pub skipped: usize,
    /// Whether the crawl would fetch another page after this one.
    pub has_next: bool,
}

struct CrawlState {
    next: Option<Result<Url, ScraperError>>,
    fetched: usize,
    seen: HashSet<String>,
}

/// Lazily crawl `adapter`'s listing pages starting at its seed URL.
pub fn crawl<'a>(
    adapter: &'a dyn SiteAdapter,
    session: &'a ScrapeSession,
) -> impl Stream<Item = Result<CrawledPage, ScraperError>> + Send + 'a {
    let site = adapter.site();
    let cap = site.max_pages.clamp(1, MAX_PAGES_CEILING);
    let state = CrawlState {
        next: Some(adapter.seed_url()),
        fetched: 0,
        seen: HashSet::new(),
    };

    stream::unfold(state, move |mut state| async move {
        if state.fetched >= cap {
            return None;
        }
        let url = match state.next.take() {
            Some(Ok(url)) => url,
            Some(Err(err)) => return Some((Err(err), state)),
            None => return None,
        };

        state.fetched += 1;
        let page = match adapter.fetch_page(session, &url).await {
            Ok(page) => page,
            Err(err) => return Some((Err(err), state)),
        };

        let (offers, skipped) = normalize_page(&page, &url, site);
        let listed = offers.len();
        let offers: Vec<ScrapedOffer> = offers
            .into_iter()
            .filter(|offer| state.seen.insert(offer.url.clone()))
            .collect();

        if offers.is_empty() {
            tracing::debug!(
                site = %site.name,
                page = state.fetched,
                listed,
                "page added no new listings; stopping"
            );
        } else if let Some(href) = page.next_url.as_deref() {
            match absolute_url(&url, href) {
                Ok(next) if next != url => state.next = Some(Ok(next)),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(site = %site.name, error = %err, "ignoring bad next link");
                }
            }
        }

        let crawled = CrawledPage {
            number: state.fetched,
            url,
            offers,
            skipped,
            has_next: state.next.is_some() && state.fetched < cap,
        };
        Some((Ok(crawled), state))
    })
}

/// Outcome of running one adapter to completion without persisting anything.
#[derive(Debug, Default)]
pub struct AdapterRun {
    pub offers: Vec<ScrapedOffer>,
    pub pages: usize,
    pub skipped: usize,
    pub failure: Option<ScraperError>,
}

impl AdapterRun {
    #[must_use]
    pub fn status(&self) -> RunStatus {
        RunStatus::for_site(self.offers.len(), self.failure.is_some())
    }
}

/// Drain [`crawl`] into memory. Offers gathered before a failure are kept.
pub async fn run_adapter(adapter: &dyn SiteAdapter, session: &ScrapeSession) -> AdapterRun {
    let mut run = AdapterRun::default();
    let mut pages = std::pin::pin!(crawl(adapter, session));

    while let Some(item) = pages.next().await {
        match item {
            Ok(page) => {
                run.pages += 1;
                run.skipped += page.skipped;
                run.offers.extend(page.offers);
            }
            Err(err) => {
                tracing::warn!(site = %adapter.site().name, error = %err, "crawl stopped");
                run.failure = Some(err);
            }
        }
    }

    run
}
