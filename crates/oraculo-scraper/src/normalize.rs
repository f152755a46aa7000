//! Listing normalizer: [`RawListing`] to validated [`ScrapedOffer`].

use oraculo_core::{ScrapedOffer, SiteConfig};
use reqwest::Url;

use crate::error::ScraperError;
use crate::price::resolve_price;
use crate::types::{ListingPage, RawListing};

/// Resolve `href` against `base`, keeping only absolute http(s) URLs.
///
/// Fragments are dropped so the same listing always yields the same key.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] if the reference cannot be joined or
/// resolves to a non-http scheme.
pub fn absolute_url(base: &Url, href: &str) -> Result<Url, ScraperError> {
    let mut url = base.join(href.trim()).map_err(|e| ScraperError::InvalidUrl {
        url: href.to_owned(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ScraperError::InvalidUrl {
            url: href.to_owned(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    url.set_fragment(None);
    Ok(url)
}

/// Normalize one raw listing found on `page_url`.
///
/// # Errors
///
/// Returns [`ScraperError::Normalization`] if the price does not parse or
/// the listing fails validation, or [`ScraperError::InvalidUrl`] if its link
/// cannot be resolved.
pub fn normalize_listing(
    raw: &RawListing,
    page_url: &Url,
    site: &SiteConfig,
) -> Result<ScrapedOffer, ScraperError> {
    let url = absolute_url(page_url, &raw.url)?;

    let price = resolve_price(&raw.price).ok_or_else(|| ScraperError::Normalization {
        listing: raw.name.clone(),
        reason: format!("unparseable price {:?}", raw.price),
    })?;

    let image_url = raw
        .image
        .as_deref()
        .filter(|src| !src.starts_with("data:"))
        .and_then(|src| absolute_url(page_url, src).ok())
        .map(String::from);

    let currency = raw.currency.as_deref().unwrap_or(&site.currency);

    ScrapedOffer::new(
        site.name.clone(),
        &raw.name,
        price,
        currency,
        String::from(url),
        image_url,
        raw.available,
    )
    .map_err(|e| ScraperError::Normalization {
        listing: raw.name.clone(),
        reason: e.to_string(),
    })
}

/// Normalize every listing on a page, logging and skipping the ones that fail.
///
/// Returns the valid offers and the number of listings dropped, including
/// those the adapter already could not extract and those failing the site's
/// relevance keywords.
#[must_use]
pub fn normalize_page(
    page: &ListingPage,
    page_url: &Url,
    site: &SiteConfig,
) -> (Vec<ScrapedOffer>, usize) {
    let mut offers = Vec::with_capacity(page.listings.len());
    let mut skipped = page.skipped;

    for raw in &page.listings {
        if !site.is_relevant(&raw.name) {
            tracing::debug!(
                site = %site.name,
                listing = %raw.name,
                "listing not relevant; skipping"
            );
            skipped += 1;
            continue;
        }
        match normalize_listing(raw, page_url, site) {
            Ok(offer) => offers.push(offer),
            Err(err) => {
                tracing::warn!(
                    site = %site.name,
                    listing = %raw.name,
                    error = %err,
                    "skipping listing that failed normalization"
                );
                skipped += 1;
            }
        }
    }

    (offers, skipped)
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
