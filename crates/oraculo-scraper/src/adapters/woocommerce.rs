//! WooCommerce Store API: ActionToys.
//!
//! The public `wp-json/wc/store/products` endpoint returns a JSON array of
//! products with prices in minor units, so no HTML is parsed except to decode
//! entities WordPress leaves in product names.

use async_trait::async_trait;
use oraculo_core::SiteConfig;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;

use super::SiteAdapter;
use crate::error::ScraperError;
use crate::session::ScrapeSession;
use crate::types::{ListingPage, ListingSource, RawListing, RawPrice};

const PER_PAGE: usize = 50;

#[derive(Debug, Deserialize)]
struct StoreProduct {
    name: String,
    permalink: String,
    prices: StorePrices,
    #[serde(default)]
    images: Vec<StoreImage>,
    #[serde(default = "default_in_stock")]
    is_in_stock: bool,
}

#[derive(Debug, Deserialize)]
struct StorePrices {
    price: String,
    #[serde(default)]
    currency_code: Option<String>,
    #[serde(default = "default_minor_unit")]
    currency_minor_unit: u32,
}

#[derive(Debug, Deserialize)]
struct StoreImage {
    src: String,
}

fn default_in_stock() -> bool {
    true
}

fn default_minor_unit() -> u32 {
    2
}

fn decode_entities(name: &str) -> String {
    let fragment = Html::parse_fragment(name);
    fragment
        .root_element()
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn page_number(url: &Url) -> u32 {
    url.query_pairs()
        .find(|(k, _)| k == "page")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(1)
}

/// Copy of `url` with `key` replaced by `value`, other parameters kept in order.
fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut out = url.clone();
    out.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    out
}

fn to_listing(product: StoreProduct) -> RawListing {
    RawListing {
        name: decode_entities(&product.name),
        price: RawPrice::MinorUnits {
            amount: product.prices.price,
            minor_unit: product.prices.currency_minor_unit,
        },
        currency: product.prices.currency_code,
        available: product.is_in_stock,
        url: product.permalink,
        image: product.images.into_iter().next().map(|i| i.src),
        source: ListingSource::Api,
    }
}

/// Builds the page from one API response. A full page means there may be more.
fn listing_page(products: Vec<StoreProduct>, url: &Url) -> ListingPage {
    let next_url = (products.len() >= PER_PAGE).then(|| {
        with_query_param(url, "page", &(page_number(url) + 1).to_string()).to_string()
    });
    ListingPage {
        listings: products.into_iter().map(to_listing).collect(),
        next_url,
        skipped: 0,
    }
}

pub struct ActionToysAdapter {
    site: SiteConfig,
}

impl ActionToysAdapter {
    #[must_use]
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SiteAdapter for ActionToysAdapter {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    fn seed_url(&self) -> Result<Url, ScraperError> {
        let seed = &self.site.seed_url;
        let url = Url::parse(seed).map_err(|e| ScraperError::InvalidUrl {
            url: seed.clone(),
            reason: e.to_string(),
        })?;
        let url = with_query_param(&url, "per_page", &PER_PAGE.to_string());
        Ok(with_query_param(&url, "page", "1"))
    }

    async fn fetch_page(
        &self,
        session: &ScrapeSession,
        url: &Url,
    ) -> Result<ListingPage, ScraperError> {
        let products: Vec<StoreProduct> = session.fetch_json(url.as_str()).await?;
        Ok(listing_page(products, url))
    }
}
