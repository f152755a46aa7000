//! PrestaShop storefronts: Fantasia Personajes, Pixelatoy and Frikiverso.

use async_trait::async_trait;
use oraculo_core::SiteConfig;
use reqwest::Url;

use super::SiteAdapter;
use crate::error::ScraperError;
use crate::markup::{self, MarkupRules, PriceRule};
use crate::session::ScrapeSession;
use crate::types::{ListingPage, PriceFormat};

/// Classic-theme product miniature. The `content` attribute carries a
/// dot-decimal price; the visible text is European-formatted.
const MINIATURE_PRICE: &[PriceRule] = &[
    PriceRule::Attr {
        css: "span.price",
        attr: "content",
        format: PriceFormat::Machine,
    },
    PriceRule::Text {
        css: "span.price",
        format: PriceFormat::European,
    },
    PriceRule::Attr {
        css: r#"meta[itemprop="price"]"#,
        attr: "content",
        format: PriceFormat::Machine,
    },
];

const FANTASIA_RULES: MarkupRules = MarkupRules {
    item: "article.product-miniature",
    title: ".product-title a",
    price: MINIATURE_PRICE,
    unavailable: Some(".product-unavailable"),
    image: "img",
    next: "a.next.js-search-link",
};

const PIXELATOY_RULES: MarkupRules = MarkupRules {
    next: r#"a.next.js-search-link, a[rel="next"]"#,
    ..FANTASIA_RULES
};

/// Frikiverso's theme renders prices as text only and has no stock marker.
const FRIKIVERSO_RULES: MarkupRules = MarkupRules {
    item: "article.js-product-miniature",
    title: "h3.s_title_block a, h3.product-title a",
    price: &[PriceRule::Text {
        css: ".price",
        format: PriceFormat::European,
    }],
    unavailable: None,
    image: "img",
    next: "a.next.page-link, .pagination .next a",
};

async fn fetch_prestashop_page(
    session: &ScrapeSession,
    url: &Url,
    rules: &MarkupRules,
) -> Result<ListingPage, ScraperError> {
    let body = session.navigate(url.as_str()).await?;
    markup::extract_page(&body, rules)
}

pub struct FantasiaAdapter {
    site: SiteConfig,
}

impl FantasiaAdapter {
    #[must_use]
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SiteAdapter for FantasiaAdapter {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    async fn fetch_page(
        &self,
        session: &ScrapeSession,
        url: &Url,
    ) -> Result<ListingPage, ScraperError> {
        fetch_prestashop_page(session, url, &FANTASIA_RULES).await
    }
}

pub struct PixelatoyAdapter {
    site: SiteConfig,
}

impl PixelatoyAdapter {
    #[must_use]
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SiteAdapter for PixelatoyAdapter {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    async fn fetch_page(
        &self,
        session: &ScrapeSession,
        url: &Url,
    ) -> Result<ListingPage, ScraperError> {
        fetch_prestashop_page(session, url, &PIXELATOY_RULES).await
    }
}

pub struct FrikiversoAdapter {
    site: SiteConfig,
}

impl FrikiversoAdapter {
    #[must_use]
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SiteAdapter for FrikiversoAdapter {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    async fn fetch_page(
        &self,
        session: &ScrapeSession,
        url: &Url,
    ) -> Result<ListingPage, ScraperError> {
        fetch_prestashop_page(session, url, &FRIKIVERSO_RULES).await
    }
}
