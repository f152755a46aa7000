//! Magento 2 storefront: Electropolis.

use async_trait::async_trait;
use oraculo_core::SiteConfig;
use reqwest::Url;

use super::SiteAdapter;
use crate::error::ScraperError;
use crate::markup::{self, MarkupRules, PriceRule};
use crate::session::ScrapeSession;
use crate::types::{ListingPage, PriceFormat};

const ELECTROPOLIS_RULES: MarkupRules = MarkupRules {
    item: ".product-item-info",
    title: "a.product-item-link",
    price: &[
        PriceRule::Attr {
            css: r#"[data-price-type="finalPrice"]"#,
            attr: "data-price-amount",
            format: PriceFormat::Machine,
        },
        PriceRule::Text {
            css: ".price",
            format: PriceFormat::European,
        },
    ],
    unavailable: Some(".stock.unavailable"),
    image: "img.product-image-photo",
    next: ".pages .action.next",
};

pub struct ElectropolisAdapter {
    site: SiteConfig,
}

impl ElectropolisAdapter {
    #[must_use]
    pub fn new(site: SiteConfig) -> Self {
        Self { site }
    }
}

#[async_trait]
impl SiteAdapter for ElectropolisAdapter {
    fn site(&self) -> &SiteConfig {
        &self.site
    }

    async fn fetch_page(
        &self,
        session: &ScrapeSession,
        url: &Url,
    ) -> Result<ListingPage, ScraperError> {
        let body = session.navigate(url.as_str()).await?;
        markup::extract_page(&body, &ELECTROPOLIS_RULES)
    }
}
