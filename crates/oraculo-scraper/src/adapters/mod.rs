//! Per-site fetch adapters.
//!
//! Every retail site gets its own [`SiteAdapter`] implementation. The
//! orchestrator only sees trait objects built by [`build_adapters`].

mod magento;
mod prestashop;
mod woocommerce;

use std::sync::Arc;

use async_trait::async_trait;
use oraculo_core::{AdapterKind, SiteConfig, SitesFile};
use reqwest::Url;

use crate::error::ScraperError;
use crate::session::ScrapeSession;
use crate::types::ListingPage;

pub use magento::ElectropolisAdapter;
pub use prestashop::{FantasiaAdapter, FrikiversoAdapter, PixelatoyAdapter};
pub use woocommerce::ActionToysAdapter;

/// Capability shared by all site adapters: fetch and extract one catalog page.
///
/// Pagination, de-duplication and the page cap are handled by
/// [`crate::crawl`], so implementations stay stateless and restartable.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    fn site(&self) -> &SiteConfig;

    /// First page of a crawl.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidUrl`] if the configured seed does not parse.
    fn seed_url(&self) -> Result<Url, ScraperError> {
        let seed = &self.site().seed_url;
        Url::parse(seed).map_err(|e| ScraperError::InvalidUrl {
            url: seed.clone(),
            reason: e.to_string(),
        })
    }

    async fn fetch_page(
        &self,
        session: &ScrapeSession,
        url: &Url,
    ) -> Result<ListingPage, ScraperError>;
}

#[must_use]
pub fn build_adapter(site: SiteConfig) -> Arc<dyn SiteAdapter> {
    match site.adapter {
        AdapterKind::Fantasia => Arc::new(FantasiaAdapter::new(site)),
        AdapterKind::Pixelatoy => Arc::new(PixelatoyAdapter::new(site)),
        AdapterKind::Frikiverso => Arc::new(FrikiversoAdapter::new(site)),
        AdapterKind::Electropolis => Arc::new(ElectropolisAdapter::new(site)),
        AdapterKind::Actiontoys => Arc::new(ActionToysAdapter::new(site)),
    }
}

/// Adapters for every enabled site, in file order.
#[must_use]
pub fn build_adapters(sites: &SitesFile) -> Vec<Arc<dyn SiteAdapter>> {
    sites.enabled().cloned().map(build_adapter).collect()
}
