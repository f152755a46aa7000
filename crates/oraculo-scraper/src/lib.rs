pub mod adapters;
pub mod crawl;
pub mod error;
mod jsonld;
mod markup;
pub mod normalize;
pub mod price;
mod retry;
pub mod session;
pub mod types;

pub use adapters::{
    build_adapter, build_adapters, ActionToysAdapter, ElectropolisAdapter, FantasiaAdapter,
    FrikiversoAdapter, PixelatoyAdapter, SiteAdapter,
};
pub use crawl::{crawl, run_adapter, AdapterRun, CrawledPage};
pub use error::ScraperError;
pub use normalize::{absolute_url, normalize_listing, normalize_page};
pub use session::{ScrapeSession, SessionPolicy};
pub use types::{ListingPage, ListingSource, PriceFormat, RawListing, RawPrice};
