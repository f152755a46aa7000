pub mod app_config;
pub mod catalog;
pub mod config;
pub mod matching;
pub mod offers;
pub mod pricing;
pub mod runs;
pub mod sites;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{CatalogEntry, CatalogIndex, Candidate};
pub use config::{load_app_config, load_app_config_from_env};
pub use matching::{significant_tokens, url_tokens, MatchOutcome, MatchReason, Matcher};
pub use offers::{OfferError, PendingMatchDraft, ScrapedOffer, StoreWriteRequest};
pub use pricing::{
    observe_price, AlertSeverity, DealAlert, DealPolicy, DealSignal, PriceObservation,
    PriceTrajectory,
};
pub use runs::{RunStatus, Trigger};
pub use sites::{load_sites, parse_sites, AdapterKind, SiteConfig, SitesFile, MAX_PAGES_CEILING};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sites file {path}: {source}")]
    SitesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sites file: {0}")]
    SitesFileParse(#[from] serde_yaml::Error),

    #[error("sites validation error: {0}")]
    Validation(String),
}
