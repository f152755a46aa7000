use std::path::PathBuf;

use rust_decimal::Decimal;

use crate::matching::Matcher;
use crate::pricing::DealPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub sites_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_concurrent_sites: usize,
    pub scraper_max_attempts: u32,
    pub scraper_backoff_base_ms: u64,
    pub scraper_human_delay_min_ms: u64,
    pub scraper_human_delay_max_ms: u64,
    /// Jaccard floor below which the matcher rejects a candidate.
    pub match_threshold: f64,
    /// Score the best candidate must reach before the pipeline binds an offer.
    pub bind_threshold: f64,
    pub deal_min_discount: Decimal,
    pub deal_anomaly_discount: Decimal,
    pub scan_cron: String,
}

impl AppConfig {
    #[must_use]
    pub fn matcher(&self) -> Matcher {
        Matcher::new(self.match_threshold)
    }

    #[must_use]
    pub fn deal_policy(&self) -> DealPolicy {
        DealPolicy {
            min_discount: self.deal_min_discount,
            anomaly_discount: self.deal_anomaly_discount,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("sites_path", &self.sites_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_max_concurrent_sites",
                &self.scraper_max_concurrent_sites,
            )
            .field("scraper_max_attempts", &self.scraper_max_attempts)
            .field("scraper_backoff_base_ms", &self.scraper_backoff_base_ms)
            .field(
                "scraper_human_delay_min_ms",
                &self.scraper_human_delay_min_ms,
            )
            .field(
                "scraper_human_delay_max_ms",
                &self.scraper_human_delay_max_ms,
            )
            .field("match_threshold", &self.match_threshold)
            .field("bind_threshold", &self.bind_threshold)
            .field("deal_min_discount", &self.deal_min_discount)
            .field("deal_anomaly_discount", &self.deal_anomaly_discount)
            .field("scan_cron", &self.scan_cron)
            .finish()
    }
}
