//! Offline tests for oraculo-db pool configuration and row helpers.
//! These tests do not require a live database connection.

use std::path::PathBuf;

use chrono::Utc;
use oraculo_core::{AppConfig, Environment, PriceTrajectory};
use oraculo_db::{BlacklistReason, OfferRow, PoolConfig};
use rust_decimal::Decimal;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        log_level: "info".to_string(),
        sites_path: PathBuf::from("./config/sites.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 30,
        scraper_user_agent: "ua".to_string(),
        scraper_max_concurrent_sites: 2,
        scraper_max_attempts: 3,
        scraper_backoff_base_ms: 2_000,
        scraper_human_delay_min_ms: 2_000,
        scraper_human_delay_max_ms: 5_000,
        match_threshold: 0.65,
        bind_threshold: 0.70,
        deal_min_discount: Decimal::new(20, 2),
        deal_anomaly_discount: Decimal::new(50, 2),
        scan_cron: "0 0 6 * * *".to_string(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn offer_row_exposes_its_price_trajectory() {
    let now = Utc::now();
    let row = OfferRow {
        id: 1,
        product_id: 2,
        shop_name: "fantasia".to_string(),
        url: "https://fantasia.example/he-man.html".to_string(),
        price: Decimal::new(2495, 2),
        currency: "EUR".to_string(),
        is_available: true,
        min_price: Some(Decimal::new(1999, 2)),
        max_price: None,
        last_seen_at: now,
        created_at: now,
        updated_at: now,
    };

    assert_eq!(
        row.trajectory(),
        PriceTrajectory {
            price: Decimal::new(2495, 2),
            min_price: Some(Decimal::new(1999, 2)),
            max_price: None,
        }
    );
}

#[test]
fn blacklist_reasons_use_stable_codes() {
    assert_eq!(BlacklistReason::UserDiscarded.as_str(), "user_discarded");
    assert_eq!(BlacklistReason::PurgatoryDiscard.as_str(), "purgatory_discard");
    assert_eq!(BlacklistReason::AdminOfferBan.to_string(), "admin_offer_ban");
}
