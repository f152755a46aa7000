use oraculo_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/oraculo-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("{entity} {id} cannot transition: expected status {expected_status}")]
    InvalidTransition {
        entity: &'static str,
        id: i64,
        expected_status: &'static str,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Open a Postgres pool for `database_url` sized by `config`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] when Postgres is unreachable or rejects the login.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect using the database URL and pool sizing from [`AppConfig`].
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] if the URL is blank, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_config(config: &AppConfig) -> Result<PgPool, DbError> {
    if config.database_url.trim().is_empty() {
        return Err(DbError::MissingDatabaseUrl);
    }
    connect_pool(&config.database_url, PoolConfig::from_app_config(config))
        .await
        .map_err(DbError::from)
}

async fn applied_migration_count(pool: &PgPool) -> i64 {
    // A fresh database has no _sqlx_migrations table yet.
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// Apply the embedded migrations and report how many were new.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    let before = applied_migration_count(pool).await;
    MIGRATOR.run(pool).await?;
    let after = applied_migration_count(pool).await;

    Ok(usize::try_from(after.saturating_sub(before)).unwrap_or(0))
}

/// Round-trip a trivial query to prove the store is reachable.
///
/// # Errors
///
/// Returns [`sqlx::Error`] when no connection can serve the query.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}


pub mod admin;
pub mod catalog;
pub mod offers;
pub mod quarantine;
pub mod runs;

pub use admin::{
    ban_offer, bind_pending_match, discard_pending_match, list_active_deals, merge_products,
    purge_pending_matches, unlink_offer, ActiveDealRow, MergeSummary,
};
pub use catalog::{get_product, list_products, load_catalog_index, ProductRow};
pub use offers::{
    get_offer, get_offer_by_url, list_offers_for_product, list_price_history, upsert_offer_by_url,
    OfferRow, OfferUpsert, PriceHistoryRow,
};
pub use quarantine::{
    count_pending_matches, get_pending_match, insert_blacklist_entry,
    insert_pending_match_if_absent, is_blacklisted, list_blacklist_entries, list_pending_matches,
    BlacklistEntryRow, BlacklistReason, PendingMatchRow,
};
pub use runs::{
    cancel_scan_pass, complete_scan_pass, create_scan_pass, fail_scan_pass, finish_execution_log,
    get_scan_pass, list_execution_logs, list_scan_passes, start_execution_log, start_scan_pass,
    ExecutionLogRow, ScanPassRow,
};
