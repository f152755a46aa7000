//! Database operations for `pending_matches` and `blacklist_entries`.

use chrono::{DateTime, Utc};
use oraculo_core::PendingMatchDraft;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

const PENDING_COLUMNS: &str = "id, scraped_name, price, currency, url, shop_name, image_url, \
                               is_available, candidate_product_id, candidate_score, found_at";

/// Why a URL was excluded from reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlacklistReason {
    /// Rejected while reviewing quarantine.
    UserDiscarded,
    /// Bulk purge of quarantine.
    PurgatoryDiscard,
    /// A bound offer was banned.
    AdminOfferBan,
}

impl BlacklistReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BlacklistReason::UserDiscarded => "user_discarded",
            BlacklistReason::PurgatoryDiscard => "purgatory_discard",
            BlacklistReason::AdminOfferBan => "admin_offer_ban",
        }
    }
}

impl std::fmt::Display for BlacklistReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `pending_matches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingMatchRow {
    pub id: i64,
    pub scraped_name: String,
    pub price: Decimal,
    pub currency: String,
    pub url: String,
    pub shop_name: String,
    pub image_url: Option<String>,
    pub is_available: bool,
    /// Best accepted catalog candidate seen by the matcher, if any.
    pub candidate_product_id: Option<i64>,
    pub candidate_score: Option<f64>,
    pub found_at: DateTime<Utc>,
}

/// A row from the `blacklist_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BlacklistEntryRow {
    pub id: i64,
    pub url: String,
    pub scraped_name: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// pending_matches
// ---------------------------------------------------------------------------

/// Quarantines a listing unless its URL is already quarantined.
///
/// Returns `true` if a row was inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_pending_match_if_absent(
    pool: &PgPool,
    draft: &PendingMatchDraft,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO pending_matches \
             (scraped_name, price, currency, url, shop_name, image_url, \
              is_available, candidate_product_id, candidate_score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(&draft.scraped_name)
    .bind(draft.price)
    .bind(&draft.currency)
    .bind(&draft.url)
    .bind(&draft.shop_name)
    .bind(&draft.image_url)
    .bind(draft.available)
    .bind(draft.candidate_product_id)
    .bind(draft.candidate_score)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Fetches a single pending match by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_pending_match(pool: &PgPool, id: i64) -> Result<PendingMatchRow, DbError> {
    sqlx::query_as::<_, PendingMatchRow>(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_matches WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

pub(crate) async fn lock_pending_match(
    conn: &mut PgConnection,
    id: i64,
) -> Result<PendingMatchRow, DbError> {
    sqlx::query_as::<_, PendingMatchRow>(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_matches WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// One page of quarantine, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_matches(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<PendingMatchRow>, DbError> {
    let rows = sqlx::query_as::<_, PendingMatchRow>(&format!(
        "SELECT {PENDING_COLUMNS} FROM pending_matches \
         ORDER BY found_at, id \
         LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_pending_matches(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pending_matches")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// blacklist_entries
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn is_blacklisted(pool: &PgPool, url: &str) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM blacklist_entries WHERE url = $1)",
    )
    .bind(url)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Excludes `url` from future reconciliation. Re-blacklisting is a no-op.
///
/// Returns `true` if a row was inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_blacklist_entry(
    pool: &PgPool,
    url: &str,
    scraped_name: Option<&str>,
    reason: BlacklistReason,
) -> Result<bool, DbError> {
    let mut conn = pool.acquire().await?;
    insert_blacklist_in_tx(&mut conn, url, scraped_name, reason).await
}

pub(crate) async fn insert_blacklist_in_tx(
    conn: &mut PgConnection,
    url: &str,
    scraped_name: Option<&str>,
    reason: BlacklistReason,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO blacklist_entries (url, scraped_name, reason) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(url)
    .bind(scraped_name)
    .bind(reason.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent exclusions first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_blacklist_entries(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<BlacklistEntryRow>, DbError> {
    let rows = sqlx::query_as::<_, BlacklistEntryRow>(
        "SELECT id, url, scraped_name, reason, created_at \
         FROM blacklist_entries \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
