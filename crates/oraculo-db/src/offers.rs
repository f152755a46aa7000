//! Database operations for `offers` and `price_history`.
//!
//! [`upsert_offer_by_url`] is the single write path for offer prices, used by
//! the reconciliation pipeline and the administrative operations alike.

use chrono::{DateTime, Utc};
use oraculo_core::{observe_price, DealPolicy, DealSignal, PriceTrajectory, StoreWriteRequest};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::DbError;

const OFFER_COLUMNS: &str = "id, product_id, shop_name, url, price, currency, is_available, \
                             min_price, max_price, last_seen_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `offers` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OfferRow {
    pub id: i64,
    pub product_id: i64,
    pub shop_name: String,
    pub url: String,
    pub price: Decimal,
    pub currency: String,
    pub is_available: bool,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OfferRow {
    #[must_use]
    pub fn trajectory(&self) -> PriceTrajectory {
        PriceTrajectory {
            price: self.price,
            min_price: self.min_price,
            max_price: self.max_price,
        }
    }
}

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub offer_id: i64,
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Result of [`upsert_offer_by_url`].
#[derive(Debug, Clone)]
pub struct OfferUpsert {
    pub offer: OfferRow,
    /// `true` when this call inserted the row.
    pub created: bool,
    pub history_recorded: bool,
    /// Set when the write established a new low that qualifies as a deal.
    pub deal: Option<DealSignal>,
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Looks up the offer bound to `url`, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_offer_by_url(pool: &PgPool, url: &str) -> Result<Option<OfferRow>, DbError> {
    let row = sqlx::query_as::<_, OfferRow>(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetches a single offer by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_offer(pool: &PgPool, id: i64) -> Result<OfferRow, DbError> {
    sqlx::query_as::<_, OfferRow>(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// All offers attached to a product, cheapest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_offers_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<OfferRow>, DbError> {
    let rows = sqlx::query_as::<_, OfferRow>(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE product_id = $1 ORDER BY price, id"
    ))
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Price history of one offer, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_price_history(
    pool: &PgPool,
    offer_id: i64,
) -> Result<Vec<PriceHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, PriceHistoryRow>(
        "SELECT id, offer_id, price, recorded_at \
         FROM price_history \
         WHERE offer_id = $1 \
         ORDER BY recorded_at, id",
    )
    .bind(offer_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Write path
// ---------------------------------------------------------------------------

/// Creates or updates the offer keyed by `request.url` in one transaction.
///
/// A new URL is inserted under `request.product_id` with `min = max = price`
/// and an initial history entry. An existing URL keeps its `product_id`
/// whatever the request says; only price, currency and availability move,
/// the min/max trajectory is advanced and history is appended when the price
/// changed by more than one cent.
///
/// Concurrent calls for the same URL serialize on the row lock, so replays
/// never produce duplicate offers.
///
/// # Errors
///
/// Returns [`DbError::InvalidRequest`] for a non-positive price, or
/// [`DbError::Sqlx`] if any statement fails (the transaction is rolled back).
pub async fn upsert_offer_by_url(
    pool: &PgPool,
    request: &StoreWriteRequest,
    policy: &DealPolicy,
) -> Result<OfferUpsert, DbError> {
    let mut tx = pool.begin().await?;
    let result = upsert_offer_in_tx(&mut tx, request, policy).await?;
    tx.commit().await?;
    Ok(result)
}

pub(crate) async fn upsert_offer_in_tx(
    conn: &mut PgConnection,
    request: &StoreWriteRequest,
    policy: &DealPolicy,
) -> Result<OfferUpsert, DbError> {
    if request.price <= Decimal::ZERO {
        return Err(DbError::InvalidRequest(format!(
            "offer price must be positive, got {}",
            request.price
        )));
    }

    let inserted = sqlx::query_as::<_, OfferRow>(&format!(
        "INSERT INTO offers \
             (product_id, shop_name, url, price, currency, is_available, min_price, max_price) \
         VALUES ($1, $2, $3, $4, $5, $6, $4, $4) \
         ON CONFLICT (url) DO NOTHING \
         RETURNING {OFFER_COLUMNS}"
    ))
    .bind(request.product_id)
    .bind(&request.shop_name)
    .bind(&request.url)
    .bind(request.price)
    .bind(&request.currency)
    .bind(request.available)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(offer) = inserted {
        insert_history(conn, offer.id, offer.price).await?;
        // The URL is bound now; any quarantined copy is stale.
        sqlx::query("DELETE FROM pending_matches WHERE url = $1")
            .bind(&offer.url)
            .execute(&mut *conn)
            .await?;

        return Ok(OfferUpsert {
            offer,
            created: true,
            history_recorded: true,
            deal: None,
        });
    }

    let existing = sqlx::query_as::<_, OfferRow>(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers WHERE url = $1 FOR UPDATE"
    ))
    .bind(&request.url)
    .fetch_one(&mut *conn)
    .await?;

    if existing.product_id != request.product_id {
        tracing::debug!(
            offer_id = existing.id,
            bound_product_id = existing.product_id,
            requested_product_id = request.product_id,
            "offer already bound; keeping existing product"
        );
    }

    let observation = observe_price(&existing.trajectory(), request.price, policy);
    let trajectory = observation.trajectory;

    let offer = sqlx::query_as::<_, OfferRow>(&format!(
        "UPDATE offers SET \
             price        = $1, \
             currency     = $2, \
             is_available = $3, \
             min_price    = $4, \
             max_price    = $5, \
             last_seen_at = NOW(), \
             updated_at   = NOW() \
         WHERE id = $6 \
         RETURNING {OFFER_COLUMNS}"
    ))
    .bind(trajectory.price)
    .bind(&request.currency)
    .bind(request.available)
    .bind(trajectory.min_price)
    .bind(trajectory.max_price)
    .bind(existing.id)
    .fetch_one(&mut *conn)
    .await?;

    if observation.record_history {
        insert_history(conn, offer.id, offer.price).await?;
    }

    Ok(OfferUpsert {
        offer,
        created: false,
        history_recorded: observation.record_history,
        deal: observation.deal,
    })
}

async fn insert_history(conn: &mut PgConnection, offer_id: i64, price: Decimal) -> Result<(), DbError> {
    sqlx::query("INSERT INTO price_history (offer_id, price) VALUES ($1, $2)")
        .bind(offer_id)
        .bind(price)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
