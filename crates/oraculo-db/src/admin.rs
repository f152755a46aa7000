//! Administrative mutations used by external review tools.
//!
//! Each operation runs in one transaction and goes through the same
//! URL-keyed write path as the pipeline, so bound offers stay bound and
//! history stays append-only.

use oraculo_core::{DealPolicy, StoreWriteRequest};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use crate::offers::{upsert_offer_in_tx, OfferRow, OfferUpsert};
use crate::quarantine::{insert_blacklist_in_tx, lock_pending_match, BlacklistReason};
use crate::DbError;

/// An available offer currently priced well below its historical high.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveDealRow {
    pub offer_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub shop_name: String,
    pub url: String,
    pub price: Decimal,
    pub max_price: Decimal,
    pub discount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub offers_moved: u64,
    pub candidates_moved: u64,
}

async fn ensure_product(conn: &mut PgConnection, product_id: i64) -> Result<String, DbError> {
    sqlx::query_scalar::<_, String>("SELECT name FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(DbError::NotFound)
}

async fn lock_offer(conn: &mut PgConnection, offer_id: i64) -> Result<OfferRow, DbError> {
    sqlx::query_as::<_, OfferRow>(
        "SELECT id, product_id, shop_name, url, price, currency, is_available, \
                min_price, max_price, last_seen_at, created_at, updated_at \
         FROM offers WHERE id = $1 FOR UPDATE",
    )
    .bind(offer_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DbError::NotFound)
}

/// Turns a quarantined listing into an offer of `product_id`.
///
/// If the URL was bound meanwhile, the existing binding is kept and only its
/// price is refreshed.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the pending match or product does not
/// exist, or [`DbError::Sqlx`] on any database failure.
pub async fn bind_pending_match(
    pool: &PgPool,
    pending_id: i64,
    product_id: i64,
    policy: &DealPolicy,
) -> Result<OfferUpsert, DbError> {
    let mut tx = pool.begin().await?;

    let pending = lock_pending_match(&mut tx, pending_id).await?;
    ensure_product(&mut tx, product_id).await?;

    let request = StoreWriteRequest {
        product_id,
        shop_name: pending.shop_name.clone(),
        price: pending.price,
        currency: pending.currency.clone(),
        url: pending.url.clone(),
        available: pending.is_available,
    };
    let upsert = upsert_offer_in_tx(&mut tx, &request, policy).await?;

    sqlx::query("DELETE FROM pending_matches WHERE id = $1")
        .bind(pending_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(
        pending_id,
        product_id = upsert.offer.product_id,
        offer_id = upsert.offer.id,
        "bound pending match"
    );
    Ok(upsert)
}

/// Blacklists a quarantined listing and removes it from quarantine.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the pending match does not exist, or
/// [`DbError::Sqlx`] on any database failure.
pub async fn discard_pending_match(
    pool: &PgPool,
    pending_id: i64,
    reason: BlacklistReason,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let pending = lock_pending_match(&mut tx, pending_id).await?;
    insert_blacklist_in_tx(&mut tx, &pending.url, Some(&pending.scraped_name), reason).await?;
    sqlx::query("DELETE FROM pending_matches WHERE id = $1")
        .bind(pending_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Empties quarantine in one statement, blacklisting every purged URL as
/// [`BlacklistReason::PurgatoryDiscard`]. `shop` limits the purge to one site.
///
/// Returns the number of listings purged.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] on any database failure.
pub async fn purge_pending_matches(pool: &PgPool, shop: Option<&str>) -> Result<u64, DbError> {
    let purged = sqlx::query_scalar::<_, i64>(
        "WITH purged AS ( \
             DELETE FROM pending_matches \
             WHERE $1::TEXT IS NULL OR shop_name = $1 \
             RETURNING url, scraped_name \
         ), listed AS ( \
             INSERT INTO blacklist_entries (url, scraped_name, reason) \
             SELECT url, scraped_name, $2 FROM purged \
             ON CONFLICT (url) DO NOTHING \
         ) \
         SELECT COUNT(*) FROM purged",
    )
    .bind(shop)
    .bind(BlacklistReason::PurgatoryDiscard.as_str())
    .fetch_one(pool)
    .await?;

    tracing::info!(purged, shop = shop.unwrap_or("*"), "purged quarantine");
    Ok(u64::try_from(purged).unwrap_or(0))
}

/// Detaches an offer from its product and sends its URL back to quarantine.
///
/// The offer and its price history are deleted. The quarantined copy is
/// named after the product it was bound to.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the offer does not exist, or
/// [`DbError::Sqlx`] on any database failure.
pub async fn unlink_offer(pool: &PgPool, offer_id: i64) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let offer = lock_offer(&mut tx, offer_id).await?;
    sqlx::query(
        "INSERT INTO pending_matches \
             (scraped_name, price, currency, url, shop_name, image_url, is_available) \
         SELECT p.name, $2, $3, $4, $5, p.image_url, $6 \
         FROM products p WHERE p.id = $1 \
         ON CONFLICT (url) DO NOTHING",
    )
    .bind(offer.product_id)
    .bind(offer.price)
    .bind(&offer.currency)
    .bind(&offer.url)
    .bind(&offer.shop_name)
    .bind(offer.is_available)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM offers WHERE id = $1")
        .bind(offer_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(offer_id, url = %offer.url, "unlinked offer");
    Ok(())
}

/// Deletes an offer and blacklists its URL.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the offer does not exist, or
/// [`DbError::Sqlx`] on any database failure.
pub async fn ban_offer(pool: &PgPool, offer_id: i64, reason: BlacklistReason) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let offer = lock_offer(&mut tx, offer_id).await?;
    let product_name = ensure_product(&mut tx, offer.product_id).await?;
    insert_blacklist_in_tx(&mut tx, &offer.url, Some(&product_name), reason).await?;
    sqlx::query("DELETE FROM offers WHERE id = $1")
        .bind(offer_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(offer_id, url = %offer.url, %reason, "banned offer");
    Ok(())
}

/// Folds `source_id` into `target_id`: offers and quarantine candidates are
/// re-pointed, then the source product is deleted.
///
/// # Errors
///
/// Returns [`DbError::InvalidRequest`] if both ids are equal,
/// [`DbError::NotFound`] if either product does not exist, or
/// [`DbError::Sqlx`] on any database failure.
pub async fn merge_products(
    pool: &PgPool,
    source_id: i64,
    target_id: i64,
) -> Result<MergeSummary, DbError> {
    if source_id == target_id {
        return Err(DbError::InvalidRequest(
            "cannot merge a product into itself".to_owned(),
        ));
    }

    let mut tx = pool.begin().await?;
    ensure_product(&mut tx, source_id).await?;
    ensure_product(&mut tx, target_id).await?;

    let offers_moved = sqlx::query(
        "UPDATE offers SET product_id = $1, updated_at = NOW() WHERE product_id = $2",
    )
    .bind(target_id)
    .bind(source_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let candidates_moved = sqlx::query(
        "UPDATE pending_matches SET candidate_product_id = $1 WHERE candidate_product_id = $2",
    )
    .bind(target_id)
    .bind(source_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(source_id, target_id, offers_moved, "merged products");
    Ok(MergeSummary {
        offers_moved,
        candidates_moved,
    })
}

/// Available offers at least `min_discount` below their historical high,
/// deepest discount first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_deals(
    pool: &PgPool,
    min_discount: Decimal,
) -> Result<Vec<ActiveDealRow>, DbError> {
    let rows = sqlx::query_as::<_, ActiveDealRow>(
        "SELECT o.id AS offer_id, o.product_id, p.name AS product_name, o.shop_name, o.url, \
                o.price, o.max_price, ROUND(1 - o.price / o.max_price, 4) AS discount \
         FROM offers o \
         JOIN products p ON p.id = o.product_id \
         WHERE o.is_available \
           AND o.max_price > 0 \
           AND 1 - o.price / o.max_price >= $1 \
         ORDER BY discount DESC, o.id",
    )
    .bind(min_discount)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
