//! Read access to the `products` catalog.
//!
//! Products are seeded by external tooling; this crate never inserts them.

use chrono::{DateTime, Utc};
use oraculo_core::CatalogIndex;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// Identifier in an external collector catalog, when known.
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returns every product ordered by `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(pool: &PgPool) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, category, image_url, external_ref, created_at, updated_at \
         FROM products \
         ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single product by `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, category, image_url, external_ref, created_at, updated_at \
         FROM products \
         WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Loads `(id, name)` for the whole catalog and tokenizes it for matching.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn load_catalog_index(pool: &PgPool) -> Result<CatalogIndex, DbError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM products ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(CatalogIndex::new(rows))
}
