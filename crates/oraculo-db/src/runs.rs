//! Database operations for `scan_passes` and `scraper_execution_logs`.
//!
//! Every status change is a guarded `UPDATE ... WHERE status = ...`; a row
//! that is not in the expected state yields [`DbError::InvalidTransition`],
//! so finished rows are never rewritten.

use chrono::{DateTime, Utc};
use oraculo_core::{RunStatus, Trigger};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const PASS_COLUMNS: &str = "id, public_id, trigger_source, status, started_at, completed_at, \
                            items_found, error_message, created_at";

const LOG_COLUMNS: &str = "id, scan_pass_id, site_name, trigger_source, status, started_at, \
                           completed_at, items_found, error_message";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scan_passes` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScanPassRow {
    pub id: i64,
    pub public_id: Uuid,
    pub trigger_source: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_found: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `scraper_execution_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExecutionLogRow {
    pub id: i64,
    pub scan_pass_id: Option<i64>,
    pub site_name: String,
    pub trigger_source: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_found: i32,
    pub error_message: Option<String>,
}

fn transition_result(
    rows_affected: u64,
    entity: &'static str,
    id: i64,
    expected_status: &'static str,
) -> Result<(), DbError> {
    if rows_affected == 0 {
        return Err(DbError::InvalidTransition {
            entity,
            id,
            expected_status,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// scan_passes
// ---------------------------------------------------------------------------

/// Creates a new pass in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scan_pass(pool: &PgPool, trigger: Trigger) -> Result<ScanPassRow, DbError> {
    let row = sqlx::query_as::<_, ScanPassRow>(&format!(
        "INSERT INTO scan_passes (public_id, trigger_source, status) \
         VALUES ($1, $2, 'queued') \
         RETURNING {PASS_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(trigger.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// `queued` → `running`, stamping `started_at`.
///
/// # Errors
///
/// Returns [`DbError::InvalidTransition`] if the pass is not `queued`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn start_scan_pass(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_passes \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    transition_result(result.rows_affected(), "scan pass", id, "queued")
}

/// `running` → `succeeded`.
///
/// # Errors
///
/// Returns [`DbError::InvalidTransition`] if the pass is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn complete_scan_pass(pool: &PgPool, id: i64, items_found: i32) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_passes \
         SET status = 'succeeded', completed_at = NOW(), items_found = $1 \
         WHERE id = $2 AND status = 'running'",
    )
    .bind(items_found)
    .bind(id)
    .execute(pool)
    .await?;

    transition_result(result.rows_affected(), "scan pass", id, "running")
}

/// `running` → `failed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidTransition`] if the pass is not `running`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn fail_scan_pass(
    pool: &PgPool,
    id: i64,
    items_found: i32,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_passes \
         SET status = 'failed', completed_at = NOW(), items_found = $1, error_message = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(items_found)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    transition_result(result.rows_affected(), "scan pass", id, "running")
}

/// `queued` or `running` → `cancelled`.
///
/// # Errors
///
/// Returns [`DbError::InvalidTransition`] if the pass already finished, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn cancel_scan_pass(pool: &PgPool, id: i64, items_found: i32) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scan_passes \
         SET status = 'cancelled', completed_at = NOW(), items_found = $1 \
         WHERE id = $2 AND status IN ('queued', 'running')",
    )
    .bind(items_found)
    .bind(id)
    .execute(pool)
    .await?;

    transition_result(result.rows_affected(), "scan pass", id, "queued or running")
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scan_pass(pool: &PgPool, id: i64) -> Result<ScanPassRow, DbError> {
    sqlx::query_as::<_, ScanPassRow>(&format!("SELECT {PASS_COLUMNS} FROM scan_passes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` passes, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scan_passes(pool: &PgPool, limit: i64) -> Result<Vec<ScanPassRow>, DbError> {
    let rows = sqlx::query_as::<_, ScanPassRow>(&format!(
        "SELECT {PASS_COLUMNS} FROM scan_passes ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// scraper_execution_logs
// ---------------------------------------------------------------------------

/// Opens a `running` execution log for one site.
///
/// `scan_pass_id` is `None` for ad-hoc single-site runs.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn start_execution_log(
    pool: &PgPool,
    scan_pass_id: Option<i64>,
    site_name: &str,
    trigger: Trigger,
) -> Result<ExecutionLogRow, DbError> {
    let row = sqlx::query_as::<_, ExecutionLogRow>(&format!(
        "INSERT INTO scraper_execution_logs (scan_pass_id, site_name, trigger_source, status) \
         VALUES ($1, $2, $3, 'running') \
         RETURNING {LOG_COLUMNS}"
    ))
    .bind(scan_pass_id)
    .bind(site_name)
    .bind(trigger.as_str())
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Seals a `running` log with its terminal status.
///
/// # Errors
///
/// Returns [`DbError::InvalidRequest`] if `status` is not terminal,
/// [`DbError::InvalidTransition`] if the log was already finished, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn finish_execution_log(
    pool: &PgPool,
    id: i64,
    status: RunStatus,
    items_found: i32,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    if !status.is_terminal() {
        return Err(DbError::InvalidRequest(format!(
            "execution log cannot finish as {status}"
        )));
    }

    let result = sqlx::query(
        "UPDATE scraper_execution_logs \
         SET status = $1, completed_at = NOW(), items_found = $2, error_message = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(status.as_str())
    .bind(items_found)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    transition_result(result.rows_affected(), "execution log", id, "running")
}

/// Logs for one pass in start order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_execution_logs(
    pool: &PgPool,
    scan_pass_id: i64,
) -> Result<Vec<ExecutionLogRow>, DbError> {
    let rows = sqlx::query_as::<_, ExecutionLogRow>(&format!(
        "SELECT {LOG_COLUMNS} FROM scraper_execution_logs \
         WHERE scan_pass_id = $1 \
         ORDER BY started_at, id"
    ))
    .bind(scan_pass_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
