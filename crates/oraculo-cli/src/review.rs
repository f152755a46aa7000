//! Store inspection and administration command handlers.

use oraculo_core::AppConfig;
use oraculo_db::BlacklistReason;
use rust_decimal::Decimal;

const PENDING_PAGE_SIZE: i64 = 50;

/// Print recent scan passes with one line per site.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let passes = oraculo_db::list_scan_passes(pool, limit).await?;
    if passes.is_empty() {
        println!("no scan passes recorded; run `oraculo scan` first");
        return Ok(());
    }

    for pass in passes {
        let started = pass
            .started_at
            .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "#{:<5} {:<10} {:<9} {:>5} items  started {started}",
            pass.id, pass.status, pass.trigger_source, pass.items_found
        );
        if let Some(error) = &pass.error_message {
            println!("       error: {error}");
        }
        for log in oraculo_db::list_execution_logs(pool, pass.id).await? {
            println!(
                "       {:<14} {:<10} {:>5} items{}",
                log.site_name,
                log.status,
                log.items_found,
                log.error_message
                    .as_deref()
                    .map(|e| format!("  ({e})"))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

/// Print one page of the quarantine, oldest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_pending(pool: &sqlx::PgPool, page: i64) -> anyhow::Result<()> {
    let page = page.max(1);
    let total = oraculo_db::count_pending_matches(pool).await?;
    let rows =
        oraculo_db::list_pending_matches(pool, PENDING_PAGE_SIZE, (page - 1) * PENDING_PAGE_SIZE)
            .await?;

    let pages = (total + PENDING_PAGE_SIZE - 1) / PENDING_PAGE_SIZE;
    println!("{total} pending matches (page {page} of {})", pages.max(1));
    for row in rows {
        let hint = match (row.candidate_product_id, row.candidate_score) {
            (Some(id), Some(score)) => format!("candidate #{id} ({score:.2})"),
            _ => "no candidate".to_owned(),
        };
        println!(
            "#{:<6} {:<12} {:>9} {}  {}  [{hint}]",
            row.id, row.shop_name, row.price, row.currency, row.scraped_name
        );
        println!("        {}", row.url);
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the pending match or product does not exist.
pub(crate) async fn run_bind(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    pending_id: i64,
    product_id: i64,
) -> anyhow::Result<()> {
    let upsert =
        oraculo_db::bind_pending_match(pool, pending_id, product_id, &config.deal_policy()).await?;
    if upsert.offer.product_id == product_id {
        println!(
            "pending #{pending_id} bound to product #{product_id} as offer #{}",
            upsert.offer.id
        );
    } else {
        println!(
            "url was already bound to product #{}; refreshed offer #{}",
            upsert.offer.product_id, upsert.offer.id
        );
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the pending match does not exist.
pub(crate) async fn run_discard(pool: &sqlx::PgPool, pending_id: i64) -> anyhow::Result<()> {
    oraculo_db::discard_pending_match(pool, pending_id, BlacklistReason::UserDiscarded).await?;
    println!("pending #{pending_id} discarded and blacklisted");
    Ok(())
}

/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_purge(pool: &sqlx::PgPool, shop: Option<&str>) -> anyhow::Result<()> {
    let purged = oraculo_db::purge_pending_matches(pool, shop).await?;
    match shop {
        Some(shop) => println!("purged {purged} pending matches from {shop}"),
        None => println!("purged {purged} pending matches"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the offer does not exist.
pub(crate) async fn run_unlink(pool: &sqlx::PgPool, offer_id: i64) -> anyhow::Result<()> {
    oraculo_db::unlink_offer(pool, offer_id).await?;
    println!("offer #{offer_id} moved back to quarantine");
    Ok(())
}

/// # Errors
///
/// Returns an error if the offer does not exist.
pub(crate) async fn run_ban(pool: &sqlx::PgPool, offer_id: i64) -> anyhow::Result<()> {
    oraculo_db::ban_offer(pool, offer_id, BlacklistReason::AdminOfferBan).await?;
    println!("offer #{offer_id} deleted and its url blacklisted");
    Ok(())
}

/// # Errors
///
/// Returns an error if the ids are equal or either product does not exist.
pub(crate) async fn run_merge(
    pool: &sqlx::PgPool,
    source_id: i64,
    target_id: i64,
) -> anyhow::Result<()> {
    let summary = oraculo_db::merge_products(pool, source_id, target_id).await?;
    println!(
        "merged product #{source_id} into #{target_id}: {} offers, {} quarantine candidates moved",
        summary.offers_moved, summary.candidates_moved
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_deals(pool: &sqlx::PgPool, min_discount: Decimal) -> anyhow::Result<()> {
    let deals = oraculo_db::list_active_deals(pool, min_discount).await?;
    if deals.is_empty() {
        println!("no offers at least {}% below their high", min_discount * Decimal::ONE_HUNDRED);
        return Ok(());
    }

    for deal in deals {
        println!(
            "{:>5.1}%  {:>9} (was {:>9})  {:<12} {}",
            deal.discount * Decimal::ONE_HUNDRED,
            deal.price,
            deal.max_price,
            deal.shop_name,
            deal.product_name
        );
        println!("        {}", deal.url);
    }
    Ok(())
}
