//! Merges scraped offers into the store.
//!
//! For each offer, in order: a URL that already has an offer only has its
//! price refreshed; a blacklisted URL is dropped; otherwise the catalog is
//! searched and the offer is bound to the best candidate when it clears the
//! bind threshold, or quarantined with that candidate as a hint.

use chrono::Utc;
use oraculo_core::{CatalogIndex, DealAlert, DealPolicy, Matcher, ScrapedOffer};
use oraculo_db::{DbError, OfferUpsert};
use sqlx::PgPool;

use crate::alerts::AlertSink;

/// Counts of what happened to each offer in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Known URLs whose price and availability were refreshed.
    pub updated: usize,
    /// New offers bound to a catalog product.
    pub bound: usize,
    pub quarantined: usize,
    /// Unmatched URLs that were already in quarantine.
    pub already_pending: usize,
    pub blacklisted: usize,
    pub alerts: usize,
}

impl ReconcileStats {
    pub fn merge(&mut self, other: ReconcileStats) {
        self.updated += other.updated;
        self.bound += other.bound;
        self.quarantined += other.quarantined;
        self.already_pending += other.already_pending;
        self.blacklisted += other.blacklisted;
        self.alerts += other.alerts;
    }
}

pub struct Reconciler<'a> {
    pool: &'a PgPool,
    catalog: &'a CatalogIndex,
    matcher: Matcher,
    bind_threshold: f64,
    policy: DealPolicy,
    sink: &'a dyn AlertSink,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub fn new(
        pool: &'a PgPool,
        catalog: &'a CatalogIndex,
        matcher: Matcher,
        bind_threshold: f64,
        policy: DealPolicy,
        sink: &'a dyn AlertSink,
    ) -> Self {
        Self {
            pool,
            catalog,
            matcher,
            bind_threshold,
            policy,
            sink,
        }
    }

    /// Reconcile one batch of offers.
    ///
    /// # Errors
    ///
    /// Returns the first [`DbError`] hit; offers before it stay committed.
    pub async fn reconcile(&self, offers: &[ScrapedOffer]) -> Result<ReconcileStats, DbError> {
        let mut stats = ReconcileStats::default();
        for offer in offers {
            self.reconcile_one(offer, &mut stats).await?;
        }
        Ok(stats)
    }

    async fn reconcile_one(
        &self,
        offer: &ScrapedOffer,
        stats: &mut ReconcileStats,
    ) -> Result<(), DbError> {
        if let Some(existing) = oraculo_db::get_offer_by_url(self.pool, &offer.url).await? {
            let upsert = oraculo_db::upsert_offer_by_url(
                self.pool,
                &offer.to_write_request(existing.product_id),
                &self.policy,
            )
            .await?;
            stats.updated += 1;
            self.emit_deal(&upsert, stats);
            return Ok(());
        }

        if oraculo_db::is_blacklisted(self.pool, &offer.url).await? {
            tracing::debug!(url = %offer.url, "skipping blacklisted listing");
            stats.blacklisted += 1;
            return Ok(());
        }

        let candidate = self.catalog.best_match(&self.matcher, &offer.name, &offer.url);

        if let Some(best) = candidate
            .as_ref()
            .filter(|c| c.outcome.score >= self.bind_threshold)
        {
            let upsert = oraculo_db::upsert_offer_by_url(
                self.pool,
                &offer.to_write_request(best.product_id),
                &self.policy,
            )
            .await?;
            if upsert.created {
                tracing::info!(
                    shop = %offer.shop_name,
                    listing = %offer.name,
                    product = %best.product_name,
                    score = best.outcome.score,
                    "bound new offer"
                );
                stats.bound += 1;
            } else {
                // Another site task bound the same URL first.
                stats.updated += 1;
            }
            self.emit_deal(&upsert, stats);
            return Ok(());
        }

        let hint = candidate
            .as_ref()
            .map(|c| (c.product_id, c.outcome.score));
        let inserted =
            oraculo_db::insert_pending_match_if_absent(self.pool, &offer.to_pending_draft(hint))
                .await?;
        if inserted {
            tracing::debug!(
                shop = %offer.shop_name,
                listing = %offer.name,
                best_score = hint.map(|(_, score)| score),
                "quarantined listing"
            );
            stats.quarantined += 1;
        } else {
            stats.already_pending += 1;
        }
        Ok(())
    }

    fn emit_deal(&self, upsert: &OfferUpsert, stats: &mut ReconcileStats) {
        let Some(signal) = upsert.deal else {
            return;
        };
        let offer = &upsert.offer;
        let Some(max_price) = offer.max_price else {
            return;
        };
        let product_name = self
            .catalog
            .product_name(offer.product_id)
            .map_or_else(|| format!("product #{}", offer.product_id), str::to_owned);

        self.sink.emit(DealAlert {
            product_id: offer.product_id,
            product_name,
            offer_id: offer.id,
            shop_name: offer.shop_name.clone(),
            url: offer.url.clone(),
            price: offer.price,
            max_price,
            discount: signal.discount,
            severity: signal.severity,
            detected_at: Utc::now(),
        });
        stats.alerts += 1;
    }
}
