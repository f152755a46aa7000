//! Scan passes: every enabled site crawled once, concurrently, with results
//! reconciled into the store page by page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use oraculo_core::{AppConfig, CatalogIndex, DealPolicy, Matcher, RunStatus, Trigger};
use oraculo_db::DbError;
use oraculo_scraper::{crawl, ScrapeSession, SessionPolicy, SiteAdapter};
use sqlx::PgPool;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::alerts::AlertSink;
use crate::error::PipelineError;
use crate::reconcile::{ReconcileStats, Reconciler};

/// Cooperative cancellation flag.
///
/// Clones share the same flag. Sites not yet started are skipped; a site
/// already crawling finishes its current page and stops there. The flag is
/// cleared when the pass ends, so a stop raised before a pass begins
/// cancels that pass.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Snapshot of the pass currently running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub total: usize,
    pub completed: usize,
    /// Site most recently started.
    pub current: Option<String>,
    pub percent: u8,
}

impl ScanProgress {
    fn starting(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn site_finished(&mut self) {
        self.completed = (self.completed + 1).min(self.total);
        self.percent = if self.total == 0 {
            100
        } else {
            u8::try_from(self.completed * 100 / self.total).unwrap_or(100)
        };
    }
}

/// Tunables for a pass, usually taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PassSettings {
    pub session: SessionPolicy,
    pub matcher: Matcher,
    /// Minimum score for binding a new URL without review.
    pub bind_threshold: f64,
    pub deal_policy: DealPolicy,
    pub max_concurrent_sites: usize,
}

impl PassSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            session: SessionPolicy::from_app_config(config),
            matcher: config.matcher(),
            bind_threshold: config.bind_threshold,
            deal_policy: config.deal_policy(),
            max_concurrent_sites: config.scraper_max_concurrent_sites,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteReport {
    pub site: String,
    pub status: RunStatus,
    pub items_found: usize,
    pub pages: usize,
    pub skipped: usize,
    pub stats: ReconcileStats,
    pub error: Option<String>,
}

impl SiteReport {
    fn new(site: &str, status: RunStatus) -> Self {
        Self {
            site: site.to_owned(),
            status,
            items_found: 0,
            pages: 0,
            skipped: 0,
            stats: ReconcileStats::default(),
            error: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub pass_id: i64,
    pub public_id: Uuid,
    pub status: RunStatus,
    /// Per-site outcomes in completion order.
    pub sites: Vec<SiteReport>,
    pub items_found: usize,
    pub alerts: usize,
}

impl PassReport {
    #[must_use]
    pub fn site(&self, name: &str) -> Option<&SiteReport> {
        self.sites.iter().find(|s| s.site == name)
    }

    #[must_use]
    pub fn failed_sites(&self) -> usize {
        self.sites
            .iter()
            .filter(|s| matches!(s.status, RunStatus::Failed | RunStatus::Partial))
            .count()
    }
}

struct PassContext<'a> {
    pass_id: i64,
    trigger: Trigger,
    catalog: &'a CatalogIndex,
    session: &'a ScrapeSession,
}

pub struct Orchestrator {
    pool: PgPool,
    adapters: Vec<Arc<dyn SiteAdapter>>,
    settings: PassSettings,
    sink: Arc<dyn AlertSink>,
    stop: StopSignal,
    progress: watch::Sender<ScanProgress>,
    running: Mutex<()>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        pool: PgPool,
        adapters: Vec<Arc<dyn SiteAdapter>>,
        settings: PassSettings,
        sink: Arc<dyn AlertSink>,
    ) -> Self {
        let (progress, _) = watch::channel(ScanProgress::default());
        Self {
            pool,
            adapters,
            settings,
            sink,
            stop: StopSignal::new(),
            progress,
            running: Mutex::new(()),
        }
    }

    /// Handle that aborts the running pass at the next page boundary.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    #[must_use]
    pub fn site_count(&self) -> usize {
        self.adapters.len()
    }

    /// Run one scan pass over every configured site.
    ///
    /// Site failures are recorded in their execution logs and do not fail
    /// the pass. A store failure does: remaining sites are not started,
    /// running sites stop after their current page and the pass is marked
    /// `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::PassInProgress`] if another pass is running,
    /// [`PipelineError::Db`] on store failures, or [`PipelineError::Scraper`]
    /// if the HTTP session cannot be built.
    pub async fn run_pass(&self, trigger: Trigger) -> Result<PassReport, PipelineError> {
        let Ok(_guard) = self.running.try_lock() else {
            return Err(PipelineError::PassInProgress);
        };
        let result = self.execute_pass(trigger).await;
        self.stop.reset();
        result
    }

    async fn execute_pass(&self, trigger: Trigger) -> Result<PassReport, PipelineError> {
        let pass = oraculo_db::create_scan_pass(&self.pool, trigger).await?;
        oraculo_db::start_scan_pass(&self.pool, pass.id).await?;
        tracing::info!(
            pass_id = pass.id,
            public_id = %pass.public_id,
            %trigger,
            sites = self.adapters.len(),
            "scan pass started"
        );

        let catalog = match oraculo_db::load_catalog_index(&self.pool).await {
            Ok(catalog) => catalog,
            Err(err) => {
                fail_pass_best_effort(&self.pool, pass.id, 0, &err.to_string()).await;
                return Err(err.into());
            }
        };
        let session = match ScrapeSession::open(self.settings.session.clone()) {
            Ok(session) => session,
            Err(err) => {
                fail_pass_best_effort(&self.pool, pass.id, 0, &err.to_string()).await;
                return Err(err.into());
            }
        };

        self.progress
            .send_replace(ScanProgress::starting(self.adapters.len()));

        let ctx = PassContext {
            pass_id: pass.id,
            trigger,
            catalog: &catalog,
            session: &session,
        };
        let max_concurrent = self.settings.max_concurrent_sites.max(1);

        let site_runs: Vec<_> = self
            .adapters
            .iter()
            .map(|adapter| self.run_site(&ctx, adapter.as_ref()))
            .collect();
        let results: Vec<(SiteReport, Option<DbError>)> = stream::iter(site_runs)
            .buffer_unordered(max_concurrent)
            .collect()
            .await;

        let mut sites = Vec::with_capacity(results.len());
        let mut fatal = None;
        for (report, error) in results {
            sites.push(report);
            if fatal.is_none() {
                fatal = error;
            }
        }

        let items_found: usize = sites.iter().map(|s| s.items_found).sum();
        let alerts: usize = sites.iter().map(|s| s.stats.alerts).sum();
        let items_i32 = saturating_i32(items_found);

        if let Some(err) = fatal {
            tracing::error!(pass_id = pass.id, error = %err, "scan pass aborted by store error");
            fail_pass_best_effort(&self.pool, pass.id, items_i32, &err.to_string()).await;
            return Err(err.into());
        }

        let status = if self.stop.is_stopped() {
            oraculo_db::cancel_scan_pass(&self.pool, pass.id, items_i32).await?;
            RunStatus::Cancelled
        } else {
            if let Err(err) = oraculo_db::complete_scan_pass(&self.pool, pass.id, items_i32).await {
                fail_pass_best_effort(&self.pool, pass.id, items_i32, &err.to_string()).await;
                return Err(err.into());
            }
            RunStatus::Succeeded
        };

        let report = PassReport {
            pass_id: pass.id,
            public_id: pass.public_id,
            status,
            sites,
            items_found,
            alerts,
        };
        let failed_sites = report.failed_sites();
        if failed_sites > 0 {
            tracing::warn!(
                pass_id = pass.id,
                failed_sites,
                total_sites = report.sites.len(),
                "some sites failed during the scan pass"
            );
        }
        tracing::info!(
            pass_id = pass.id,
            %status,
            items_found,
            alerts,
            "scan pass finished"
        );
        Ok(report)
    }

    /// Crawl and reconcile one site. The second element is set only for
    /// store errors, which abort the whole pass.
    async fn run_site(
        &self,
        ctx: &PassContext<'_>,
        adapter: &dyn SiteAdapter,
    ) -> (SiteReport, Option<DbError>) {
        let name = adapter.site().name.as_str();
        let outcome = if self.stop.is_stopped() {
            self.record_cancelled(ctx, name).await
        } else {
            self.progress
                .send_modify(|p| p.current = Some(name.to_owned()));
            self.crawl_site(ctx, adapter).await
        };
        self.progress.send_modify(ScanProgress::site_finished);
        outcome
    }

    async fn record_cancelled(
        &self,
        ctx: &PassContext<'_>,
        name: &str,
    ) -> (SiteReport, Option<DbError>) {
        tracing::info!(site = %name, "stop requested; skipping site");
        let report = SiteReport::new(name, RunStatus::Cancelled);
        let log = match oraculo_db::start_execution_log(
            &self.pool,
            Some(ctx.pass_id),
            name,
            ctx.trigger,
        )
        .await
        {
            Ok(log) => log,
            Err(err) => return (report, Some(err)),
        };
        let sealed =
            oraculo_db::finish_execution_log(&self.pool, log.id, RunStatus::Cancelled, 0, None)
                .await;
        (report, sealed.err())
    }

    async fn crawl_site(
        &self,
        ctx: &PassContext<'_>,
        adapter: &dyn SiteAdapter,
    ) -> (SiteReport, Option<DbError>) {
        let name = adapter.site().name.as_str();
        let mut report = SiteReport::new(name, RunStatus::Running);

        let log = match oraculo_db::start_execution_log(
            &self.pool,
            Some(ctx.pass_id),
            name,
            ctx.trigger,
        )
        .await
        {
            Ok(log) => log,
            Err(err) => {
                self.stop.stop();
                report.status = RunStatus::Failed;
                report.error = Some(err.to_string());
                return (report, Some(err));
            }
        };

        let reconciler = Reconciler::new(
            &self.pool,
            ctx.catalog,
            self.settings.matcher,
            self.settings.bind_threshold,
            self.settings.deal_policy,
            self.sink.as_ref(),
        );

        let mut pages = std::pin::pin!(crawl(adapter, ctx.session));
        let mut fatal = None;
        let mut interrupted = false;
        while let Some(item) = pages.next().await {
            match item {
                Ok(page) => {
                    let has_next = page.has_next;
                    report.pages += 1;
                    report.skipped += page.skipped;
                    match reconciler.reconcile(&page.offers).await {
                        Ok(stats) => {
                            report.items_found += page.offers.len();
                            report.stats.merge(stats);
                            if has_next && self.stop.is_stopped() {
                                interrupted = true;
                                break;
                            }
                        }
                        Err(err) => {
                            fatal = Some(err);
                            break;
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(site = %name, error = %err, "site crawl stopped early");
                    report.error = Some(err.to_string());
                }
            }
        }

        let items = saturating_i32(report.items_found);
        if let Some(err) = fatal {
            self.stop.stop();
            let message = err.to_string();
            if let Err(log_err) = oraculo_db::finish_execution_log(
                &self.pool,
                log.id,
                RunStatus::Failed,
                items,
                Some(&message),
            )
            .await
            {
                tracing::error!(site = %name, error = %log_err, "failed to seal execution log");
            }
            report.status = RunStatus::Failed;
            report.error = Some(message);
            return (report, Some(err));
        }

        report.status = if interrupted {
            tracing::info!(
                site = %name,
                pages = report.pages,
                "stop requested; site crawl interrupted"
            );
            RunStatus::Cancelled
        } else {
            RunStatus::for_site(report.items_found, report.error.is_some())
        };
        tracing::info!(
            site = %name,
            status = %report.status,
            pages = report.pages,
            items = report.items_found,
            bound = report.stats.bound,
            quarantined = report.stats.quarantined,
            "site finished"
        );

        let sealed = oraculo_db::finish_execution_log(
            &self.pool,
            log.id,
            report.status,
            items,
            report.error.as_deref(),
        )
        .await;
        if let Err(err) = sealed {
            self.stop.stop();
            return (report, Some(err));
        }
        (report, None)
    }
}

fn saturating_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Attempt to mark a pass as failed, logging any secondary error.
async fn fail_pass_best_effort(pool: &PgPool, pass_id: i64, items_found: i32, message: &str) {
    if let Err(mark_err) = oraculo_db::fail_scan_pass(pool, pass_id, items_found, message).await {
        tracing::error!(
            pass_id,
            error = %mark_err,
            "failed to mark scan pass as failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_stopped());

        handle.stop();
        assert!(signal.is_stopped());

        signal.reset();
        assert!(!handle.is_stopped());
    }

    #[test]
    fn progress_reports_whole_percentages() {
        let mut progress = ScanProgress::starting(3);
        progress.site_finished();
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.percent, 33);

        progress.site_finished();
        progress.site_finished();
        progress.site_finished();
        assert_eq!(progress.completed, 3);
        assert_eq!(progress.percent, 100);
    }

    #[test]
    fn progress_for_an_empty_pass_is_complete() {
        let mut progress = ScanProgress::starting(0);
        progress.site_finished();
        assert_eq!(progress.percent, 100);
    }
}
