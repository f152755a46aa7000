//! Scan and scrape command handlers.

use std::sync::Arc;

use oraculo_core::{AppConfig, Trigger};
use oraculo_pipeline::{LogAlertSink, Orchestrator, PassReport, PassSettings};
use oraculo_scraper::{build_adapter, build_adapters, run_adapter, ScrapeSession, SessionPolicy};

fn build_orchestrator(pool: sqlx::PgPool, config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let sites = oraculo_core::load_sites(&config.sites_path)?;
    let adapters = build_adapters(&sites);
    if adapters.is_empty() {
        anyhow::bail!(
            "no enabled sites in {}; nothing to scan",
            config.sites_path.display()
        );
    }

    Ok(Orchestrator::new(
        pool,
        adapters,
        PassSettings::from_app_config(config),
        Arc::new(LogAlertSink),
    ))
}

/// Run one manual pass. Ctrl-C stops sites that have not started yet.
///
/// # Errors
///
/// Returns an error if the sites file cannot be loaded or the pass fails on
/// a store error.
pub(crate) async fn run_scan(pool: sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let orchestrator = build_orchestrator(pool, config)?;

    let stop = orchestrator.stop_signal();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; finishing sites already running");
            stop.stop();
        }
    });

    let result = orchestrator.run_pass(Trigger::Manual).await;
    interrupt.abort();

    let report = result?;
    print_report(&report);
    Ok(())
}

/// Keep scanning on `ORACULO_SCAN_CRON` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the sites file cannot be loaded or the scheduler
/// cannot be started.
pub(crate) async fn run_scheduled(pool: sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let orchestrator = Arc::new(build_orchestrator(pool, config)?);
    let stop = orchestrator.stop_signal();

    let mut scheduler =
        oraculo_pipeline::build_scheduler(Arc::clone(&orchestrator), &config.scan_cron).await?;
    println!(
        "scheduled scans of {} sites on '{}'; press Ctrl-C to exit",
        orchestrator.site_count(),
        config.scan_cron
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down scheduler");
    stop.stop();
    scheduler.shutdown().await?;
    Ok(())
}

/// Crawl a single site and print the normalized offers as JSON.
///
/// # Errors
///
/// Returns an error if the site is unknown or the crawl yields nothing but
/// a failure.
pub(crate) async fn run_scrape(config: &AppConfig, site_name: &str) -> anyhow::Result<()> {
    let sites = oraculo_core::load_sites(&config.sites_path)?;
    let site = sites
        .sites
        .iter()
        .find(|s| s.name == site_name)
        .ok_or_else(|| anyhow::anyhow!("site '{site_name}' not found in sites file"))?;
    if !site.enabled {
        tracing::warn!(site = %site.name, "site is disabled for scan passes; scraping anyway");
    }

    let adapter = build_adapter(site.clone());
    let session = ScrapeSession::open(SessionPolicy::from_app_config(config))?;
    let run = run_adapter(adapter.as_ref(), &session).await;

    println!("{}", serde_json::to_string_pretty(&run.offers)?);
    eprintln!(
        "{}: {} offers from {} pages ({} skipped), status {}",
        site.name,
        run.offers.len(),
        run.pages,
        run.skipped,
        run.status()
    );

    match run.failure {
        Some(err) if run.offers.is_empty() => Err(err.into()),
        Some(err) => {
            eprintln!("warning: crawl stopped early: {err}");
            Ok(())
        }
        None => Ok(()),
    }
}

fn print_report(report: &PassReport) {
    println!(
        "pass {} ({}) {}: {} items, {} alerts",
        report.pass_id, report.public_id, report.status, report.items_found, report.alerts
    );
    println!(
        "{:<14} {:<10} {:>6} {:>6} {:>8} {:>6} {:>8}",
        "SITE", "STATUS", "PAGES", "ITEMS", "UPDATED", "BOUND", "PENDING"
    );
    for site in &report.sites {
        println!(
            "{:<14} {:<10} {:>6} {:>6} {:>8} {:>6} {:>8}",
            site.site,
            site.status.as_str(),
            site.pages,
            site.items_found,
            site.stats.updated,
            site.stats.bound,
            site.stats.quarantined
        );
        if let Some(error) = &site.error {
            println!("  error: {error}");
        }
    }
}
