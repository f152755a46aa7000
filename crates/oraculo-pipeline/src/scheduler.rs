//! Recurring scan passes.

use std::sync::Arc;

use oraculo_core::Trigger;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::error::PipelineError;
use crate::orchestrator::Orchestrator;

/// Builds and starts a scheduler that runs a pass on every `cron` tick.
///
/// The returned [`JobScheduler`] must be kept alive; dropping it stops the
/// job. A tick that fires while a pass is still running is skipped.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if `cron` does not parse or the scheduler
/// fails to start.
pub async fn build_scheduler(
    orchestrator: Arc<Orchestrator>,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_scan_job(&scheduler, orchestrator, cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_scan_job(
    scheduler: &JobScheduler,
    orchestrator: Arc<Orchestrator>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let orchestrator = Arc::clone(&orchestrator);

        Box::pin(async move {
            tracing::info!("scheduler: starting scan pass");
            match orchestrator.run_pass(Trigger::Scheduled).await {
                Ok(report) => tracing::info!(
                    pass_id = report.pass_id,
                    status = %report.status,
                    items_found = report.items_found,
                    "scheduler: scan pass complete"
                ),
                Err(PipelineError::PassInProgress) => {
                    tracing::warn!("scheduler: previous scan pass still running; skipping tick");
                }
                Err(e) => tracing::error!(error = %e, "scheduler: scan pass failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: scan job registered");
    Ok(())
}
