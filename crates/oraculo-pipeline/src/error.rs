use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Db(#[from] oraculo_db::DbError),

    #[error("scraper error: {0}")]
    Scraper(#[from] oraculo_scraper::ScraperError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("a scan pass is already running")]
    PassInProgress,
}
