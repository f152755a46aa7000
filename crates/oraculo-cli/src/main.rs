mod review;
mod scan;

use clap::{Parser, Subcommand};
use oraculo_core::AppConfig;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "oraculo")]
#[command(about = "Collectible-figure offer tracker for Spanish retail sites")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run a scan pass over every enabled site.
    Scan {
        /// Stay running and scan on the configured cron schedule.
        #[arg(long)]
        schedule: bool,
    },
    /// Crawl one site and print its offers as JSON without touching the store.
    Scrape {
        /// Site name from the sites file.
        site: String,
    },
    /// Recent scan passes and their per-site logs.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Quarantine review and offer administration.
    Review {
        #[command(subcommand)]
        command: ReviewCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[derive(Debug, Subcommand)]
enum ReviewCommands {
    /// List quarantined listings.
    Pending {
        /// 1-based page of 50 entries.
        #[arg(long, default_value_t = 1)]
        page: i64,
    },
    /// Bind a quarantined listing to a catalog product.
    Bind { pending_id: i64, product_id: i64 },
    /// Blacklist a quarantined listing.
    Discard { pending_id: i64 },
    /// Blacklist and clear every quarantined listing.
    Purge {
        /// Only purge listings from this site.
        #[arg(long)]
        shop: Option<String>,
    },
    /// Send an offer back to quarantine.
    Unlink { offer_id: i64 },
    /// Delete an offer and blacklist its URL.
    Ban { offer_id: i64 },
    /// Fold one catalog product into another.
    Merge { source_id: i64, target_id: i64 },
    /// Available offers priced well below their historical high.
    Deals {
        /// Minimum discount as a fraction, e.g. 0.20. Defaults to the deal threshold.
        #[arg(long)]
        min_discount: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = oraculo_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let Some(command) = cli.command else {
        println!("oraculo ready; run `oraculo --help` for commands");
        return Ok(());
    };

    match command {
        Commands::Scrape { site } => scan::run_scrape(&config, &site).await,
        command => run_with_store(command, &config).await,
    }
}

async fn run_with_store(command: Commands, config: &AppConfig) -> anyhow::Result<()> {
    let pool = oraculo_db::connect_pool_from_config(config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                oraculo_db::ping(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = oraculo_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Scan { schedule: false } => scan::run_scan(pool, config).await?,
        Commands::Scan { schedule: true } => scan::run_scheduled(pool, config).await?,
        Commands::Runs { limit } => review::run_runs(&pool, limit).await?,
        Commands::Review { command } => match command {
            ReviewCommands::Pending { page } => review::run_pending(&pool, page).await?,
            ReviewCommands::Bind {
                pending_id,
                product_id,
            } => review::run_bind(&pool, config, pending_id, product_id).await?,
            ReviewCommands::Discard { pending_id } => {
                review::run_discard(&pool, pending_id).await?;
            }
            ReviewCommands::Purge { shop } => review::run_purge(&pool, shop.as_deref()).await?,
            ReviewCommands::Unlink { offer_id } => review::run_unlink(&pool, offer_id).await?,
            ReviewCommands::Ban { offer_id } => review::run_ban(&pool, offer_id).await?,
            ReviewCommands::Merge {
                source_id,
                target_id,
            } => review::run_merge(&pool, source_id, target_id).await?,
            ReviewCommands::Deals { min_discount } => {
                let min_discount = min_discount.unwrap_or(config.deal_min_discount);
                review::run_deals(&pool, min_discount).await?;
            }
        },
        Commands::Scrape { site } => scan::run_scrape(config, &site).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests;
