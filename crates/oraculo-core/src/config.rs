use rust_decimal::Decimal;

use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    // Scores and discounts share the same (0, 1] domain.
    let parse_fraction = |var: &str, default: &str| -> Result<f64, ConfigError> {
        let value = or_default(var, default)
            .parse::<f64>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value <= 0.0 || value > 1.0 {
            return Err(invalid(var, format!("{value} is outside (0, 1]")));
        }
        Ok(value)
    };

    let parse_discount = |var: &str, default: &str| -> Result<Decimal, ConfigError> {
        let value = or_default(var, default)
            .parse::<Decimal>()
            .map_err(|e| invalid(var, e.to_string()))?;
        if value <= Decimal::ZERO || value > Decimal::ONE {
            return Err(invalid(var, format!("{value} is outside (0, 1]")));
        }
        Ok(value)
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("ORACULO_ENV", "development"))?;
    let log_level = or_default("ORACULO_LOG_LEVEL", "info");
    let sites_path = PathBuf::from(or_default("ORACULO_SITES_PATH", "./config/sites.yaml"));

    let db_max_connections = parse_u32("ORACULO_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("ORACULO_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("ORACULO_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs =
        parse_u64("ORACULO_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default("ORACULO_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_max_concurrent_sites = parse_usize("ORACULO_SCRAPER_MAX_CONCURRENT_SITES", "4")?;
    let scraper_max_attempts = parse_u32("ORACULO_SCRAPER_MAX_ATTEMPTS", "3")?;
    if scraper_max_attempts == 0 {
        return Err(invalid(
            "ORACULO_SCRAPER_MAX_ATTEMPTS",
            "must be at least 1".to_string(),
        ));
    }
    let scraper_backoff_base_ms = parse_u64("ORACULO_SCRAPER_BACKOFF_BASE_MS", "2000")?;
    let scraper_human_delay_min_ms = parse_u64("ORACULO_SCRAPER_HUMAN_DELAY_MIN_MS", "2000")?;
    let scraper_human_delay_max_ms = parse_u64("ORACULO_SCRAPER_HUMAN_DELAY_MAX_MS", "5000")?;
    if scraper_human_delay_min_ms > scraper_human_delay_max_ms {
        return Err(invalid(
            "ORACULO_SCRAPER_HUMAN_DELAY_MIN_MS",
            format!("{scraper_human_delay_min_ms} exceeds max {scraper_human_delay_max_ms}"),
        ));
    }

    let match_threshold = parse_fraction("ORACULO_MATCH_THRESHOLD", "0.65")?;
    let bind_threshold = parse_fraction("ORACULO_BIND_THRESHOLD", "0.70")?;
    let deal_min_discount = parse_discount("ORACULO_DEAL_MIN_DISCOUNT", "0.20")?;
    let deal_anomaly_discount = parse_discount("ORACULO_DEAL_ANOMALY_DISCOUNT", "0.50")?;
    if deal_anomaly_discount < deal_min_discount {
        return Err(invalid(
            "ORACULO_DEAL_ANOMALY_DISCOUNT",
            format!("{deal_anomaly_discount} is below the deal floor {deal_min_discount}"),
        ));
    }

    let scan_cron = or_default("ORACULO_SCAN_CRON", "0 0 6 * * *");

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        sites_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_concurrent_sites,
        scraper_max_attempts,
        scraper_backoff_base_ms,
        scraper_human_delay_min_ms,
        scraper_human_delay_max_ms,
        match_threshold,
        bind_threshold,
        deal_min_discount,
        deal_anomaly_discount,
        scan_cron,
    })
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ORACULO_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
