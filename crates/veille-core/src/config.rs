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
#[allow(clippy::too_many_lines)]
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Empty values count as unset for optional endpoints.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
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

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("VEILLE_ENV", "development"));
    let bind_addr = parse_addr("VEILLE_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("VEILLE_LOG_LEVEL", "info");
    let themes_path = PathBuf::from(or_default("VEILLE_THEMES_PATH", "./config/themes.yaml"));

    let db_max_connections = parse_u32("VEILLE_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("VEILLE_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("VEILLE_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("VEILLE_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default("VEILLE_SCRAPER_USER_AGENT", "veille/0.1 (media-watch)");
    let scraper_min_call_interval_ms =
        parse_u64("VEILLE_SCRAPER_MIN_CALL_INTERVAL_MS", "20000")?;
    let scraper_max_calls_per_run = parse_usize("VEILLE_SCRAPER_MAX_CALLS_PER_RUN", "400")?;
    let scraper_max_retries = parse_u32("VEILLE_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("VEILLE_SCRAPER_RETRY_BACKOFF_BASE_SECS", "5")?;
    let scraper_retry_backoff_max_secs = parse_u64("VEILLE_SCRAPER_RETRY_BACKOFF_MAX_SECS", "60")?;
    let scraper_max_concurrent_themes = parse_usize("VEILLE_SCRAPER_MAX_CONCURRENT_THEMES", "2")?;
    let global_max_items_per_keyword = parse_u32("VEILLE_GLOBAL_MAX_ITEMS_PER_KEYWORD", "10")?;
    let fingerprint_prefix_chars = parse_usize("VEILLE_FINGERPRINT_PREFIX_CHARS", "200")?;
    if fingerprint_prefix_chars == 0 {
        return Err(invalid(
            "VEILLE_FINGERPRINT_PREFIX_CHARS",
            "must be greater than zero".to_string(),
        ));
    }
    let news_language = or_default("VEILLE_NEWS_LANGUAGE", "fr");
    let news_country = or_default("VEILLE_NEWS_COUNTRY", "NE");

    let sentiment_url = optional("VEILLE_SENTIMENT_URL");
    let sentiment_timeout_secs = parse_u64("VEILLE_SENTIMENT_TIMEOUT_SECS", "10")?;

    let sheet_webhook_url = optional("VEILLE_SHEET_WEBHOOK_URL");
    let sheet_name = or_default("VEILLE_SHEET_NAME", "Veille_Niger_Data");
    let sync_max_batch = parse_usize("VEILLE_SYNC_MAX_BATCH", "200")?;
    if sync_max_batch == 0 {
        return Err(invalid(
            "VEILLE_SYNC_MAX_BATCH",
            "must be greater than zero".to_string(),
        ));
    }
    let sync_failure_threshold = parse_u32("VEILLE_SYNC_FAILURE_THRESHOLD", "3")?;
    let sync_backoff_base_secs = parse_u64("VEILLE_SYNC_BACKOFF_BASE_SECS", "60")?;
    let sync_backoff_max_secs = parse_u64("VEILLE_SYNC_BACKOFF_MAX_SECS", "3600")?;
    let export_path = PathBuf::from(or_default(
        "VEILLE_EXPORT_PATH",
        "./data/sync_fallback.jsonl",
    ));

    let scrape_cron = or_default("VEILLE_SCRAPE_CRON", "0 0 * * * *");
    let global_scrape_cron = optional("VEILLE_GLOBAL_SCRAPE_CRON");
    let sync_cron = or_default("VEILLE_SYNC_CRON", "0 */15 * * * *");
    let enrich_cron = or_default("VEILLE_ENRICH_CRON", "0 */5 * * * *");

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        themes_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_min_call_interval_ms,
        scraper_max_calls_per_run,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        scraper_retry_backoff_max_secs,
        scraper_max_concurrent_themes,
        global_max_items_per_keyword,
        fingerprint_prefix_chars,
        news_language,
        news_country,
        sentiment_url,
        sentiment_timeout_secs,
        sheet_webhook_url,
        sheet_name,
        sync_max_batch,
        sync_failure_threshold,
        sync_backoff_base_secs,
        sync_backoff_max_secs,
        export_path,
        scrape_cron,
        global_scrape_cron,
        sync_cron,
        enrich_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
