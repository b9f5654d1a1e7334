use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub themes_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_min_call_interval_ms: u64,
    pub scraper_max_calls_per_run: usize,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    pub scraper_retry_backoff_max_secs: u64,
    pub scraper_max_concurrent_themes: usize,
    pub global_max_items_per_keyword: u32,
    pub fingerprint_prefix_chars: usize,
    pub news_language: String,
    pub news_country: String,
    pub sentiment_url: Option<String>,
    pub sentiment_timeout_secs: u64,
    pub sheet_webhook_url: Option<String>,
    pub sheet_name: String,
    pub sync_max_batch: usize,
    pub sync_failure_threshold: u32,
    pub sync_backoff_base_secs: u64,
    pub sync_backoff_max_secs: u64,
    pub export_path: PathBuf,
    pub scrape_cron: String,
    pub global_scrape_cron: Option<String>,
    pub sync_cron: String,
    pub enrich_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("themes_path", &self.themes_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field(
                "scraper_min_call_interval_ms",
                &self.scraper_min_call_interval_ms,
            )
            .field("scraper_max_calls_per_run", &self.scraper_max_calls_per_run)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field(
                "scraper_retry_backoff_max_secs",
                &self.scraper_retry_backoff_max_secs,
            )
            .field(
                "scraper_max_concurrent_themes",
                &self.scraper_max_concurrent_themes,
            )
            .field(
                "global_max_items_per_keyword",
                &self.global_max_items_per_keyword,
            )
            .field("fingerprint_prefix_chars", &self.fingerprint_prefix_chars)
            .field("news_language", &self.news_language)
            .field("news_country", &self.news_country)
            .field(
                "sentiment_url",
                &self.sentiment_url.as_ref().map(|_| "[redacted]"),
            )
            .field("sentiment_timeout_secs", &self.sentiment_timeout_secs)
            .field(
                "sheet_webhook_url",
                &self.sheet_webhook_url.as_ref().map(|_| "[redacted]"),
            )
            .field("sheet_name", &self.sheet_name)
            .field("sync_max_batch", &self.sync_max_batch)
            .field("sync_failure_threshold", &self.sync_failure_threshold)
            .field("sync_backoff_base_secs", &self.sync_backoff_base_secs)
            .field("sync_backoff_max_secs", &self.sync_backoff_max_secs)
            .field("export_path", &self.export_path)
            .field("scrape_cron", &self.scrape_cron)
            .field("global_scrape_cron", &self.global_scrape_cron)
            .field("sync_cron", &self.sync_cron)
            .field("enrich_cron", &self.enrich_cron)
            .finish()
    }
}
