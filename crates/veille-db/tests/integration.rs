//! Offline tests for veille-db pool configuration and row conversion.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use veille_core::{
    AppConfig, Article, ArticleStatus, Environment, SentimentLabel, StoreError, SyncState,
};
use veille_db::{ArticleRow, PoolConfig, ScrapeRunRow};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        themes_path: PathBuf::from("./config/themes.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 30,
        scraper_user_agent: "ua".to_string(),
        scraper_min_call_interval_ms: 0,
        scraper_max_calls_per_run: 10,
        scraper_max_retries: 3,
        scraper_retry_backoff_base_secs: 5,
        scraper_retry_backoff_max_secs: 60,
        scraper_max_concurrent_themes: 1,
        global_max_items_per_keyword: 10,
        fingerprint_prefix_chars: 200,
        news_language: "fr".to_string(),
        news_country: "NE".to_string(),
        sentiment_url: None,
        sentiment_timeout_secs: 10,
        sheet_webhook_url: None,
        sheet_name: "Veille_Niger_Data".to_string(),
        sync_max_batch: 200,
        sync_failure_threshold: 3,
        sync_backoff_base_secs: 60,
        sync_backoff_max_secs: 3600,
        export_path: PathBuf::from("./data/sync_fallback.jsonl"),
        scrape_cron: "0 0 * * * *".to_string(),
        global_scrape_cron: None,
        sync_cron: "0 */15 * * * *".to_string(),
        enrich_cron: "0 */5 * * * *".to_string(),
    }
}

fn article_row() -> ArticleRow {
    let now = Utc::now();
    ArticleRow {
        id: 7,
        public_id: Uuid::new_v4(),
        fingerprint: "abc".to_string(),
        source_platform: "google_news".to_string(),
        url: "https://example.com/a".to_string(),
        title: "Titre".to_string(),
        raw_content: String::new(),
        published_at: None,
        collected_at: now,
        last_seen_at: now,
        seen_count: 1,
        theme: Some("Santé".to_string()),
        sentiment_label: Some("Neutre".to_string()),
        sentiment_confidence: Some(Decimal::new(5_500, 4)),
        status: "pending_review".to_string(),
        assigned_member: None,
        sync_state: "never_synced".to_string(),
        last_sync_attempt_at: None,
        updated_at: now,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn article_row_converts_to_domain_article() {
    let article = Article::try_from(article_row()).expect("row should convert");
    assert_eq!(article.status, ArticleStatus::PendingReview);
    assert_eq!(article.sync_state, SyncState::NeverSynced);
    let sentiment = article.sentiment.expect("sentiment present");
    assert_eq!(sentiment.label, SentimentLabel::Neutral);
    assert!((sentiment.confidence - 0.55).abs() < 1e-6);
}

#[test]
fn unknown_status_is_an_integrity_error() {
    let mut row = article_row();
    row.status = "archived".to_string();
    let err = Article::try_from(row).unwrap_err();
    assert!(matches!(err, StoreError::Integrity(ref msg) if msg.contains("archived")));
}

#[test]
fn half_sentiment_is_treated_as_unscored() {
    let mut row = article_row();
    row.sentiment_confidence = None;
    let article = Article::try_from(row).unwrap();
    assert!(article.sentiment.is_none());
}

/// Compile-time smoke test: confirm that [`ScrapeRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn scrape_run_row_has_expected_fields() {
    let row = ScrapeRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        scope: "all_themes".to_string(),
        theme: None,
        trigger_source: "scheduler".to_string(),
        status: "running".to_string(),
        adapter_calls: 0_i32,
        admitted_count: 0_i32,
        refreshed_count: 0_i32,
        error_message: None,
        started_at: Utc::now(),
        completed_at: None,
    };

    assert_eq!(row.scope, "all_themes");
    assert!(row.theme.is_none());
    assert!(row.completed_at.is_none());
}
