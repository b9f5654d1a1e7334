//! The enrichment sweep: `collected → pending_enrichment → pending_review`.
//!
//! Scoring is best-effort. A timeout or scorer error releases the article
//! with no sentiment. Every status change goes through the store's
//! compare-and-set, so concurrent sweeps never process the same article
//! twice.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use veille_core::{
    begin_enrichment, complete_enrichment, AppConfig, Article, ArticleFilter, ArticleStatus,
    ArticleStore, Sentiment, StoreError, ThemeChange, ThemeSet, INFERENCE_ACTOR,
};

use crate::scorer::SentimentScorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentConfig {
    /// Upper bound on one scorer call.
    pub timeout: Duration,
    /// Articles claimed per sweep.
    pub batch_size: i64,
    /// Articles left in `pending_enrichment` longer than this are assumed
    /// orphaned by a crashed sweep and picked up again.
    pub stale_after: Duration,
}

impl EnrichmentConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let timeout = Duration::from_secs(config.sentiment_timeout_secs);
        Self {
            timeout,
            batch_size: 100,
            stale_after: timeout.saturating_mul(6).max(Duration::from_secs(60)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    /// Articles this sweep moved into `pending_enrichment`.
    pub claimed: u32,
    /// Orphaned `pending_enrichment` articles picked up again.
    pub recovered: u32,
    pub scored: u32,
    /// Released without a sentiment (timeout or scorer error).
    pub unscored: u32,
    pub themes_inferred: u32,
    /// Lost to a concurrent writer.
    pub skipped: u32,
    pub failed: u32,
}

/// Run one enrichment sweep over at most `config.batch_size` collected
/// articles, plus any orphaned ones.
///
/// # Errors
///
/// Returns [`StoreError`] only if the candidate listing fails. Per-article
/// storage failures are logged and counted in [`EnrichmentReport::failed`].
pub async fn enrich_pending(
    store: &dyn ArticleStore,
    scorer: &dyn SentimentScorer,
    themes: &ThemeSet,
    config: &EnrichmentConfig,
) -> Result<EnrichmentReport, StoreError> {
    let mut report = EnrichmentReport::default();

    let collected = store
        .list_articles(&ArticleFilter {
            status: Some(ArticleStatus::Collected),
            limit: Some(config.batch_size),
            ..ArticleFilter::default()
        })
        .await?;

    let stale_cutoff = chrono::Duration::from_std(config.stale_after)
        .ok()
        .and_then(|age| Utc::now().checked_sub_signed(age));
    let orphaned: Vec<Article> = store
        .list_articles(&ArticleFilter {
            status: Some(ArticleStatus::PendingEnrichment),
            limit: Some(config.batch_size),
            ..ArticleFilter::default()
        })
        .await?
        .into_iter()
        .filter(|a| stale_cutoff.is_some_and(|cutoff| a.updated_at < cutoff))
        .collect();

    for article in collected {
        match begin_enrichment(store, article.id).await {
            Ok(true) => {
                report.claimed += 1;
                process(store, scorer, themes, config, &article, &mut report).await;
            }
            Ok(false) => report.skipped += 1,
            Err(err) => {
                tracing::error!(article_id = article.id, error = %err, "failed to claim article for enrichment");
                report.failed += 1;
            }
        }
    }

    for article in orphaned {
        tracing::warn!(article_id = article.id, "recovering article stuck in pending_enrichment");
        report.recovered += 1;
        process(store, scorer, themes, config, &article, &mut report).await;
    }

    tracing::info!(
        claimed = report.claimed,
        recovered = report.recovered,
        scored = report.scored,
        unscored = report.unscored,
        themes_inferred = report.themes_inferred,
        "enrichment sweep finished"
    );
    Ok(report)
}

async fn process(
    store: &dyn ArticleStore,
    scorer: &dyn SentimentScorer,
    themes: &ThemeSet,
    config: &EnrichmentConfig,
    article: &Article,
    report: &mut EnrichmentReport,
) {
    let text = scoring_text(article);
    let sentiment = score_with_timeout(scorer, &text, config.timeout, article.id).await;

    match complete_enrichment(store, article.id, sentiment).await {
        Ok(true) => {
            if sentiment.is_some() {
                report.scored += 1;
            } else {
                report.unscored += 1;
            }
        }
        Ok(false) => {
            report.skipped += 1;
            return;
        }
        Err(err) => {
            tracing::error!(article_id = article.id, error = %err, "failed to release enriched article");
            report.failed += 1;
            return;
        }
    }

    if article.theme.is_none() {
        if let Some(theme) = themes.infer_theme(&text) {
            let change = ThemeChange {
                article_id: article.id,
                expected_theme: None,
                expected_status: ArticleStatus::PendingReview,
                new_theme: theme.name.clone(),
                actor: INFERENCE_ACTOR.to_string(),
            };
            match store.reassign_theme(&change).await {
                Ok(true) => {
                    report.themes_inferred += 1;
                    tracing::debug!(article_id = article.id, theme = %theme.name, "theme inferred");
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::error!(article_id = article.id, error = %err, "failed to record inferred theme");
                    report.failed += 1;
                }
            }
        }
    }
}

async fn score_with_timeout(
    scorer: &dyn SentimentScorer,
    text: &str,
    timeout: Duration,
    article_id: i64,
) -> Option<Sentiment> {
    match tokio::time::timeout(timeout, scorer.score(text)).await {
        Ok(Ok(sentiment)) => Some(sentiment),
        Ok(Err(err)) => {
            tracing::warn!(article_id, scorer = scorer.name(), error = %err, "sentiment scoring failed");
            None
        }
        Err(_) => {
            tracing::warn!(
                article_id,
                scorer = scorer.name(),
                timeout_secs = timeout.as_secs(),
                "sentiment scoring timed out"
            );
            None
        }
    }
}

fn scoring_text(article: &Article) -> String {
    if article.raw_content.is_empty() {
        article.title.clone()
    } else {
        format!("{}. {}", article.title, article.raw_content)
    }
}
