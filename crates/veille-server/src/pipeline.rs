//! Long-lived pipeline services shared by the scheduler and the HTTP API.
//!
//! Scrapes and sync ticks are each gated by a mutex so a slow run never
//! overlaps the next scheduled one. The cancellation token is cancelled on
//! shutdown; in-flight scrapes stop before their next keyword.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use veille_core::{AppConfig, ArticleStore, RunScope, StoreError, ThemeRegistry};
use veille_db::PgStore;
use veille_scraper::{GoogleNewsCollector, Orchestrator, OrchestratorConfig, RunReport};
use veille_sentiment::{enrich_pending, EnrichmentConfig, EnrichmentReport, SentimentScorer};
use veille_sync::{SyncEngine, SyncOutcome};

/// A theme is due when it never completed a run, or its last completed run
/// is at least one cadence old.
pub fn is_due(last_success: Option<DateTime<Utc>>, cadence: Duration, now: DateTime<Utc>) -> bool {
    let Some(last) = last_success else {
        return true;
    };
    match chrono::Duration::from_std(cadence) {
        Ok(cadence) => now.signed_duration_since(last) >= cadence,
        Err(_) => false,
    }
}

pub struct Pipeline {
    pool: PgPool,
    store: Arc<dyn ArticleStore>,
    themes: ThemeRegistry,
    orchestrator: Orchestrator,
    scorer: Arc<dyn SentimentScorer>,
    enrichment: EnrichmentConfig,
    sync: SyncEngine,
    scrape_gate: Mutex<()>,
    sync_gate: Mutex<()>,
    cancel: CancellationToken,
}

pub struct PipelineParts {
    pub pool: PgPool,
    pub store: Arc<dyn ArticleStore>,
    pub themes: ThemeRegistry,
    pub orchestrator: Orchestrator,
    pub scorer: Arc<dyn SentimentScorer>,
    pub enrichment: EnrichmentConfig,
    pub sync: SyncEngine,
    pub cancel: CancellationToken,
}

impl Pipeline {
    #[must_use]
    pub fn new(parts: PipelineParts) -> Self {
        Self {
            pool: parts.pool,
            store: parts.store,
            themes: parts.themes,
            orchestrator: parts.orchestrator,
            scorer: parts.scorer,
            enrichment: parts.enrichment,
            sync: parts.sync,
            scrape_gate: Mutex::new(()),
            sync_gate: Mutex::new(()),
            cancel: parts.cancel,
        }
    }

    /// Wire every service from configuration against Postgres.
    ///
    /// # Errors
    ///
    /// Returns an error if the theme registry fails to load or an HTTP client
    /// cannot be built.
    pub fn from_config(
        pool: PgPool,
        config: &AppConfig,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let themes = ThemeRegistry::load(config.themes_path.clone())?;
        let store: Arc<dyn ArticleStore> = Arc::new(PgStore::new(pool.clone()));
        let collector = GoogleNewsCollector::from_app_config(config)
            .map_err(|e| anyhow::anyhow!("failed to build Google News client: {e}"))?;
        let orchestrator = Orchestrator::new(
            Arc::new(collector),
            Arc::clone(&store),
            OrchestratorConfig::from_app_config(config),
        );
        let scorer = veille_sentiment::scorer_from_config(config)?;
        let sync = SyncEngine::from_app_config(Arc::clone(&store), config)?;

        Ok(Self::new(PipelineParts {
            pool,
            store,
            themes,
            orchestrator,
            scorer,
            enrichment: EnrichmentConfig::from_app_config(config),
            sync,
            cancel,
        }))
    }

    pub fn store(&self) -> &dyn ArticleStore {
        self.store.as_ref()
    }

    pub fn themes(&self) -> &ThemeRegistry {
        &self.themes
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run one scrape over `scope` and record it. Waits for any scrape
    /// already in flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be opened or recorded, or the scope
    /// names an unknown theme.
    pub async fn scrape(&self, scope: RunScope, trigger: &str) -> anyhow::Result<RunReport> {
        let _gate = self.scrape_gate.lock().await;
        self.scrape_locked(scope, trigger).await
    }

    /// Like [`Pipeline::scrape`] but returns `None` instead of waiting when
    /// another scrape is in flight.
    ///
    /// # Errors
    ///
    /// As [`Pipeline::scrape`].
    pub async fn scrape_if_idle(
        &self,
        scope: RunScope,
        trigger: &str,
    ) -> anyhow::Result<Option<RunReport>> {
        let Ok(_gate) = self.scrape_gate.try_lock() else {
            tracing::info!(%scope, "scrape already in progress, tick skipped");
            return Ok(None);
        };
        self.scrape_locked(scope, trigger).await.map(Some)
    }

    async fn scrape_locked(&self, scope: RunScope, trigger: &str) -> anyhow::Result<RunReport> {
        // One snapshot for the whole run; a reload mid-run is not observed.
        let themes = self.themes.snapshot();
        let run = veille_db::create_scrape_run(&self.pool, &scope, trigger).await?;

        let report = match self.orchestrator.run(&themes, &scope, &self.cancel).await {
            Ok(report) => report,
            Err(err) => {
                self.fail_run_best_effort(run.id, format!("{err:#}")).await;
                return Err(err.into());
            }
        };

        if let Err(err) = veille_db::record_run_report(&self.pool, run.id, &report).await {
            self.fail_run_best_effort(run.id, format!("{err:#}")).await;
            return Err(err.into());
        }
        Ok(report)
    }

    async fn fail_run_best_effort(&self, run_id: i64, message: String) {
        if let Err(mark_err) = veille_db::fail_scrape_run(&self.pool, run_id, &message).await {
            tracing::error!(run_id, error = %mark_err, "failed to mark scrape run as failed");
        }
    }

    /// Scrape every theme whose cadence has elapsed, most urgent priority
    /// first. Each theme is its own run so cadence bookkeeping stays per
    /// theme. Skipped entirely if another scrape holds the gate.
    ///
    /// Returns the names of the themes that were scraped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the cadence lookup fails. Individual theme
    /// runs that fail are logged and the pass continues.
    pub async fn scrape_due_themes(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<String>> {
        let Ok(_gate) = self.scrape_gate.try_lock() else {
            tracing::info!("scrape already in progress, due-theme pass skipped");
            return Ok(Vec::new());
        };

        let themes = self.themes.snapshot();
        let mut scraped = Vec::new();
        for theme in themes.by_priority() {
            if self.cancel.is_cancelled() {
                break;
            }
            let last = veille_db::last_successful_run_at(&self.pool, &theme.name).await?;
            if !is_due(last, theme.refresh_cadence, now) {
                tracing::debug!(theme = %theme.name, "theme not due");
                continue;
            }
            match self
                .scrape_locked(RunScope::Theme(theme.name.clone()), "scheduler")
                .await
            {
                Ok(report) => {
                    tracing::info!(
                        theme = %theme.name,
                        admitted = report.admitted(),
                        refreshed = report.refreshed(),
                        partial = report.is_partial(),
                        "scheduled theme scrape finished"
                    );
                    scraped.push(theme.name.clone());
                }
                Err(err) => {
                    tracing::error!(theme = %theme.name, error = %err, "scheduled theme scrape failed");
                }
            }
        }
        Ok(scraped)
    }

    /// One enrichment sweep against the current theme snapshot.
    ///
    /// # Errors
    ///
    /// Propagates a failure to list candidate articles.
    pub async fn enrich(&self) -> Result<EnrichmentReport, StoreError> {
        let themes = self.themes.snapshot();
        enrich_pending(
            self.store.as_ref(),
            self.scorer.as_ref(),
            &themes,
            &self.enrichment,
        )
        .await
    }

    /// One sync tick. Concurrent callers queue behind the tick in flight.
    ///
    /// # Errors
    ///
    /// Propagates storage failures; sink failures come back as
    /// [`SyncOutcome::Failed`].
    pub async fn sync_tick(&self, now: DateTime<Utc>) -> Result<SyncOutcome, StoreError> {
        let _gate = self.sync_gate.lock().await;
        self.sync.sync_batch(now).await
    }

    /// Wait up to `grace` for the scrape and sync in flight to release their
    /// gates after cancellation.
    pub async fn drain(&self, grace: Duration) {
        let wait = async {
            let _scrape = self.scrape_gate.lock().await;
            let _sync = self.sync_gate.lock().await;
        };
        if tokio::time::timeout(grace, wait).await.is_err() {
            tracing::warn!(grace_secs = grace.as_secs(), "pipeline still busy at shutdown");
        }
    }
}
