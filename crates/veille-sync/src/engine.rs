//! The sync engine: push certified articles to the spreadsheet, one request
//! per batch, and acknowledge them only once the push succeeded.
//!
//! Backoff lives at tick level. A failed tick pushes `next_attempt_at` out
//! exponentially and later ticks skip until then; nothing busy-retries
//! inside a call. Once consecutive failures exceed the threshold, each
//! further failed tick also appends the batch to the local export. Exported
//! rows stay `pending` and are pushed again when the spreadsheet recovers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use veille_core::{AppConfig, ArticleStore, StoreError, SyncHealth};

use crate::error::SinkError;
use crate::export::LocalExport;
use crate::sink::{HttpSheetSink, SheetRow, SheetSink};

const SINK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub max_batch: usize,
    /// Consecutive failed ticks tolerated before exporting locally.
    pub failure_threshold: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl SyncConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_batch: config.sync_max_batch,
            failure_threshold: config.sync_failure_threshold,
            backoff_base: Duration::from_secs(config.sync_backoff_base_secs),
            backoff_max: Duration::from_secs(config.sync_backoff_max_secs),
        }
    }

    /// Delay after the `failures`-th consecutive failure:
    /// `base * 2^(failures-1)`, capped at `backoff_max`.
    #[must_use]
    pub fn backoff_for(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.saturating_sub(1).min(20);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Still backing off from an earlier failure.
    Skipped { next_attempt_at: DateTime<Utc> },
    /// Nothing certified is waiting.
    Idle,
    Acknowledged { count: u64 },
    Failed {
        error: String,
        consecutive_failures: u32,
        next_attempt_at: DateTime<Utc>,
        /// Rows appended to the local export by this tick.
        exported: usize,
    },
}

pub struct SyncEngine {
    store: Arc<dyn ArticleStore>,
    sink: Option<Arc<dyn SheetSink>>,
    export: LocalExport,
    config: SyncConfig,
}

impl SyncEngine {
    /// `sink = None` runs export-only: every tick fails with
    /// [`SinkError::NotConfigured`] and the threshold logic exports.
    #[must_use]
    pub fn new(
        store: Arc<dyn ArticleStore>,
        sink: Option<Arc<dyn SheetSink>>,
        export: LocalExport,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            sink,
            export,
            config,
        }
    }

    /// Wire the engine from configuration: an HTTP sink when
    /// `VEILLE_SHEET_WEBHOOK_URL` is set, export-only otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Http`] if the webhook client cannot be built.
    pub fn from_app_config(
        store: Arc<dyn ArticleStore>,
        config: &AppConfig,
    ) -> Result<Self, SinkError> {
        let sink: Option<Arc<dyn SheetSink>> = match config.sheet_webhook_url.as_deref() {
            Some(url) => Some(Arc::new(HttpSheetSink::new(
                url,
                &config.sheet_name,
                SINK_TIMEOUT,
            )?)),
            None => {
                tracing::warn!("no spreadsheet endpoint configured, sync runs export-only");
                None
            }
        };
        Ok(Self::new(
            store,
            sink,
            LocalExport::new(config.export_path.clone()),
            SyncConfig::from_app_config(config),
        ))
    }

    #[must_use]
    pub fn is_export_only(&self) -> bool {
        self.sink.is_none()
    }

    /// Run one scheduled tick at time `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if sync health or the batch cannot be read or
    /// written. Sink and export failures are contained and reported through
    /// [`SyncOutcome::Failed`].
    pub async fn sync_batch(&self, now: DateTime<Utc>) -> Result<SyncOutcome, StoreError> {
        let health = self.store.load_sync_health().await?;
        if let Some(next) = health.next_attempt_at.filter(|next| *next > now) {
            tracing::debug!(next_attempt_at = %next, "sync backing off, tick skipped");
            return Ok(SyncOutcome::Skipped {
                next_attempt_at: next,
            });
        }

        let batch = self.store.select_sync_batch(self.config.max_batch).await?;
        if batch.is_empty() {
            return Ok(SyncOutcome::Idle);
        }
        let ids: Vec<i64> = batch.iter().map(|a| a.id).collect();
        self.store.mark_sync_attempt(&ids, now).await?;
        let rows: Vec<SheetRow> = batch.iter().map(SheetRow::from).collect();

        let pushed = match &self.sink {
            Some(sink) => sink.push(&rows).await,
            None => Err(SinkError::NotConfigured),
        };

        match pushed {
            Ok(()) => {
                let count = self.store.acknowledge_batch(&ids, now).await?;
                self.store
                    .save_sync_health(&SyncHealth {
                        consecutive_failures: 0,
                        next_attempt_at: None,
                        last_error: None,
                        last_success_at: Some(now),
                    })
                    .await?;
                tracing::info!(batch_size = ids.len(), acknowledged = count, "sync batch acknowledged");
                Ok(SyncOutcome::Acknowledged { count })
            }
            Err(err) => self.record_failure(health, &rows, &err, now).await,
        }
    }

    async fn record_failure(
        &self,
        health: SyncHealth,
        rows: &[SheetRow],
        err: &SinkError,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, StoreError> {
        let consecutive_failures = health.consecutive_failures.saturating_add(1);
        let delay = self.config.backoff_for(consecutive_failures);
        let next_attempt_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(now);
        let error = err.to_string();

        tracing::warn!(
            batch_size = rows.len(),
            consecutive_failures,
            delay_secs = delay.as_secs(),
            error = %error,
            "sync batch failed, will retry"
        );

        let mut exported = 0;
        if consecutive_failures > self.config.failure_threshold {
            match self.export.append(rows, &error, now).await {
                Ok(n) => {
                    exported = n;
                    tracing::warn!(
                        batch_size = n,
                        consecutive_failures,
                        path = %self.export.path().display(),
                        "spreadsheet unreachable, batch written to local export"
                    );
                }
                Err(export_err) => {
                    tracing::error!(error = %export_err, "local export failed");
                }
            }
        }

        self.store
            .save_sync_health(&SyncHealth {
                consecutive_failures,
                next_attempt_at: Some(next_attempt_at),
                last_error: Some(error.clone()),
                last_success_at: health.last_success_at,
            })
            .await?;

        Ok(SyncOutcome::Failed {
            error,
            consecutive_failures,
            next_attempt_at,
            exported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = SyncConfig {
            max_batch: 10,
            failure_threshold: 3,
            backoff_base: Duration::from_secs(60),
            backoff_max: Duration::from_secs(3600),
        };
        assert_eq!(cfg.backoff_for(1), Duration::from_secs(60));
        assert_eq!(cfg.backoff_for(2), Duration::from_secs(120));
        assert_eq!(cfg.backoff_for(6), Duration::from_secs(1920));
        assert_eq!(cfg.backoff_for(7), Duration::from_secs(3600));
        assert_eq!(cfg.backoff_for(40), Duration::from_secs(3600));
    }
}
