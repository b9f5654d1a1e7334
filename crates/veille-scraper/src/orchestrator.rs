//! The scrape orchestrator.
//!
//! Maps a [`RunScope`] to keyword passes over one [`PlatformCollector`],
//! forwarding each normalized hit to the [`DedupEngine`]. Keyword failures
//! are contained: a keyword that cannot be fetched is recorded and the run
//! moves on. Cancellation stops the run between keywords; articles already
//! admitted stay in place.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use veille_core::{AdmitOutcome, AppConfig, ArticleStore, DedupEngine, RunScope, Theme, ThemeSet};

use crate::collector::{normalize_candidate, PlatformCollector};
use crate::error::{FetchError, OrchestratorError};
use crate::rate_limit::{retry_with_backoff, CallBudget, RetryPolicy, Throttle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub min_call_interval: Duration,
    pub max_calls_per_run: usize,
    pub retry: RetryPolicy,
    /// Worker pool size for [`RunScope::AllThemes`].
    pub max_concurrent_themes: usize,
    pub global_max_items_per_keyword: u32,
    pub fingerprint_prefix_chars: usize,
}

impl OrchestratorConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            min_call_interval: Duration::from_millis(config.scraper_min_call_interval_ms),
            max_calls_per_run: config.scraper_max_calls_per_run,
            retry: RetryPolicy {
                max_retries: config.scraper_max_retries,
                backoff_base: Duration::from_secs(config.scraper_retry_backoff_base_secs),
                backoff_max: Duration::from_secs(config.scraper_retry_backoff_max_secs),
            },
            max_concurrent_themes: config.scraper_max_concurrent_themes,
            global_max_items_per_keyword: config.global_max_items_per_keyword,
            fingerprint_prefix_chars: config.fingerprint_prefix_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum KeywordOutcome {
    Completed {
        admitted: u32,
        refreshed: u32,
        ignored: u32,
    },
    /// The stream or the store failed after some items were processed.
    Partial {
        admitted: u32,
        refreshed: u32,
        ignored: u32,
        error: String,
    },
    /// The adapter call failed for good; nothing was processed.
    Skipped { error: String },
    /// Cancelled or out of call budget before the keyword started.
    NotAttempted { reason: String },
}

impl KeywordOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Partial { .. } => "partial",
            Self::Skipped { .. } => "skipped",
            Self::NotAttempted { .. } => "not_attempted",
        }
    }

    /// `(admitted, refreshed, ignored)`.
    #[must_use]
    pub fn counts(&self) -> (u32, u32, u32) {
        match self {
            Self::Completed {
                admitted,
                refreshed,
                ignored,
            }
            | Self::Partial {
                admitted,
                refreshed,
                ignored,
                ..
            } => (*admitted, *refreshed, *ignored),
            Self::Skipped { .. } | Self::NotAttempted { .. } => (0, 0, 0),
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed { .. } => None,
            Self::Partial { error, .. } | Self::Skipped { error } => Some(error),
            Self::NotAttempted { reason } => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordReport {
    pub theme: Option<String>,
    pub keyword: String,
    #[serde(flatten)]
    pub outcome: KeywordOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub scope: RunScope,
    pub keywords: Vec<KeywordReport>,
    pub adapter_calls: usize,
    pub cancelled: bool,
}

impl RunReport {
    fn total(&self, pick: impl Fn((u32, u32, u32)) -> u32) -> u32 {
        self.keywords.iter().map(|k| pick(k.outcome.counts())).sum()
    }

    #[must_use]
    pub fn admitted(&self) -> u32 {
        self.total(|(a, _, _)| a)
    }

    #[must_use]
    pub fn refreshed(&self) -> u32 {
        self.total(|(_, r, _)| r)
    }

    #[must_use]
    pub fn ignored(&self) -> u32 {
        self.total(|(_, _, i)| i)
    }

    /// True when any keyword did not complete cleanly.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.keywords
            .iter()
            .any(|k| !matches!(k.outcome, KeywordOutcome::Completed { .. }))
    }
}

struct RunContext<'a> {
    budget: CallBudget,
    cancel: &'a CancellationToken,
}

/// Spacing between adapter calls is enforced across every run driven by the
/// same orchestrator, so share one instance per platform.
pub struct Orchestrator {
    collector: Arc<dyn PlatformCollector>,
    store: Arc<dyn ArticleStore>,
    config: OrchestratorConfig,
    throttle: Throttle,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        collector: Arc<dyn PlatformCollector>,
        store: Arc<dyn ArticleStore>,
        config: OrchestratorConfig,
    ) -> Self {
        let throttle = Throttle::new(config.min_call_interval);
        Self {
            collector,
            store,
            config,
            throttle,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run one scrape over `scope` against an immutable theme snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownTheme`] if a `Theme` scope names a
    /// theme absent from `themes`. Fetch and storage failures never abort the
    /// run; they are reported per keyword.
    pub async fn run(
        &self,
        themes: &ThemeSet,
        scope: &RunScope,
        cancel: &CancellationToken,
    ) -> Result<RunReport, OrchestratorError> {
        let ctx = RunContext {
            budget: CallBudget::new(self.config.max_calls_per_run),
            cancel,
        };
        tracing::info!(scope = %scope, "scrape run started");

        let keywords = match scope {
            RunScope::Global => {
                let cap = usize::try_from(self.config.global_max_items_per_keyword)
                    .unwrap_or(usize::MAX);
                let mut reports = Vec::with_capacity(themes.global_keywords.len());
                for keyword in &themes.global_keywords {
                    reports.push(self.run_keyword(&ctx, None, keyword, cap).await);
                }
                reports
            }
            RunScope::Theme(name) => {
                let theme = themes
                    .find(name)
                    .ok_or_else(|| OrchestratorError::UnknownTheme(name.clone()))?;
                self.run_theme(&ctx, theme).await
            }
            RunScope::AllThemes => {
                let workers = self.config.max_concurrent_themes.max(1);
                let passes: Vec<_> = themes
                    .themes
                    .iter()
                    .map(|theme| self.run_theme(&ctx, theme))
                    .collect();
                futures::stream::iter(passes)
                    .buffered(workers)
                    .collect::<Vec<_>>()
                    .await
                    .into_iter()
                    .flatten()
                    .collect()
            }
        };

        let report = RunReport {
            scope: scope.clone(),
            keywords,
            adapter_calls: ctx.budget.used(),
            cancelled: cancel.is_cancelled(),
        };
        tracing::info!(
            scope = %scope,
            admitted = report.admitted(),
            refreshed = report.refreshed(),
            adapter_calls = report.adapter_calls,
            partial = report.is_partial(),
            cancelled = report.cancelled,
            "scrape run finished"
        );
        Ok(report)
    }

    async fn run_theme(&self, ctx: &RunContext<'_>, theme: &Theme) -> Vec<KeywordReport> {
        let cap = usize::try_from(theme.max_items_per_keyword).unwrap_or(usize::MAX);
        let mut reports = Vec::with_capacity(theme.keywords.len());
        for keyword in &theme.keywords {
            reports.push(self.run_keyword(ctx, Some(theme), keyword, cap).await);
        }
        let failed = reports
            .iter()
            .filter(|r| !matches!(r.outcome, KeywordOutcome::Completed { .. }))
            .count();
        if failed > 0 {
            tracing::warn!(theme = %theme.name, failed, "theme pass finished with failures");
        } else {
            tracing::info!(theme = %theme.name, keywords = reports.len(), "theme pass finished");
        }
        reports
    }

    async fn run_keyword(
        &self,
        ctx: &RunContext<'_>,
        theme: Option<&Theme>,
        keyword: &str,
        cap: usize,
    ) -> KeywordReport {
        let theme_name = theme.map(|t| t.name.as_str());
        let report = |outcome: KeywordOutcome| KeywordReport {
            theme: theme_name.map(str::to_string),
            keyword: keyword.to_string(),
            outcome,
        };

        if ctx.cancel.is_cancelled() {
            return report(KeywordOutcome::NotAttempted {
                reason: FetchError::Cancelled.to_string(),
            });
        }

        let budget = &ctx.budget;
        let throttle = &self.throttle;
        let collector = self.collector.as_ref();
        let cancel = ctx.cancel;
        let fetched = retry_with_backoff(self.config.retry, cancel, || async move {
            budget.try_acquire()?;
            throttle.wait(cancel).await?;
            collector.search(keyword, cap).await
        })
        .await;

        let stream = match fetched {
            Ok(stream) => stream,
            Err(err @ (FetchError::Cancelled | FetchError::BudgetExhausted { .. })) => {
                tracing::info!(theme = ?theme_name, keyword, reason = %err, "keyword not attempted");
                return report(KeywordOutcome::NotAttempted {
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                tracing::warn!(theme = ?theme_name, keyword, error = %err, "keyword skipped");
                return report(KeywordOutcome::Skipped {
                    error: err.to_string(),
                });
            }
        };

        let dedup = DedupEngine::new(self.store.as_ref(), self.config.fingerprint_prefix_chars);
        let member = theme.and_then(|t| t.assigned_member.as_deref());
        let (mut admitted, mut refreshed, mut ignored) = (0u32, 0u32, 0u32);
        let mut failure = None;

        let mut stream = stream.take(cap);
        while let Some(item) = stream.next().await {
            let raw = match item {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(theme = ?theme_name, keyword, error = %err, "result stream failed");
                    failure = Some(err.to_string());
                    break;
                }
            };
            let Some(candidate) =
                normalize_candidate(raw, self.collector.platform(), theme_name, member)
            else {
                tracing::debug!(keyword, "dropping hit without url or title");
                continue;
            };
            match dedup.admit(&candidate).await {
                Ok(AdmitOutcome::Admitted(id)) => {
                    admitted += 1;
                    tracing::debug!(article_id = id, keyword, "article admitted");
                }
                Ok(AdmitOutcome::DuplicateRefreshed(id)) => {
                    refreshed += 1;
                    tracing::debug!(article_id = id, keyword, "duplicate refreshed");
                }
                Ok(AdmitOutcome::DuplicateIgnored) => ignored += 1,
                Err(err) => {
                    tracing::error!(
                        theme = ?theme_name,
                        keyword,
                        url = %candidate.url,
                        error = %err,
                        "storage failure during admission"
                    );
                    failure = Some(err.to_string());
                    break;
                }
            }
        }

        let outcome = match failure {
            None => KeywordOutcome::Completed {
                admitted,
                refreshed,
                ignored,
            },
            Some(error) => KeywordOutcome::Partial {
                admitted,
                refreshed,
                ignored,
                error,
            },
        };
        report(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_counts_and_errors() {
        let done = KeywordOutcome::Completed {
            admitted: 3,
            refreshed: 1,
            ignored: 0,
        };
        assert_eq!(done.counts(), (3, 1, 0));
        assert_eq!(done.error(), None);
        assert_eq!(done.as_str(), "completed");

        let skipped = KeywordOutcome::Skipped {
            error: "fatal".into(),
        };
        assert_eq!(skipped.counts(), (0, 0, 0));
        assert_eq!(skipped.error(), Some("fatal"));
        assert_eq!(skipped.as_str(), "skipped");
    }

    #[test]
    fn report_totals_sum_keywords() {
        let report = RunReport {
            scope: RunScope::Global,
            keywords: vec![
                KeywordReport {
                    theme: None,
                    keyword: "Niger".into(),
                    outcome: KeywordOutcome::Completed {
                        admitted: 2,
                        refreshed: 1,
                        ignored: 0,
                    },
                },
                KeywordReport {
                    theme: None,
                    keyword: "CNSP".into(),
                    outcome: KeywordOutcome::Partial {
                        admitted: 1,
                        refreshed: 0,
                        ignored: 4,
                        error: "stream".into(),
                    },
                },
            ],
            adapter_calls: 2,
            cancelled: false,
        };
        assert_eq!(report.admitted(), 3);
        assert_eq!(report.refreshed(), 1);
        assert_eq!(report.ignored(), 4);
        assert!(report.is_partial());
    }

    #[test]
    fn keyword_report_serializes_flat() {
        let report = KeywordReport {
            theme: Some("Santé".into()),
            keyword: "paludisme Niger".into(),
            outcome: KeywordOutcome::NotAttempted {
                reason: "run cancelled".into(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "not_attempted");
        assert_eq!(json["reason"], "run cancelled");
        assert_eq!(json["theme"], "Santé");
    }
}
