//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring pipeline jobs: due-theme scrapes, the optional global scrape,
//! enrichment sweeps and sync ticks.

use std::sync::Arc;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use veille_core::{AppConfig, RunScope};
use veille_sync::SyncOutcome;

use crate::pipeline::Pipeline;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pipeline: Arc<Pipeline>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_theme_scrape_job(&scheduler, Arc::clone(&pipeline), &config.scrape_cron).await?;
    if let Some(cron) = &config.global_scrape_cron {
        register_global_scrape_job(&scheduler, Arc::clone(&pipeline), cron).await?;
    }
    register_enrichment_job(&scheduler, Arc::clone(&pipeline), &config.enrich_cron).await?;
    register_sync_job(&scheduler, pipeline, &config.sync_cron).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Check for due themes and scrape them in priority order, then enrich
/// whatever they collected.
async fn register_theme_scrape_job(
    scheduler: &JobScheduler,
    pipeline: Arc<Pipeline>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            if pipeline.is_cancelled() {
                return;
            }
            match pipeline.scrape_due_themes(Utc::now()).await {
                Ok(scraped) if scraped.is_empty() => {
                    tracing::debug!("scheduler: no theme due");
                }
                Ok(scraped) => {
                    tracing::info!(themes = scraped.len(), "scheduler: due themes scraped");
                    run_enrichment(&pipeline).await;
                }
                Err(e) => tracing::error!(error = %e, "scheduler: due-theme pass failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_global_scrape_job(
    scheduler: &JobScheduler,
    pipeline: Arc<Pipeline>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            if pipeline.is_cancelled() {
                return;
            }
            tracing::info!("scheduler: starting global scrape");
            match pipeline.scrape_if_idle(RunScope::Global, "scheduler").await {
                Ok(Some(report)) => {
                    tracing::info!(
                        admitted = report.admitted(),
                        refreshed = report.refreshed(),
                        partial = report.is_partial(),
                        "scheduler: global scrape finished"
                    );
                    run_enrichment(&pipeline).await;
                }
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "scheduler: global scrape failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_enrichment_job(
    scheduler: &JobScheduler,
    pipeline: Arc<Pipeline>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);
        Box::pin(async move {
            if !pipeline.is_cancelled() {
                run_enrichment(&pipeline).await;
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn register_sync_job(
    scheduler: &JobScheduler,
    pipeline: Arc<Pipeline>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            if pipeline.is_cancelled() {
                return;
            }
            match pipeline.sync_tick(Utc::now()).await {
                Ok(SyncOutcome::Acknowledged { count }) => {
                    tracing::info!(count, "scheduler: sync batch acknowledged");
                }
                Ok(SyncOutcome::Failed {
                    consecutive_failures,
                    ..
                }) => {
                    tracing::warn!(consecutive_failures, "scheduler: sync tick failed");
                }
                Ok(SyncOutcome::Idle | SyncOutcome::Skipped { .. }) => {}
                Err(e) => tracing::error!(error = %e, "scheduler: sync tick storage failure"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_enrichment(pipeline: &Pipeline) {
    match pipeline.enrich().await {
        Ok(report) if report.claimed + report.recovered > 0 => {
            tracing::info!(
                claimed = report.claimed,
                recovered = report.recovered,
                scored = report.scored,
                unscored = report.unscored,
                themes_inferred = report.themes_inferred,
                "scheduler: enrichment sweep finished"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "scheduler: enrichment sweep failed"),
    }
}
