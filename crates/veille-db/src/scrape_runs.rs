//! Database operations for `scrape_runs` and `scrape_run_keywords`.

use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use veille_core::RunScope;
use veille_scraper::RunReport;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scrape_runs` table.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ScrapeRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub scope: String,
    pub theme: Option<String>,
    pub trigger_source: String,
    pub status: String,
    pub adapter_calls: i32,
    pub admitted_count: i32,
    pub refreshed_count: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A row from the `scrape_run_keywords` table.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct ScrapeRunKeywordRow {
    pub id: i64,
    pub scrape_run_id: i64,
    pub theme: Option<String>,
    pub keyword: String,
    pub outcome: String,
    pub admitted_count: i32,
    pub refreshed_count: i32,
    pub ignored_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Counters written when a run finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeRunTotals {
    pub adapter_calls: i32,
    pub admitted: i32,
    pub refreshed: i32,
}

/// Per-keyword outcome to record under a run.
#[derive(Debug, Clone, Default)]
pub struct NewScrapeRunKeyword<'a> {
    pub theme: Option<&'a str>,
    pub keyword: &'a str,
    /// One of `completed`, `partial`, `skipped`, `not_attempted`.
    pub outcome: &'a str,
    pub admitted: i32,
    pub refreshed: i32,
    pub ignored: i32,
    pub error_message: Option<&'a str>,
}

const RUN_COLUMNS: &str = "id, public_id, scope, theme, trigger_source, status, adapter_calls, \
     admitted_count, refreshed_count, error_message, started_at, completed_at";

// ---------------------------------------------------------------------------
// scrape_runs operations
// ---------------------------------------------------------------------------

/// Creates a new scrape run in `running` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scrape_run(
    pool: &PgPool,
    scope: &RunScope,
    trigger_source: &str,
) -> Result<ScrapeRunRow, DbError> {
    let row = sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "INSERT INTO scrape_runs (public_id, scope, theme, trigger_source, status) \
         VALUES ($1, $2, $3, $4, 'running') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(scope.kind())
    .bind(scope.theme())
    .bind(trigger_source)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

async fn finish_scrape_run<'e, E: PgExecutor<'e>>(
    executor: E,
    id: i64,
    status: &str,
    totals: ScrapeRunTotals,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scrape_runs \
         SET status = $2, completed_at = NOW(), adapter_calls = $3, admitted_count = $4, \
             refreshed_count = $5, error_message = $6 \
         WHERE id = $1 AND status = 'running'",
    )
    .bind(id)
    .bind(status)
    .bind(totals.adapter_calls)
    .bind(totals.admitted)
    .bind(totals.refreshed)
    .bind(error_message)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidScrapeRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run `succeeded`, or `partial` when some keywords were skipped.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_scrape_run(
    pool: &PgPool,
    id: i64,
    partial: bool,
    totals: ScrapeRunTotals,
) -> Result<(), DbError> {
    let status = if partial { "partial" } else { "succeeded" };
    finish_scrape_run(pool, id, status, totals, None).await
}

/// Marks a run `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_scrape_run(pool: &PgPool, id: i64, error_message: &str) -> Result<(), DbError> {
    finish_scrape_run(
        pool,
        id,
        "failed",
        ScrapeRunTotals::default(),
        Some(error_message),
    )
    .await
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scrape_run(pool: &PgPool, id: i64) -> Result<ScrapeRunRow, DbError> {
    sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM scrape_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_runs(pool: &PgPool, limit: i64) -> Result<Vec<ScrapeRunRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM scrape_runs \
         ORDER BY started_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// When the given theme last finished a run that was not failed or cancelled.
///
/// Drives cadence scheduling: a theme is due when this is older than its
/// refresh cadence, or absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn last_successful_run_at(
    pool: &PgPool,
    theme: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let at = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(completed_at) FROM scrape_runs \
         WHERE scope = 'theme' AND theme = $1 AND status IN ('succeeded', 'partial')",
    )
    .bind(theme)
    .fetch_one(pool)
    .await?;

    Ok(at)
}

// ---------------------------------------------------------------------------
// scrape_run_keywords operations
// ---------------------------------------------------------------------------

/// Records the outcome of one keyword pass.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn record_scrape_run_keyword(
    pool: &PgPool,
    scrape_run_id: i64,
    keyword: &NewScrapeRunKeyword<'_>,
) -> Result<(), DbError> {
    insert_keyword(pool, scrape_run_id, keyword).await
}

async fn insert_keyword<'e, E: PgExecutor<'e>>(
    executor: E,
    scrape_run_id: i64,
    keyword: &NewScrapeRunKeyword<'_>,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO scrape_run_keywords \
             (scrape_run_id, theme, keyword, outcome, admitted_count, refreshed_count, \
              ignored_count, error_message) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(scrape_run_id)
    .bind(keyword.theme)
    .bind(keyword.keyword)
    .bind(keyword.outcome)
    .bind(keyword.admitted)
    .bind(keyword.refreshed)
    .bind(keyword.ignored)
    .bind(keyword.error_message)
    .execute(executor)
    .await?;

    Ok(())
}

/// Persist an orchestrator report under a `running` run: one keyword row
/// per keyword pass, then the final status (`cancelled`, `partial` or
/// `succeeded`) with its counters. All in one transaction.
///
/// # Errors
///
/// Returns [`DbError::InvalidScrapeRunTransition`] if the run is not
/// `running`, or [`DbError::Sqlx`] if any write fails.
pub async fn record_run_report(
    pool: &PgPool,
    scrape_run_id: i64,
    report: &RunReport,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for entry in &report.keywords {
        let (admitted, refreshed, ignored) = entry.outcome.counts();
        let row = NewScrapeRunKeyword {
            theme: entry.theme.as_deref(),
            keyword: &entry.keyword,
            outcome: entry.outcome.as_str(),
            admitted: clamp_i32(admitted),
            refreshed: clamp_i32(refreshed),
            ignored: clamp_i32(ignored),
            error_message: entry.outcome.error(),
        };
        insert_keyword(&mut *tx, scrape_run_id, &row).await?;
    }

    let totals = ScrapeRunTotals {
        adapter_calls: i32::try_from(report.adapter_calls).unwrap_or(i32::MAX),
        admitted: clamp_i32(report.admitted()),
        refreshed: clamp_i32(report.refreshed()),
    };
    let (status, error_message) = if report.cancelled {
        ("cancelled", Some("cancelled"))
    } else if report.is_partial() {
        ("partial", None)
    } else {
        ("succeeded", None)
    };
    finish_scrape_run(&mut *tx, scrape_run_id, status, totals, error_message).await?;

    tx.commit().await?;
    Ok(())
}

fn clamp_i32(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Lists keyword outcomes for a run, in the order they were recorded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_scrape_run_keywords(
    pool: &PgPool,
    scrape_run_id: i64,
) -> Result<Vec<ScrapeRunKeywordRow>, DbError> {
    let rows = sqlx::query_as::<_, ScrapeRunKeywordRow>(
        "SELECT id, scrape_run_id, theme, keyword, outcome, admitted_count, refreshed_count, \
                ignored_count, error_message, created_at \
         FROM scrape_run_keywords \
         WHERE scrape_run_id = $1 \
         ORDER BY id",
    )
    .bind(scrape_run_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
