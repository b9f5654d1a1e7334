//! Dashboard counters.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::DbError;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct CountRow {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ArticleStats {
    pub total: i64,
    pub by_status: Vec<CountRow>,
    /// Unscored articles are counted under `"none"`.
    pub by_sentiment: Vec<CountRow>,
    /// Unassigned articles are counted under `"unassigned"`.
    pub by_theme: Vec<CountRow>,
}

/// Articles collected on one UTC day with one tonality.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct SentimentTrendRow {
    pub day: NaiveDate,
    /// `"none"` for unscored articles.
    pub sentiment: String,
    pub count: i64,
}

/// Article counts by status, sentiment label and theme.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn article_stats(pool: &PgPool) -> Result<ArticleStats, DbError> {
    let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
        .fetch_one(pool)
        .await?;

    let by_status = sqlx::query_as::<_, CountRow>(
        "SELECT status AS key, COUNT(*) AS count FROM articles GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await?;

    let by_sentiment = sqlx::query_as::<_, CountRow>(
        "SELECT COALESCE(sentiment_label, 'none') AS key, COUNT(*) AS count \
         FROM articles GROUP BY 1 ORDER BY 1",
    )
    .fetch_all(pool)
    .await?;

    let by_theme = sqlx::query_as::<_, CountRow>(
        "SELECT COALESCE(theme, 'unassigned') AS key, COUNT(*) AS count \
         FROM articles GROUP BY 1 ORDER BY 2 DESC, 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(ArticleStats {
        total,
        by_status,
        by_sentiment,
        by_theme,
    })
}

/// Daily counts per tonality over the last `days` days, oldest day first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sentiment_trends(pool: &PgPool, days: i32) -> Result<Vec<SentimentTrendRow>, DbError> {
    let rows = sqlx::query_as::<_, SentimentTrendRow>(
        "SELECT (collected_at AT TIME ZONE 'UTC')::date AS day, \
                COALESCE(sentiment_label, 'none') AS sentiment, \
                COUNT(*) AS count \
         FROM articles \
         WHERE collected_at >= NOW() - make_interval(days => $1) \
         GROUP BY 1, 2 \
         ORDER BY 1, 2",
    )
    .bind(days)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
