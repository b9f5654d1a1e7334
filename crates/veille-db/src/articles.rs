//! Postgres implementation of [`ArticleStore`].
//!
//! Uniqueness of `fingerprint` is enforced by the `articles_fingerprint_key`
//! constraint; status changes are compare-and-set updates guarded by the
//! prior status; every mutation and its audit event share one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use veille_core::{
    Article, ArticleEvent, ArticleFilter, ArticleStatus, ArticleStore, InsertOutcome, NewArticle,
    Sentiment, SentimentLabel, StatusChange, StoreError, SyncHealth, SyncState, ThemeChange,
};

const ARTICLE_COLUMNS: &str = "id, public_id, fingerprint, source_platform, url, title, \
     raw_content, published_at, collected_at, last_seen_at, seen_count, theme, \
     sentiment_label, sentiment_confidence, status, assigned_member, sync_state, \
     last_sync_attempt_at, updated_at";

/// A row from the `articles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub public_id: Uuid,
    pub fingerprint: String,
    pub source_platform: String,
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub seen_count: i32,
    pub theme: Option<String>,
    pub sentiment_label: Option<String>,
    pub sentiment_confidence: Option<Decimal>,
    pub status: String,
    pub assigned_member: Option<String>,
    pub sync_state: String,
    pub last_sync_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ArticleRow> for Article {
    type Error = StoreError;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let integrity = |e: veille_core::ParseEnumError| {
            StoreError::Integrity(format!("article {}: {e}", row.id))
        };
        let status: ArticleStatus = row.status.parse().map_err(integrity)?;
        let sync_state: SyncState = row.sync_state.parse().map_err(integrity)?;
        let sentiment = match (&row.sentiment_label, row.sentiment_confidence) {
            (Some(label), Some(confidence)) => Some(Sentiment {
                label: label.parse::<SentimentLabel>().map_err(integrity)?,
                confidence: confidence.to_f32().unwrap_or(0.0),
            }),
            _ => None,
        };

        Ok(Article {
            id: row.id,
            public_id: row.public_id,
            fingerprint: row.fingerprint,
            source_platform: row.source_platform,
            url: row.url,
            title: row.title,
            raw_content: row.raw_content,
            published_at: row.published_at,
            collected_at: row.collected_at,
            last_seen_at: row.last_seen_at,
            seen_count: row.seen_count,
            theme: row.theme,
            sentiment,
            status,
            assigned_member: row.assigned_member,
            sync_state,
            last_sync_attempt_at: row.last_sync_attempt_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    article_id: i64,
    actor: String,
    action: String,
    from_status: Option<String>,
    to_status: Option<String>,
    from_theme: Option<String>,
    to_theme: Option<String>,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for ArticleEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let parse = |s: Option<String>| -> Result<Option<ArticleStatus>, StoreError> {
            s.map(|v| {
                v.parse()
                    .map_err(|e: veille_core::ParseEnumError| StoreError::Integrity(e.to_string()))
            })
            .transpose()
        };
        Ok(ArticleEvent {
            article_id: row.article_id,
            actor: row.actor,
            action: row.action,
            from_status: parse(row.from_status)?,
            to_status: parse(row.to_status)?,
            from_theme: row.from_theme,
            to_theme: row.to_theme,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SyncHealthRow {
    consecutive_failures: i32,
    next_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_success_at: Option<DateTime<Utc>>,
}

/// Translate a driver error into the storage taxonomy.
///
/// `23505` on the fingerprint constraint is the expected duplicate outcome;
/// any other integrity-class (`23xxx`) failure is an integrity error.
pub fn map_sqlx(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        if code.as_deref() == Some("23505") && db.constraint() == Some("articles_fingerprint_key") {
            return StoreError::DuplicateFingerprint;
        }
        if code.as_deref().is_some_and(|c| c.starts_with("23")) {
            tracing::error!(error = %db, "storage integrity violation");
            return StoreError::Integrity(db.to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

fn confidence_decimal(sentiment: Option<&Sentiment>) -> Option<Decimal> {
    sentiment
        .and_then(|s| Decimal::from_f32(s.confidence.clamp(0.0, 1.0)))
        .map(|d| d.round_dp(4))
}

/// The production storage engine.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: i64) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM articles WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO articles \
                 (public_id, fingerprint, source_platform, url, title, raw_content, \
                  published_at, collected_at, last_seen_at, theme, assigned_member) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $9, $10) \
             ON CONFLICT (fingerprint) DO NOTHING \
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(&article.fingerprint)
        .bind(&article.source_platform)
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.raw_content)
        .bind(article.published_at)
        .bind(article.collected_at)
        .bind(&article.theme)
        .bind(&article.assigned_member)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let Some(id) = id else {
            tx.rollback().await.map_err(map_sqlx)?;
            return Ok(InsertOutcome::Conflict);
        };

        sqlx::query(
            "INSERT INTO article_events (article_id, actor, action, to_status, to_theme) \
             VALUES ($1, 'system:scraper', 'collect', 'collected', $2)",
        )
        .bind(id)
        .bind(&article.theme)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(InsertOutcome::Inserted(id))
    }

    async fn refresh_seen(
        &self,
        fingerprint: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE articles \
             SET last_seen_at = GREATEST(last_seen_at, $2), seen_count = seen_count + 1 \
             WHERE fingerprint = $1 \
             RETURNING id",
        )
        .bind(fingerprint)
        .bind(seen_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)
    }

    async fn get_article(&self, id: i64) -> Result<Option<Article>, StoreError> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.map(Article::try_from).transpose()
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE ($1::TEXT IS NULL OR status = $1) \
               AND ($2::TEXT IS NULL OR theme = $2) \
               AND (NOT $3 OR theme IS NULL) \
             ORDER BY collected_at DESC, id DESC \
             LIMIT COALESCE($4, 9223372036854775807)"
        ))
        .bind(filter.status.map(ArticleStatus::as_str))
        .bind(filter.theme.as_deref())
        .bind(filter.unassigned_only)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(Article::try_from).collect()
    }

    async fn list_events(&self, article_id: i64) -> Result<Vec<ArticleEvent>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT article_id, actor, action, from_status, to_status, from_theme, to_theme, \
                    reason, created_at \
             FROM article_events \
             WHERE article_id = $1 \
             ORDER BY id",
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(ArticleEvent::try_from).collect()
    }

    async fn transition_status(&self, change: &StatusChange) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let edits = change.edits.as_ref();
        let theme = sqlx::query_scalar::<_, Option<String>>(
            "UPDATE articles \
             SET status = $3, \
                 title = COALESCE($4, title), \
                 raw_content = COALESCE($5, raw_content), \
                 sentiment_label = COALESCE($6, sentiment_label), \
                 sentiment_confidence = COALESCE($7, sentiment_confidence), \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $2 \
               AND ($8::text IS NULL OR theme = $8) \
             RETURNING theme",
        )
        .bind(change.article_id)
        .bind(change.expected.as_str())
        .bind(change.next.as_str())
        .bind(edits.and_then(|e| e.title.as_deref()))
        .bind(edits.and_then(|e| e.content.as_deref()))
        .bind(change.sentiment.map(|s| s.label.as_str()))
        .bind(confidence_decimal(change.sentiment.as_ref()))
        .bind(change.expected_theme.as_deref())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let Some(theme) = theme else {
            tx.rollback().await.map_err(map_sqlx)?;
            if self.exists(change.article_id).await? {
                return Ok(false);
            }
            return Err(StoreError::NotFound(change.article_id));
        };

        let details = serde_json::json!({
            "edits": change.edits,
            "sentiment": change.sentiment,
        });
        sqlx::query(
            "INSERT INTO article_events \
                 (article_id, actor, action, from_status, to_status, from_theme, to_theme, \
                  reason, details) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $8)",
        )
        .bind(change.article_id)
        .bind(&change.actor)
        .bind(&change.action)
        .bind(change.expected.as_str())
        .bind(change.next.as_str())
        .bind(&theme)
        .bind(&change.reason)
        .bind(details)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    async fn reassign_theme(&self, change: &ThemeChange) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        let status = sqlx::query_scalar::<_, String>(
            "UPDATE articles SET theme = $3, updated_at = NOW() \
             WHERE id = $1 AND theme IS NOT DISTINCT FROM $2 AND status = $4 \
             RETURNING status",
        )
        .bind(change.article_id)
        .bind(change.expected_theme.as_deref())
        .bind(&change.new_theme)
        .bind(change.expected_status.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        let Some(status) = status else {
            tx.rollback().await.map_err(map_sqlx)?;
            if self.exists(change.article_id).await? {
                return Ok(false);
            }
            return Err(StoreError::NotFound(change.article_id));
        };

        sqlx::query(
            "INSERT INTO article_events \
                 (article_id, actor, action, from_status, to_status, from_theme, to_theme) \
             VALUES ($1, $2, 'reassign_theme', $3, $3, $4, $5)",
        )
        .bind(change.article_id)
        .bind(&change.actor)
        .bind(&status)
        .bind(change.expected_theme.as_deref())
        .bind(&change.new_theme)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        tx.commit().await.map_err(map_sqlx)?;
        Ok(true)
    }

    async fn select_sync_batch(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE status = 'admin_certified' \
               AND sync_state IN ('never_synced', 'pending') \
             ORDER BY id \
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(Article::try_from).collect()
    }

    async fn mark_sync_attempt(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE articles \
             SET sync_state = 'pending', last_sync_attempt_at = $2 \
             WHERE id = ANY($1) AND sync_state <> 'acknowledged'",
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn acknowledge_batch(&self, ids: &[i64], at: DateTime<Utc>) -> Result<u64, StoreError> {
        // One statement: the state flip and its audit rows commit together.
        let result = sqlx::query(
            "WITH moved AS ( \
                 UPDATE articles \
                 SET sync_state = 'acknowledged', status = 'synced', updated_at = $2 \
                 WHERE id = ANY($1) AND status = 'admin_certified' \
                 RETURNING id, theme \
             ) \
             INSERT INTO article_events \
                 (article_id, actor, action, from_status, to_status, from_theme, to_theme, created_at) \
             SELECT id, 'system:sync', 'acknowledge', 'admin_certified', 'synced', theme, theme, $2 \
             FROM moved",
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(result.rows_affected())
    }

    async fn load_sync_health(&self) -> Result<SyncHealth, StoreError> {
        let row = sqlx::query_as::<_, SyncHealthRow>(
            "SELECT consecutive_failures, next_attempt_at, last_error, last_success_at \
             FROM sync_health WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(row.map_or_else(SyncHealth::default, |r| SyncHealth {
            consecutive_failures: u32::try_from(r.consecutive_failures).unwrap_or(0),
            next_attempt_at: r.next_attempt_at,
            last_error: r.last_error,
            last_success_at: r.last_success_at,
        }))
    }

    async fn save_sync_health(&self, health: &SyncHealth) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sync_health \
                 (id, consecutive_failures, next_attempt_at, last_error, last_success_at, updated_at) \
             VALUES (1, $1, $2, $3, $4, NOW()) \
             ON CONFLICT (id) DO UPDATE SET \
                 consecutive_failures = EXCLUDED.consecutive_failures, \
                 next_attempt_at = EXCLUDED.next_attempt_at, \
                 last_error = EXCLUDED.last_error, \
                 last_success_at = EXCLUDED.last_success_at, \
                 updated_at = NOW()",
        )
        .bind(i32::try_from(health.consecutive_failures).unwrap_or(i32::MAX))
        .bind(health.next_attempt_at)
        .bind(&health.last_error)
        .bind(health.last_success_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }
}
