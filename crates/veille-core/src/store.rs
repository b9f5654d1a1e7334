//! The storage seam.
//!
//! [`ArticleStore`] is the single writer of truth for articles. The Postgres
//! engine in `veille-db` implements it for production; [`crate::MemoryStore`]
//! implements it for tests and dry runs. Every method that mutates state is a
//! single atomic unit on the implementation side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::article::{Article, ArticleFilter, ArticleStatus, ContentEdit, NewArticle, Sentiment};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The fingerprint uniqueness constraint rejected an insert. Callers on the
    /// admission path treat this as a dedup outcome, never as a failure.
    #[error("an article with this fingerprint already exists")]
    DuplicateFingerprint,

    #[error("article {0} not found")]
    NotFound(i64),

    /// Unexpected constraint or transaction failure. Aborts only the
    /// enclosing operation.
    #[error("storage integrity error: {0}")]
    Integrity(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// A row with the same fingerprint already existed; nothing was written.
    Conflict,
}

/// Compare-and-set status update.
///
/// Applied only if the article's status still equals `expected` and, when
/// `expected_theme` is set, its theme still equals that name. The event row
/// is written in the same transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub article_id: i64,
    pub expected: ArticleStatus,
    pub expected_theme: Option<String>,
    pub next: ArticleStatus,
    pub actor: String,
    pub action: String,
    pub reason: Option<String>,
    pub edits: Option<ContentEdit>,
    pub sentiment: Option<Sentiment>,
}

/// Compare-and-set theme update, logged with its actor.
///
/// Applied only if both the theme and the status read by the caller still
/// hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeChange {
    pub article_id: i64,
    pub expected_theme: Option<String>,
    pub expected_status: ArticleStatus,
    pub new_theme: String,
    pub actor: String,
}

/// Append-only audit record of a status or theme change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleEvent {
    pub article_id: i64,
    pub actor: String,
    pub action: String,
    pub from_status: Option<ArticleStatus>,
    pub to_status: Option<ArticleStatus>,
    pub from_theme: Option<String>,
    pub to_theme: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Consecutive-failure bookkeeping for the sync engine. One logical row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncHealth {
    pub consecutive_failures: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert unless the fingerprint already exists. The uniqueness check and
    /// the insert are one atomic primitive.
    async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome, StoreError>;

    /// Bump `last_seen_at` and `seen_count` for an existing fingerprint.
    /// Returns the article id, or `None` if no such fingerprint exists.
    /// Status, sentiment and theme are never touched.
    async fn refresh_seen(
        &self,
        fingerprint: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError>;

    async fn get_article(&self, id: i64) -> Result<Option<Article>, StoreError>;

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError>;

    /// Events for one article, oldest first.
    async fn list_events(&self, article_id: i64) -> Result<Vec<ArticleEvent>, StoreError>;

    /// Returns `false` when the expected prior status (or theme) no longer
    /// holds.
    async fn transition_status(&self, change: &StatusChange) -> Result<bool, StoreError>;

    /// Returns `false` when the expected prior theme or status no longer
    /// holds.
    async fn reassign_theme(&self, change: &ThemeChange) -> Result<bool, StoreError>;

    /// Certified articles not yet acknowledged, oldest first.
    async fn select_sync_batch(&self, limit: usize) -> Result<Vec<Article>, StoreError>;

    /// Mark the batch as in flight: `never_synced` becomes `pending`.
    async fn mark_sync_attempt(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Set `acknowledged` and `synced` together for every still-certified id.
    /// Returns the number of rows moved.
    async fn acknowledge_batch(&self, ids: &[i64], at: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn load_sync_health(&self) -> Result<SyncHealth, StoreError>;

    async fn save_sync_health(&self, health: &SyncHealth) -> Result<(), StoreError>;
}
