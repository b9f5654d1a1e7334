//! In-process [`ArticleStore`] used by tests and `--dry-run` invocations.
//!
//! A single mutex guards all state, so each trait call is atomic with
//! respect to every other call, mirroring the transactional guarantees of
//! the Postgres engine.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::article::{Article, ArticleFilter, ArticleStatus, NewArticle, SyncState};
use crate::store::{
    ArticleEvent, ArticleStore, InsertOutcome, StatusChange, StoreError, SyncHealth, ThemeChange,
};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    articles: Vec<Article>,
    by_fingerprint: HashMap<String, i64>,
    events: Vec<ArticleEvent>,
    sync_health: SyncHealth,
}

impl Inner {
    fn article_mut(&mut self, id: i64) -> Option<&mut Article> {
        self.articles.iter_mut().find(|a| a.id == id)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored articles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().articles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored article, in insertion order.
    #[must_use]
    pub fn articles(&self) -> Vec<Article> {
        self.lock().articles.clone()
    }

    /// Snapshot of every audit event, in write order.
    #[must_use]
    pub fn events(&self) -> Vec<ArticleEvent> {
        self.lock().events.clone()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.lock();
        if inner.by_fingerprint.contains_key(&article.fingerprint) {
            return Ok(InsertOutcome::Conflict);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        let now = Utc::now();
        inner.articles.push(Article {
            id,
            public_id: Uuid::new_v4(),
            fingerprint: article.fingerprint.clone(),
            source_platform: article.source_platform.clone(),
            url: article.url.clone(),
            title: article.title.clone(),
            raw_content: article.raw_content.clone(),
            published_at: article.published_at,
            collected_at: article.collected_at,
            last_seen_at: article.collected_at,
            seen_count: 1,
            theme: article.theme.clone(),
            sentiment: None,
            status: ArticleStatus::Collected,
            assigned_member: article.assigned_member.clone(),
            sync_state: SyncState::NeverSynced,
            last_sync_attempt_at: None,
            updated_at: now,
        });
        inner.by_fingerprint.insert(article.fingerprint.clone(), id);
        Ok(InsertOutcome::Inserted(id))
    }

    async fn refresh_seen(
        &self,
        fingerprint: &str,
        seen_at: DateTime<Utc>,
    ) -> Result<Option<i64>, StoreError> {
        let mut inner = self.lock();
        let Some(id) = inner.by_fingerprint.get(fingerprint).copied() else {
            return Ok(None);
        };
        if let Some(article) = inner.article_mut(id) {
            article.last_seen_at = article.last_seen_at.max(seen_at);
            article.seen_count += 1;
        }
        Ok(Some(id))
    }

    async fn get_article(&self, id: i64) -> Result<Option<Article>, StoreError> {
        Ok(self.lock().articles.iter().find(|a| a.id == id).cloned())
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| filter.status.is_none_or(|s| a.status == s))
            .filter(|a| {
                filter
                    .theme
                    .as_deref()
                    .is_none_or(|t| a.theme.as_deref() == Some(t))
            })
            .filter(|a| !filter.unassigned_only || a.theme.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.collected_at.cmp(&a.collected_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = filter.limit {
            rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        }
        Ok(rows)
    }

    async fn list_events(&self, article_id: i64) -> Result<Vec<ArticleEvent>, StoreError> {
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|e| e.article_id == article_id)
            .cloned()
            .collect())
    }

    async fn transition_status(&self, change: &StatusChange) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let now = Utc::now();
        let Some(article) = inner.article_mut(change.article_id) else {
            return Err(StoreError::NotFound(change.article_id));
        };
        if article.status != change.expected {
            return Ok(false);
        }
        if let Some(expected_theme) = &change.expected_theme {
            if article.theme.as_ref() != Some(expected_theme) {
                return Ok(false);
            }
        }

        article.status = change.next;
        article.updated_at = now;
        if let Some(edits) = &change.edits {
            if let Some(title) = &edits.title {
                article.title.clone_from(title);
            }
            if let Some(content) = &edits.content {
                article.raw_content.clone_from(content);
            }
        }
        if change.sentiment.is_some() {
            article.sentiment = change.sentiment;
        }
        let theme = article.theme.clone();

        inner.events.push(ArticleEvent {
            article_id: change.article_id,
            actor: change.actor.clone(),
            action: change.action.clone(),
            from_status: Some(change.expected),
            to_status: Some(change.next),
            from_theme: theme.clone(),
            to_theme: theme,
            reason: change.reason.clone(),
            created_at: now,
        });
        Ok(true)
    }

    async fn reassign_theme(&self, change: &ThemeChange) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let now = Utc::now();
        let Some(article) = inner.article_mut(change.article_id) else {
            return Err(StoreError::NotFound(change.article_id));
        };
        if article.theme != change.expected_theme || article.status != change.expected_status {
            return Ok(false);
        }
        article.theme = Some(change.new_theme.clone());
        article.updated_at = now;
        let status = article.status;

        inner.events.push(ArticleEvent {
            article_id: change.article_id,
            actor: change.actor.clone(),
            action: "reassign_theme".to_string(),
            from_status: Some(status),
            to_status: Some(status),
            from_theme: change.expected_theme.clone(),
            to_theme: Some(change.new_theme.clone()),
            reason: None,
            created_at: now,
        });
        Ok(true)
    }

    async fn select_sync_batch(&self, limit: usize) -> Result<Vec<Article>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<Article> = inner
            .articles
            .iter()
            .filter(|a| {
                a.status == ArticleStatus::AdminCertified
                    && matches!(a.sync_state, SyncState::NeverSynced | SyncState::Pending)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.id);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn mark_sync_attempt(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for article in inner.articles.iter_mut().filter(|a| ids.contains(&a.id)) {
            if article.sync_state == SyncState::Acknowledged {
                continue;
            }
            article.sync_state = SyncState::Pending;
            article.last_sync_attempt_at = Some(at);
        }
        Ok(())
    }

    async fn acknowledge_batch(&self, ids: &[i64], at: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        let mut moved = 0_u64;
        let mut events = Vec::new();
        for article in inner
            .articles
            .iter_mut()
            .filter(|a| ids.contains(&a.id) && a.status == ArticleStatus::AdminCertified)
        {
            article.sync_state = SyncState::Acknowledged;
            article.status = ArticleStatus::Synced;
            article.updated_at = at;
            moved += 1;
            events.push(ArticleEvent {
                article_id: article.id,
                actor: "system:sync".to_string(),
                action: "acknowledge".to_string(),
                from_status: Some(ArticleStatus::AdminCertified),
                to_status: Some(ArticleStatus::Synced),
                from_theme: article.theme.clone(),
                to_theme: article.theme.clone(),
                reason: None,
                created_at: at,
            });
        }
        inner.events.extend(events);
        Ok(moved)
    }

    async fn load_sync_health(&self) -> Result<SyncHealth, StoreError> {
        Ok(self.lock().sync_health.clone())
    }

    async fn save_sync_health(&self, health: &SyncHealth) -> Result<(), StoreError> {
        self.lock().sync_health = health.clone();
        Ok(())
    }
}
