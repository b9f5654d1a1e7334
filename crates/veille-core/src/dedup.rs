//! Fingerprint-based admission.
//!
//! The store's conditional insert is the only arbiter of uniqueness: the
//! engine never checks before inserting, so concurrent admissions of the same
//! fingerprint leave exactly one row and every loser sees a duplicate outcome.

use chrono::Utc;
use serde::Serialize;

use crate::article::{Candidate, NewArticle};
use crate::fingerprint::fingerprint;
use crate::store::{ArticleStore, InsertOutcome, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "article_id", rename_all = "snake_case")]
pub enum AdmitOutcome {
    Admitted(i64),
    DuplicateRefreshed(i64),
    DuplicateIgnored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
    /// Bump `last_seen_at` / `seen_count` on re-observation.
    pub refresh_duplicates: bool,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            refresh_duplicates: true,
        }
    }
}

pub struct DedupEngine<'a> {
    store: &'a dyn ArticleStore,
    prefix_chars: usize,
    policy: DedupPolicy,
}

impl<'a> DedupEngine<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ArticleStore, prefix_chars: usize) -> Self {
        Self {
            store,
            prefix_chars,
            policy: DedupPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DedupPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn fingerprint_of(&self, candidate: &Candidate) -> String {
        fingerprint(
            &candidate.url,
            &candidate.title,
            &candidate.content,
            self.prefix_chars,
        )
    }

    /// Admit a normalized candidate.
    ///
    /// A duplicate never resets workflow status and never re-triggers
    /// enrichment; at most its last-seen metadata is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for storage failures other than the expected
    /// uniqueness violation.
    pub async fn admit(&self, candidate: &Candidate) -> Result<AdmitOutcome, StoreError> {
        let fp = self.fingerprint_of(candidate);
        let now = Utc::now();

        let new = NewArticle {
            fingerprint: fp.clone(),
            source_platform: candidate.source_platform.clone(),
            url: candidate.url.clone(),
            title: candidate.title.clone(),
            raw_content: candidate.content.clone(),
            published_at: candidate.published_at,
            collected_at: now,
            theme: candidate.theme.clone(),
            assigned_member: candidate.assigned_member.clone(),
        };

        match self.store.insert_if_absent(&new).await {
            Ok(InsertOutcome::Inserted(id)) => {
                tracing::debug!(article_id = id, fingerprint = %fp, "admitted");
                Ok(AdmitOutcome::Admitted(id))
            }
            Ok(InsertOutcome::Conflict) | Err(StoreError::DuplicateFingerprint) => {
                self.on_duplicate(&fp, now).await
            }
            Err(e) => Err(e),
        }
    }

    async fn on_duplicate(
        &self,
        fp: &str,
        now: chrono::DateTime<Utc>,
    ) -> Result<AdmitOutcome, StoreError> {
        if !self.policy.refresh_duplicates {
            tracing::debug!(fingerprint = %fp, "duplicate ignored");
            return Ok(AdmitOutcome::DuplicateIgnored);
        }
        match self.store.refresh_seen(fp, now).await? {
            Some(id) => {
                tracing::debug!(article_id = id, fingerprint = %fp, "duplicate refreshed");
                Ok(AdmitOutcome::DuplicateRefreshed(id))
            }
            None => Ok(AdmitOutcome::DuplicateIgnored),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;

    use super::*;
    use crate::article::ArticleStatus;
    use crate::memory::MemoryStore;

    fn candidate(url: &str, title: &str) -> Candidate {
        Candidate {
            source_platform: "google_news".to_string(),
            url: url.to_string(),
            title: title.to_string(),
            content: String::new(),
            published_at: None,
            theme: Some("Agriculture".to_string()),
            assigned_member: None,
        }
    }

    #[tokio::test]
    async fn tracking_param_variants_collide() {
        let store = MemoryStore::new();
        let engine = DedupEngine::new(&store, 200);

        let first = engine
            .admit(&candidate("https://example.com/a?utm=1", "X"))
            .await
            .unwrap();
        let AdmitOutcome::Admitted(id) = first else {
            panic!("expected Admitted, got {first:?}");
        };

        let second = engine
            .admit(&candidate("https://example.com/a?utm=2", "X"))
            .await
            .unwrap();
        assert_eq!(second, AdmitOutcome::DuplicateRefreshed(id));
        assert_eq!(store.len(), 1);

        let article = store.get_article(id).await.unwrap().unwrap();
        assert_eq!(article.seen_count, 2);
    }

    #[tokio::test]
    async fn duplicate_does_not_reset_status() {
        let store = MemoryStore::new();
        let engine = DedupEngine::new(&store, 200);
        let c = candidate("https://example.com/b", "Titre");

        let AdmitOutcome::Admitted(id) = engine.admit(&c).await.unwrap() else {
            panic!("first admission must insert");
        };
        crate::workflow::begin_enrichment(&store, id).await.unwrap();

        engine.admit(&c).await.unwrap();
        let article = store.get_article(id).await.unwrap().unwrap();
        assert_eq!(article.status, ArticleStatus::PendingEnrichment);
        assert!(article.sentiment.is_none());
    }

    #[tokio::test]
    async fn policy_can_ignore_duplicates() {
        let store = MemoryStore::new();
        let engine = DedupEngine::new(&store, 200).with_policy(DedupPolicy {
            refresh_duplicates: false,
        });
        let c = candidate("https://example.com/c", "Titre");
        engine.admit(&c).await.unwrap();
        assert_eq!(
            engine.admit(&c).await.unwrap(),
            AdmitOutcome::DuplicateIgnored
        );
        assert_eq!(store.articles()[0].seen_count, 1);
    }

    #[tokio::test]
    async fn concurrent_admissions_leave_one_row() {
        let store = Arc::new(MemoryStore::new());
        let tasks = (0..16).map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let engine = DedupEngine::new(&*store, 200);
                engine
                    .admit(&candidate(
                        &format!("https://example.com/same?utm_source=s{i}"),
                        "Même article",
                    ))
                    .await
            })
        });

        let outcomes: Vec<AdmitOutcome> = join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        let admitted = outcomes
            .iter()
            .filter(|o| matches!(o, AdmitOutcome::Admitted(_)))
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(store.len(), 1);
    }
}
