//! Validation workflow.
//!
//! [`plan_transition`] is a pure guard over `(status, action, actor)`: it
//! either names the next status or returns [`WorkflowError::InvalidTransition`].
//! [`apply_transition`] drives it against an [`ArticleStore`] with a
//! compare-and-set write, so two concurrent actors can never both win.
//!
//! `collected → pending_enrichment → pending_review` and
//! `admin_certified → synced` are system-driven and have no operator action.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::article::{Article, ArticleStatus, ContentEdit, Sentiment};
use crate::store::{ArticleStore, StatusChange, StoreError, ThemeChange};
use crate::themes::ThemeSet;

/// Actor name recorded for enrichment transitions.
pub const ENRICHMENT_ACTOR: &str = "system:enrichment";
/// Actor name recorded for theme inference.
pub const INFERENCE_ACTOR: &str = "system:inference";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Actor {
    Member { name: String, theme: String },
    Admin { name: String },
}

impl Actor {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Actor::Member { name, .. } | Actor::Admin { name } => name,
        }
    }

    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Actor::Member { .. } => "member",
            Actor::Admin { .. } => "admin",
        }
    }

    /// `role:name`, as stored in the audit log.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}:{}", self.role(), self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Validate {
        #[serde(default)]
        edits: Option<ContentEdit>,
    },
    Reject {
        reason: String,
    },
    Certify,
    Reopen,
}

impl Action {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Action::Validate { .. } => "validate",
            Action::Reject { .. } => "reject",
            Action::Certify => "certify",
            Action::Reopen => "reopen",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("invalid transition: cannot {action} from {from}: {reason}")]
    InvalidTransition {
        from: ArticleStatus,
        action: &'static str,
        reason: String,
    },

    #[error("a non-empty reason is required to reject")]
    ReasonRequired,

    #[error("article {0} not found")]
    NotFound(i64),

    #[error("unknown theme: {0}")]
    UnknownTheme(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WorkflowError::NotFound(id),
            other => WorkflowError::Store(other.to_string()),
        }
    }
}

fn invalid(from: ArticleStatus, action: &Action, reason: impl Into<String>) -> WorkflowError {
    WorkflowError::InvalidTransition {
        from,
        action: action.name(),
        reason: reason.into(),
    }
}

/// Decide the next status for an operator action.
///
/// A member may only act on articles of their own theme; an unassigned
/// article belongs to no member. Every `(status, action, role)` triple not
/// listed below is rejected:
///
/// | from                                  | action   | role           | to                 |
/// |---------------------------------------|----------|----------------|--------------------|
/// | `pending_review`                      | validate | member         | `member_validated` |
/// | `pending_review` / `member_validated` | reject   | member, admin  | `rejected`         |
/// | `member_validated`                    | certify  | admin          | `admin_certified`  |
/// | `rejected` / `admin_certified`        | reopen   | admin          | `pending_review`   |
///
/// # Errors
///
/// [`WorkflowError::InvalidTransition`] for a disallowed triple and
/// [`WorkflowError::ReasonRequired`] for a reject without a reason.
pub fn plan_transition(
    current: ArticleStatus,
    article_theme: Option<&str>,
    action: &Action,
    actor: &Actor,
) -> Result<ArticleStatus, WorkflowError> {
    use ArticleStatus as S;

    if let Actor::Member { theme, .. } = actor {
        if article_theme != Some(theme.as_str()) {
            return Err(invalid(
                current,
                action,
                format!(
                    "member of theme '{theme}' cannot act on an article of theme '{}'",
                    article_theme.unwrap_or("unassigned")
                ),
            ));
        }
    }

    match (action, actor, current) {
        (Action::Validate { .. }, Actor::Member { .. }, S::PendingReview) => {
            Ok(S::MemberValidated)
        }
        (Action::Validate { .. }, Actor::Admin { .. }, _) => Err(invalid(
            current,
            action,
            "validation is performed by the theme's member",
        )),
        (Action::Reject { reason }, _, S::PendingReview | S::MemberValidated) => {
            if reason.trim().is_empty() {
                Err(WorkflowError::ReasonRequired)
            } else {
                Ok(S::Rejected)
            }
        }
        (Action::Certify, Actor::Admin { .. }, S::MemberValidated) => Ok(S::AdminCertified),
        (Action::Certify, Actor::Member { .. }, _) => {
            Err(invalid(current, action, "certification requires an admin"))
        }
        (Action::Reopen, Actor::Admin { .. }, S::Rejected | S::AdminCertified) => {
            Ok(S::PendingReview)
        }
        (Action::Reopen, Actor::Member { .. }, _) => {
            Err(invalid(current, action, "reopening requires an admin"))
        }
        _ => Err(invalid(current, action, "not allowed from this status")),
    }
}

/// Read, guard, and compare-and-set one operator action.
///
/// Returns the article as stored after the write.
///
/// # Errors
///
/// Guard failures as in [`plan_transition`]. A concurrent writer that moved
/// the article first surfaces as `InvalidTransition` against the stale
/// status; the caller should re-read and retry.
pub async fn apply_transition(
    store: &dyn ArticleStore,
    article_id: i64,
    action: &Action,
    actor: &Actor,
) -> Result<Article, WorkflowError> {
    let article = store
        .get_article(article_id)
        .await?
        .ok_or(WorkflowError::NotFound(article_id))?;

    let next = plan_transition(article.status, article.theme.as_deref(), action, actor)?;

    let (reason, edits) = match action {
        Action::Reject { reason } => (Some(reason.trim().to_string()), None),
        Action::Validate { edits } => (None, edits.clone().filter(|e| !e.is_empty())),
        Action::Certify | Action::Reopen => (None, None),
    };
    // A reviewer's corrected tonality replaces the model's label outright.
    let sentiment = edits
        .as_ref()
        .and_then(|e| e.sentiment)
        .map(|label| Sentiment {
            label,
            confidence: 1.0,
        });

    // The member guard ran against this read; the write must see the same theme.
    let expected_theme = match actor {
        Actor::Member { .. } => article.theme.clone(),
        Actor::Admin { .. } => None,
    };

    let change = StatusChange {
        article_id,
        expected: article.status,
        expected_theme,
        next,
        actor: actor.label(),
        action: action.name().to_string(),
        reason,
        edits,
        sentiment,
    };

    if !store.transition_status(&change).await? {
        tracing::info!(article_id, from = %article.status, action = action.name(), "lost transition race");
        return Err(invalid(
            article.status,
            action,
            "article changed concurrently; re-read and retry",
        ));
    }

    tracing::info!(
        article_id,
        from = %article.status,
        to = %next,
        actor = %actor.label(),
        "transition applied"
    );

    store
        .get_article(article_id)
        .await?
        .ok_or(WorkflowError::NotFound(article_id))
}

/// Claim a freshly collected article for enrichment.
///
/// Returns `false` if another sweep already claimed it.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn begin_enrichment(store: &dyn ArticleStore, article_id: i64) -> Result<bool, StoreError> {
    store
        .transition_status(&StatusChange {
            article_id,
            expected: ArticleStatus::Collected,
            expected_theme: None,
            next: ArticleStatus::PendingEnrichment,
            actor: ENRICHMENT_ACTOR.to_string(),
            action: "begin_enrichment".to_string(),
            reason: None,
            edits: None,
            sentiment: None,
        })
        .await
}

/// Release an article to human review, with or without a sentiment.
///
/// # Errors
///
/// Propagates storage failures.
pub async fn complete_enrichment(
    store: &dyn ArticleStore,
    article_id: i64,
    sentiment: Option<Sentiment>,
) -> Result<bool, StoreError> {
    let reason = sentiment.is_none().then(|| "sentiment unavailable".to_string());
    store
        .transition_status(&StatusChange {
            article_id,
            expected: ArticleStatus::PendingEnrichment,
            expected_theme: None,
            next: ArticleStatus::PendingReview,
            actor: ENRICHMENT_ACTOR.to_string(),
            action: "complete_enrichment".to_string(),
            reason,
            edits: None,
            sentiment,
        })
        .await
}

/// Move an article to another current theme on behalf of an operator.
///
/// Admins may move any article. A member may move an article out of their
/// own theme only. Synced articles are frozen.
///
/// # Errors
///
/// [`WorkflowError::UnknownTheme`] if `new_theme` is not in `themes`;
/// `InvalidTransition` for a guard failure or a lost race.
pub async fn reassign_theme(
    store: &dyn ArticleStore,
    themes: &ThemeSet,
    article_id: i64,
    new_theme: &str,
    actor: &Actor,
) -> Result<Article, WorkflowError> {
    let target = themes
        .find(new_theme)
        .ok_or_else(|| WorkflowError::UnknownTheme(new_theme.to_string()))?;

    let article = store
        .get_article(article_id)
        .await?
        .ok_or(WorkflowError::NotFound(article_id))?;

    let refuse = |reason: String| WorkflowError::InvalidTransition {
        from: article.status,
        action: "reassign",
        reason,
    };

    if article.status == ArticleStatus::Synced {
        return Err(refuse("synced articles cannot change theme".to_string()));
    }
    if let Actor::Member { theme, .. } = actor {
        if article.theme.as_deref() != Some(theme.as_str()) {
            return Err(refuse(format!(
                "member of theme '{theme}' can only reassign articles of that theme"
            )));
        }
    }
    if article.theme.as_deref() == Some(target.name.as_str()) {
        return Ok(article);
    }

    let change = ThemeChange {
        article_id,
        expected_theme: article.theme.clone(),
        expected_status: article.status,
        new_theme: target.name.clone(),
        actor: actor.label(),
    };
    if !store.reassign_theme(&change).await? {
        return Err(refuse(
            "article changed concurrently; re-read and retry".to_string(),
        ));
    }

    tracing::info!(
        article_id,
        from = article.theme.as_deref().unwrap_or("unassigned"),
        to = %target.name,
        actor = %actor.label(),
        "theme reassigned"
    );

    store
        .get_article(article_id)
        .await?
        .ok_or(WorkflowError::NotFound(article_id))
}

#[cfg(test)]
#[path = "workflow_test.rs"]
mod tests;
