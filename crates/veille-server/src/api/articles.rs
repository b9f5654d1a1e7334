//! Article review handlers.
//!
//! - `GET  /api/v1/articles`                : filtered article list
//! - `GET  /api/v1/articles/{id}`           : one article with its audit trail
//! - `POST /api/v1/articles/{id}/transition`: validate, reject, certify, reopen
//! - `POST /api/v1/articles/{id}/theme`     : reassign to another theme

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use veille_core::{
    Action, Actor, Article, ArticleEvent, ArticleFilter, ArticleStatus, ThemeRegistry,
};

use crate::middleware::RequestId;

use super::{
    map_store_error, map_workflow_error, normalize_limit, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct ArticlesQuery {
    pub status: Option<ArticleStatus>,
    pub theme: Option<String>,
    #[serde(default)]
    pub unassigned: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct ArticleDetail {
    #[serde(flatten)]
    article: Article,
    events: Vec<ArticleEvent>,
}

/// Body of a transition request. The action fields sit beside the actor:
/// `{"actor": {"role": "admin", "name": "..."}, "action": "reject", "reason": "..."}`.
#[derive(Debug, Deserialize)]
pub(super) struct TransitionRequest {
    pub actor: Actor,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Deserialize)]
pub(super) struct ReassignRequest {
    pub actor: Actor,
    pub theme: String,
}

/// Current themes match case-insensitively and answer in registry spelling.
/// Themes dropped by a reload still filter by their exact name.
fn resolve_theme_filter(registry: &ThemeRegistry, name: &str) -> Option<String> {
    if let Some(theme) = registry.snapshot().find(name) {
        return Some(theme.name.clone());
    }
    registry.is_known(name).then(|| name.to_string())
}

pub(super) async fn list_articles(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ArticlesQuery>,
) -> Result<Json<ApiResponse<Vec<Article>>>, ApiError> {
    if query.unassigned && query.theme.is_some() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "theme and unassigned cannot be combined",
        ));
    }

    let theme = match query.theme {
        Some(name) => {
            let Some(theme) = resolve_theme_filter(state.pipeline.themes(), &name) else {
                return Err(ApiError::new(
                    req_id.0,
                    "validation_error",
                    format!("unknown theme '{name}'"),
                ));
            };
            Some(theme)
        }
        None => None,
    };

    let filter = ArticleFilter {
        status: query.status,
        theme,
        unassigned_only: query.unassigned,
        limit: Some(normalize_limit(query.limit)),
    };
    let data = state
        .pipeline
        .store()
        .list_articles(&filter)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ArticleDetail>>, ApiError> {
    let store = state.pipeline.store();
    let article = store
        .get_article(id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(&req_id.0, "not_found", format!("article {id} not found")))?;
    let events = store
        .list_events(id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: ArticleDetail { article, events },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn transition_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let article = veille_core::apply_transition(
        state.pipeline.store(),
        id,
        &body.action,
        &body.actor,
    )
    .await
    .map_err(|e| map_workflow_error(req_id.0.clone(), &e))?;

    tracing::info!(
        article_id = id,
        actor = %body.actor.label(),
        action = body.action.name(),
        status = %article.status,
        "article transitioned"
    );

    Ok(Json(ApiResponse {
        data: article,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn reassign_article(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<ReassignRequest>,
) -> Result<Json<ApiResponse<Article>>, ApiError> {
    let themes = state.pipeline.themes().snapshot();
    let article = veille_core::reassign_theme(
        state.pipeline.store(),
        &themes,
        id,
        &body.theme,
        &body.actor,
    )
    .await
    .map_err(|e| map_workflow_error(req_id.0.clone(), &e))?;

    tracing::info!(
        article_id = id,
        actor = %body.actor.label(),
        theme = article.theme.as_deref().unwrap_or(""),
        "article reassigned"
    );

    Ok(Json(ApiResponse {
        data: article,
        meta: ResponseMeta::new(req_id.0),
    }))
}
