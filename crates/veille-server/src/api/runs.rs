//! Scrape run history and on-demand runs.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use veille_core::RunScope;
use veille_db::{ScrapeRunKeywordRow, ScrapeRunRow};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunDetail {
    #[serde(flatten)]
    run: ScrapeRunRow,
    keywords: Vec<ScrapeRunKeywordRow>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunAccepted {
    scope: RunScope,
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<ScrapeRunRow>>>, ApiError> {
    let data = veille_db::list_scrape_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<RunDetail>>, ApiError> {
    let run = veille_db::get_scrape_run(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let keywords = veille_db::list_scrape_run_keywords(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: RunDetail { run, keywords },
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Start a scrape in the background and return at once. The run waits for
/// any scrape already in flight; its outcome lands in the run history.
///
/// Body: `{"kind": "global"}`, `{"kind": "all_themes"}` or
/// `{"kind": "theme", "theme": "Santé"}`.
pub(super) async fn trigger_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(scope): Json<RunScope>,
) -> Result<(StatusCode, Json<ApiResponse<RunAccepted>>), ApiError> {
    if state.pipeline.is_cancelled() {
        return Err(ApiError::new(
            req_id.0,
            "shutting_down",
            "server is shutting down",
        ));
    }

    let scope = match scope {
        RunScope::Theme(name) => {
            let themes = state.pipeline.themes().snapshot();
            let Some(theme) = themes.find(&name) else {
                return Err(ApiError::new(
                    req_id.0,
                    "validation_error",
                    format!("unknown theme '{name}'"),
                ));
            };
            RunScope::Theme(theme.name.clone())
        }
        other => other,
    };

    let pipeline = state.pipeline.clone();
    let spawned = scope.clone();
    tokio::spawn(async move {
        if let Err(err) = pipeline.scrape(spawned.clone(), "api").await {
            tracing::error!(scope = %spawned, error = %err, "api-triggered scrape failed");
            return;
        }
        if let Err(err) = pipeline.enrich().await {
            tracing::error!(error = %err, "post-scrape enrichment failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: RunAccepted { scope },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
