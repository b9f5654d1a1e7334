//! Operator endpoints: sync trigger, theme registry, dashboard counters.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use veille_core::{Theme, ThemeSet};
use veille_db::{ArticleStats, SentimentTrendRow};
use veille_sync::SyncOutcome;

use crate::middleware::RequestId;

use super::{map_db_error, map_store_error, ApiError, ApiResponse, AppState, ResponseMeta};

/// Run one sync tick now. Waits for a scheduled tick already in flight.
pub(super) async fn trigger_sync(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SyncOutcome>>, ApiError> {
    let outcome = state
        .pipeline
        .sync_tick(Utc::now())
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: outcome,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_themes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<Theme>>> {
    let themes = state.pipeline.themes().snapshot();
    Json(ApiResponse {
        data: themes.by_priority().into_iter().cloned().collect(),
        meta: ResponseMeta::new(req_id.0),
    })
}

/// Re-read the registry file. A file that fails validation leaves the
/// current registry in place.
pub(super) async fn reload_themes(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<ThemeSet>>, ApiError> {
    match state.pipeline.themes().reload() {
        Ok(themes) => {
            tracing::info!(themes = themes.themes.len(), "theme registry reloaded");
            Ok(Json(ApiResponse {
                data: ThemeSet::clone(&themes),
                meta: ResponseMeta::new(req_id.0),
            }))
        }
        Err(err) => {
            tracing::warn!(error = %err, "theme registry reload rejected");
            Err(ApiError::new(req_id.0, "validation_error", err.to_string()))
        }
    }
}

const DEFAULT_TREND_DAYS: i32 = 7;
const MAX_TREND_DAYS: i32 = 365;

#[derive(Debug, Deserialize)]
pub(super) struct StatsQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(super) struct StatsData {
    #[serde(flatten)]
    totals: ArticleStats,
    trend_days: i32,
    /// Daily counts per tonality, oldest day first.
    trends: Vec<SentimentTrendRow>,
}

pub(super) fn normalize_trend_days(days: Option<i32>) -> i32 {
    days.unwrap_or(DEFAULT_TREND_DAYS).clamp(1, MAX_TREND_DAYS)
}

pub(super) async fn get_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<ApiResponse<StatsData>>, ApiError> {
    let trend_days = normalize_trend_days(query.days);
    let totals = veille_db::article_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let trends = veille_db::sentiment_trends(&state.pool, trend_days)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StatsData {
            totals,
            trend_days,
            trends,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
