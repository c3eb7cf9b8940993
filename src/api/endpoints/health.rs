//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub processing: bool,
    pub uptime_secs: u64,
    pub timestamp: String,
}

/// `GET /health`
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let database = ctx.with_db(|_, conn| Ok(crate::db::ping(conn))).await?;

    Ok(Json(HealthResponse {
        status: if database { "ok" } else { "degraded" },
        version: crate::config::APP_VERSION,
        database,
        processing: ctx.core.is_processing(),
        uptime_secs: ctx.core.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
