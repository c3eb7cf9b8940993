//! Dashboard statistics.

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::{self, DashboardStats};

/// `GET /api/stats`: expired stock is swept before counting.
pub async fn dashboard(State(ctx): State<ApiContext>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = ctx
        .with_db(|core, conn| {
            core.engine().sweep_expired(conn, Utc::now())?;
            Ok(db::fetch_dashboard_stats(conn)?)
        })
        .await?;
    Ok(Json(stats))
}
