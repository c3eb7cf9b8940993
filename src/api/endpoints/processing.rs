//! On-demand processing trigger.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::matching::CycleReport;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub report: CycleReport,
}

/// `POST /api/load-and-process-requests`
///
/// Runs the same guarded cycle as the scheduler; 409 if one is in flight.
pub async fn load_and_process(
    State(ctx): State<ApiContext>,
) -> Result<Json<ProcessResponse>, ApiError> {
    let core = ctx.core.clone();
    let report = tokio::task::spawn_blocking(move || core.run_processing_cycle(Utc::now()))
        .await
        .map_err(|e| ApiError::Internal(format!("processing task failed: {e}")))??;

    let message = match &report.batch.aborted {
        None => format!(
            "Processed {} requests: {} approved, {} rejected",
            report.batch.decisions.len(),
            report.batch.approved_count(),
            report.batch.rejected_count(),
        ),
        Some(abort) => format!(
            "Processing stopped at request {} after {} decisions: {}",
            abort.request_id,
            report.batch.decisions.len(),
            abort.error,
        ),
    };

    Ok(Json(ProcessResponse {
        success: report.batch.aborted.is_none(),
        message,
        report,
    }))
}
