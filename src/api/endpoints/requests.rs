//! Request endpoints: listing, free-standing intake, on-demand resolution
//! and administrator overrides.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::matching::Decision;
use crate::models::enums::RequestStatus;
use crate::models::{BloodRequest, NewBloodRequest};

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid request id: {raw}")))
}

/// `GET /api/requests`: newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<BloodRequest>>, ApiError> {
    let requests = ctx.with_db(|_, conn| Ok(db::list_requests(conn)?)).await?;
    Ok(Json(requests))
}

/// `POST /api/requests`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewBloodRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BloodRequest>), ApiError> {
    let Json(payload) = payload?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let request = payload.into_request(Utc::now());
    let request = ctx
        .with_db(move |_, conn| {
            db::insert_request(conn, &request)?;
            Ok(request)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `POST /api/requests/:id/resolve`
pub async fn resolve(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Decision>, ApiError> {
    let id = parse_id(&id)?;
    let decision = ctx
        .with_db(move |core, conn| {
            let request = db::get_request(conn, &id)?
                .ok_or_else(|| ApiError::NotFound(format!("Request {id} not found")))?;
            Ok(core.engine().resolve_one(conn, &request, Utc::now())?)
        })
        .await?;
    Ok(Json(decision))
}

#[derive(Debug, Default, Deserialize)]
pub struct OverrideBody {
    pub reason: Option<String>,
}

async fn apply_override(
    ctx: &ApiContext,
    id: &str,
    to: RequestStatus,
    body: Option<Json<OverrideBody>>,
) -> Result<Json<BloodRequest>, ApiError> {
    let id = parse_id(id)?;
    let reason = body
        .and_then(|Json(b)| b.reason)
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let request = ctx
        .with_db(move |core, conn| {
            Ok(core.engine().override_decision(conn, &id, to, reason, Utc::now())?)
        })
        .await?;
    Ok(Json(request))
}

/// `PUT /api/requests/:id/approve`
pub async fn approve(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    body: Option<Json<OverrideBody>>,
) -> Result<Json<BloodRequest>, ApiError> {
    apply_override(&ctx, &id, RequestStatus::Approved, body).await
}

/// `PUT /api/requests/:id/reject`
pub async fn reject(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    body: Option<Json<OverrideBody>>,
) -> Result<Json<BloodRequest>, ApiError> {
    apply_override(&ctx, &id, RequestStatus::Rejected, body).await
}

/// `PUT /api/requests/:id/fulfil`
pub async fn fulfil(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<BloodRequest>, ApiError> {
    let id = parse_id(&id)?;
    let request = ctx
        .with_db(move |core, conn| Ok(core.engine().fulfil(conn, &id, Utc::now())?))
        .await?;
    Ok(Json(request))
}
