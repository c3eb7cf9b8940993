//! Recipient intake endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{BloodRequest, NewRecipient, Recipient};

#[derive(Serialize)]
pub struct RecipientCreated {
    pub recipient: Recipient,
    pub request: BloodRequest,
}

/// `GET /api/recipients`: newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Recipient>>, ApiError> {
    let recipients = ctx.with_db(|_, conn| Ok(db::list_recipients(conn)?)).await?;
    Ok(Json(recipients))
}

/// `POST /api/recipients`: also opens the recipient's pending request.
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewRecipient>, JsonRejection>,
) -> Result<(StatusCode, Json<RecipientCreated>), ApiError> {
    let Json(payload) = payload?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let now = Utc::now();
    let recipient = payload.into_recipient(now);
    let (recipient, request) = ctx
        .with_db(move |_, conn| {
            let request = db::insert_recipient_with_request(conn, &recipient, now)?;
            Ok((recipient, request))
        })
        .await?;

    tracing::info!(
        recipient_id = %recipient.id,
        request_id = %request.id,
        urgency = %recipient.urgency,
        "Recipient registered"
    );
    Ok((StatusCode::CREATED, Json(RecipientCreated { recipient, request })))
}
