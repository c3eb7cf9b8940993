//! Donor registry endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::models::{Donor, NewDonor};

/// `GET /api/donors`: newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<Donor>>, ApiError> {
    let donors = ctx.with_db(|_, conn| Ok(db::list_donors(conn)?)).await?;
    Ok(Json(donors))
}

/// `POST /api/donors`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewDonor>, JsonRejection>,
) -> Result<(StatusCode, Json<Donor>), ApiError> {
    let Json(payload) = payload?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let donor = payload.into_donor(Utc::now());
    let donor = ctx
        .with_db(move |_, conn| {
            db::insert_donor(conn, &donor)?;
            Ok(donor)
        })
        .await?;

    tracing::info!(donor_id = %donor.id, blood_type = %donor.blood_type, "Donor registered");
    Ok((StatusCode::CREATED, Json(donor)))
}
