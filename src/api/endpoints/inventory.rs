//! Inventory endpoints.
//!
//! Listing sweeps expired stock first, so clients never see a lot as
//! available after its expiry date.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db;
use crate::matching::LotDeduction;
use crate::models::enums::BloodType;
use crate::models::{InventoryLot, NewInventoryLot};

/// `GET /api/inventory`: newest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<InventoryLot>>, ApiError> {
    let lots = ctx
        .with_db(|core, conn| {
            core.engine().sweep_expired(conn, Utc::now())?;
            Ok(db::list_all_lots(conn)?)
        })
        .await?;
    Ok(Json(lots))
}

/// `POST /api/inventory`
pub async fn create(
    State(ctx): State<ApiContext>,
    payload: Result<Json<NewInventoryLot>, JsonRejection>,
) -> Result<(StatusCode, Json<InventoryLot>), ApiError> {
    let Json(payload) = payload?;
    payload.validate().map_err(ApiError::BadRequest)?;

    let lot = payload.into_lot(Utc::now());
    let lot = ctx
        .with_db(move |_, conn| {
            db::insert_lot(conn, &lot)?;
            Ok(lot)
        })
        .await?;

    tracing::info!(lot_id = %lot.id, blood_type = %lot.blood_type, units = lot.units, "Inventory lot added");
    Ok((StatusCode::CREATED, Json(lot)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductBody {
    pub blood_type: BloodType,
    pub units: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductResponse {
    pub blood_type: BloodType,
    pub units: u32,
    pub deductions: Vec<LotDeduction>,
}

/// `POST /api/inventory/deduct`: all-or-nothing across lots.
pub async fn deduct(
    State(ctx): State<ApiContext>,
    payload: Result<Json<DeductBody>, JsonRejection>,
) -> Result<Json<DeductResponse>, ApiError> {
    let Json(body) = payload?;
    if body.units < 1 {
        return Err(ApiError::BadRequest("Units must be at least 1".into()));
    }

    let (blood_type, units) = (body.blood_type, body.units);
    let deductions = ctx
        .with_db(move |core, conn| Ok(core.engine().deduct(conn, blood_type, units, Utc::now())?))
        .await?;

    Ok(Json(DeductResponse {
        blood_type: body.blood_type,
        units: body.units,
        deductions,
    }))
}
