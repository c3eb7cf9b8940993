use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{decision_columns, decision_from_columns, parse_uuid};
use crate::db::{decode_ts, encode_ts, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const REQUEST_COLUMNS: &str = "id, recipient_id, recipient_name, blood_type, units, hospital,
     urgency, status, notes, decision_actor, decision_score, decision_reason, allocated_lot_id, created_at, updated_at";

pub fn insert_request(conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError> {
    let (actor, score, reason) = decision_columns(request.processed_by.as_ref());
    conn.execute(
        "INSERT INTO requests (id, recipient_id, recipient_name, blood_type, units, hospital,
         urgency, status, notes, decision_actor, decision_score, decision_reason, allocated_lot_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            request.id.to_string(),
            request.recipient_id.map(|id| id.to_string()),
            request.recipient_name,
            request.blood_type.as_str(),
            request.units,
            request.hospital,
            request.urgency.as_str(),
            request.status.as_str(),
            request.notes,
            actor,
            score,
            reason,
            request.allocated_lot_id.map(|id| id.to_string()),
            encode_ts(&request.created_at),
            encode_ts(&request.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_request(conn: &Connection, id: &Uuid) -> Result<Option<BloodRequest>, DatabaseError> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], request_row_from_rusqlite)
        .optional()?;
    row.map(request_from_row).transpose()
}

/// All requests, newest first.
pub fn list_requests(conn: &Connection) -> Result<Vec<BloodRequest>, DatabaseError> {
    query_requests(
        conn,
        &format!("SELECT {REQUEST_COLUMNS} FROM requests ORDER BY created_at DESC"),
        params![],
    )
}

/// Pending requests, oldest first. Priority ordering is the engine's job.
pub fn list_pending_requests(conn: &Connection) -> Result<Vec<BloodRequest>, DatabaseError> {
    query_requests(
        conn,
        &format!(
            "SELECT {REQUEST_COLUMNS} FROM requests WHERE status = 'pending'
             ORDER BY created_at ASC"
        ),
        params![],
    )
}

/// The open (pending) request raised for a recipient, if any.
pub fn find_pending_request_for_recipient(
    conn: &Connection,
    recipient_id: &Uuid,
) -> Result<Option<BloodRequest>, DatabaseError> {
    let mut found = query_requests(
        conn,
        &format!(
            "SELECT {REQUEST_COLUMNS} FROM requests
             WHERE recipient_id = ?1 AND status = 'pending'
             ORDER BY created_at ASC LIMIT 1"
        ),
        params![recipient_id.to_string()],
    )?;
    Ok(found.pop())
}

/// Persist status, notes, decision and allocated lot of an existing request.
pub fn update_request(conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError> {
    let (actor, score, reason) = decision_columns(request.processed_by.as_ref());
    let changed = conn.execute(
        "UPDATE requests SET status = ?1, notes = ?2, decision_actor = ?3, decision_score = ?4,
         decision_reason = ?5, allocated_lot_id = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            request.status.as_str(),
            request.notes,
            actor,
            score,
            reason,
            request.allocated_lot_id.map(|id| id.to_string()),
            encode_ts(&request.updated_at),
            request.id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "BloodRequest".into(),
            id: request.id.to_string(),
        });
    }
    Ok(())
}

/// Request counts keyed by status.
pub fn count_requests_by_status(
    conn: &Connection,
) -> Result<Vec<(RequestStatus, u64)>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM requests GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = Vec::new();
    for row in rows {
        let (status, count) = row?;
        counts.push((RequestStatus::from_str(&status)?, count as u64));
    }
    Ok(counts)
}

fn query_requests(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<BloodRequest>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, request_row_from_rusqlite)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(request_from_row(row?)?);
    }
    Ok(requests)
}

struct RequestRow {
    id: String,
    recipient_id: Option<String>,
    recipient_name: String,
    blood_type: String,
    units: u32,
    hospital: String,
    urgency: String,
    status: String,
    notes: Option<String>,
    decision_actor: Option<String>,
    decision_score: Option<i64>,
    decision_reason: Option<String>,
    allocated_lot_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn request_row_from_rusqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        recipient_name: row.get(2)?,
        blood_type: row.get(3)?,
        units: row.get(4)?,
        hospital: row.get(5)?,
        urgency: row.get(6)?,
        status: row.get(7)?,
        notes: row.get(8)?,
        decision_actor: row.get(9)?,
        decision_score: row.get(10)?,
        decision_reason: row.get(11)?,
        allocated_lot_id: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

fn request_from_row(row: RequestRow) -> Result<BloodRequest, DatabaseError> {
    Ok(BloodRequest {
        id: parse_uuid(&row.id)?,
        recipient_id: row.recipient_id.as_deref().map(parse_uuid).transpose()?,
        recipient_name: row.recipient_name,
        blood_type: BloodType::from_str(&row.blood_type)?,
        units: row.units,
        hospital: row.hospital,
        urgency: Urgency::from_str(&row.urgency)?,
        status: RequestStatus::from_str(&row.status)?,
        notes: row.notes,
        processed_by: decision_from_columns(
            row.decision_actor,
            row.decision_score,
            row.decision_reason,
        )?,
        allocated_lot_id: row.allocated_lot_id.as_deref().map(parse_uuid).transpose()?,
        created_at: decode_ts(&row.created_at)?,
        updated_at: decode_ts(&row.updated_at)?,
    })
}
