use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{decision_columns, decision_from_columns, parse_uuid};
use crate::db::{decode_ts, encode_ts, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const RECIPIENT_COLUMNS: &str = "id, name, age, blood_type, phone, hospital, units_required,
     urgency, status, decision_actor, decision_score, decision_reason, created_at, updated_at";

pub fn insert_recipient(conn: &Connection, recipient: &Recipient) -> Result<(), DatabaseError> {
    let (actor, score, reason) = decision_columns(recipient.processed_by.as_ref());
    conn.execute(
        "INSERT INTO recipients (id, name, age, blood_type, phone, hospital, units_required,
         urgency, status, decision_actor, decision_score, decision_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            recipient.id.to_string(),
            recipient.name,
            recipient.age,
            recipient.blood_type.as_str(),
            recipient.phone,
            recipient.hospital,
            recipient.units_required,
            recipient.urgency.as_str(),
            recipient.status.as_str(),
            actor,
            score,
            reason,
            encode_ts(&recipient.created_at),
            encode_ts(&recipient.updated_at),
        ],
    )?;
    Ok(())
}

/// Insert a recipient together with its pending request, atomically.
pub fn insert_recipient_with_request(
    conn: &Connection,
    recipient: &Recipient,
    now: DateTime<Utc>,
) -> Result<BloodRequest, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    insert_recipient(&tx, recipient)?;
    let request = BloodRequest::for_recipient(recipient, now);
    super::insert_request(&tx, &request)?;
    tx.commit()?;
    Ok(request)
}

pub fn get_recipient(conn: &Connection, id: &Uuid) -> Result<Option<Recipient>, DatabaseError> {
    let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], recipient_row_from_rusqlite)
        .optional()?;
    row.map(recipient_from_row).transpose()
}

/// All recipients, newest intake first.
pub fn list_recipients(conn: &Connection) -> Result<Vec<Recipient>, DatabaseError> {
    query_recipients(
        conn,
        &format!("SELECT {RECIPIENT_COLUMNS} FROM recipients ORDER BY created_at DESC"),
    )
}

/// Pending recipients, oldest intake first.
pub fn list_pending_recipients(conn: &Connection) -> Result<Vec<Recipient>, DatabaseError> {
    query_recipients(
        conn,
        &format!(
            "SELECT {RECIPIENT_COLUMNS} FROM recipients WHERE status = 'pending'
             ORDER BY created_at ASC"
        ),
    )
}

pub fn update_recipient_status(
    conn: &Connection,
    id: &Uuid,
    status: RequestStatus,
    decision: &DecisionRecord,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let (actor, score, reason) = decision_columns(Some(decision));
    let changed = conn.execute(
        "UPDATE recipients SET status = ?1, decision_actor = ?2, decision_score = ?3,
         decision_reason = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            status.as_str(),
            actor,
            score,
            reason,
            encode_ts(&now),
            id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Recipient".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn count_recipients(conn: &Connection) -> Result<u64, DatabaseError> {
    let count =
        conn.query_row("SELECT COUNT(*) FROM recipients", [], |row| row.get::<_, i64>(0))?;
    Ok(count as u64)
}

fn query_recipients(conn: &Connection, sql: &str) -> Result<Vec<Recipient>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], recipient_row_from_rusqlite)?;

    let mut recipients = Vec::new();
    for row in rows {
        recipients.push(recipient_from_row(row?)?);
    }
    Ok(recipients)
}

struct RecipientRow {
    id: String,
    name: String,
    age: u8,
    blood_type: String,
    phone: String,
    hospital: String,
    units_required: u32,
    urgency: String,
    status: String,
    decision_actor: Option<String>,
    decision_score: Option<i64>,
    decision_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

fn recipient_row_from_rusqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecipientRow> {
    Ok(RecipientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        blood_type: row.get(3)?,
        phone: row.get(4)?,
        hospital: row.get(5)?,
        units_required: row.get(6)?,
        urgency: row.get(7)?,
        status: row.get(8)?,
        decision_actor: row.get(9)?,
        decision_score: row.get(10)?,
        decision_reason: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn recipient_from_row(row: RecipientRow) -> Result<Recipient, DatabaseError> {
    Ok(Recipient {
        id: parse_uuid(&row.id)?,
        name: row.name,
        age: row.age,
        blood_type: BloodType::from_str(&row.blood_type)?,
        phone: row.phone,
        hospital: row.hospital,
        units_required: row.units_required,
        urgency: Urgency::from_str(&row.urgency)?,
        status: RequestStatus::from_str(&row.status)?,
        processed_by: decision_from_columns(
            row.decision_actor,
            row.decision_score,
            row.decision_reason,
        )?,
        created_at: decode_ts(&row.created_at)?,
        updated_at: decode_ts(&row.updated_at)?,
    })
}
