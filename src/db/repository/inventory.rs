use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::{decode_ts, encode_ts, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const LOT_COLUMNS: &str = "id, blood_type, units, expiry_date, donor_id, status, collection_date,
     version, created_at, updated_at";

pub fn insert_lot(conn: &Connection, lot: &InventoryLot) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO inventory (id, blood_type, units, expiry_date, donor_id, status,
         collection_date, version, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            lot.id.to_string(),
            lot.blood_type.as_str(),
            lot.units,
            encode_ts(&lot.expiry_date),
            lot.donor_id.map(|id| id.to_string()),
            lot.status.as_str(),
            encode_ts(&lot.collection_date),
            lot.version,
            encode_ts(&lot.created_at),
            encode_ts(&lot.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_lot(conn: &Connection, id: &Uuid) -> Result<Option<InventoryLot>, DatabaseError> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM inventory WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], lot_row_from_rusqlite)
        .optional()?;
    row.map(lot_from_row).transpose()
}

/// Every lot regardless of status, newest intake first.
pub fn list_all_lots(conn: &Connection) -> Result<Vec<InventoryLot>, DatabaseError> {
    let sql = format!("SELECT {LOT_COLUMNS} FROM inventory ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], lot_row_from_rusqlite)?;

    let mut lots = Vec::new();
    for row in rows {
        lots.push(lot_from_row(row?)?);
    }
    Ok(lots)
}

/// Lots matching `filter`, soonest expiry first (ties broken by intake order).
pub fn list_lots(conn: &Connection, filter: &LotFilter) -> Result<Vec<InventoryLot>, DatabaseError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if !filter.blood_types.is_empty() {
        let start = values.len() + 1;
        let placeholders: Vec<String> = (0..filter.blood_types.len())
            .map(|i| format!("?{}", start + i))
            .collect();
        clauses.push(format!("blood_type IN ({})", placeholders.join(", ")));
        values.extend(
            filter
                .blood_types
                .iter()
                .map(|bt| Value::Text(bt.as_str().to_string())),
        );
    }
    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(min_units) = filter.min_units {
        values.push(Value::Integer(i64::from(min_units)));
        clauses.push(format!("units >= ?{}", values.len()));
    }
    if let Some(now) = filter.not_expired_at {
        values.push(Value::Text(encode_ts(&now)));
        clauses.push(format!("expiry_date >= ?{}", values.len()));
    }
    if let Some(now) = filter.expired_before {
        values.push(Value::Text(encode_ts(&now)));
        clauses.push(format!("expiry_date < ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {LOT_COLUMNS} FROM inventory {where_clause}
         ORDER BY expiry_date ASC, created_at ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), lot_row_from_rusqlite)?;

    let mut lots = Vec::new();
    for row in rows {
        lots.push(lot_from_row(row?)?);
    }
    Ok(lots)
}

/// Persist units/status of a lot, guarded by its version.
///
/// Returns the new version. Fails with `ConcurrentModification` when the row
/// was written since `lot` was read.
pub fn update_lot(
    conn: &Connection,
    lot: &InventoryLot,
    now: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let changed = conn.execute(
        "UPDATE inventory SET units = ?1, status = ?2, updated_at = ?3, version = version + 1
         WHERE id = ?4 AND version = ?5",
        params![
            lot.units,
            lot.status.as_str(),
            encode_ts(&now),
            lot.id.to_string(),
            lot.version,
        ],
    )?;

    if changed == 0 {
        let exists = conn
            .query_row(
                "SELECT 1 FROM inventory WHERE id = ?1",
                params![lot.id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .is_some();
        return Err(if exists {
            DatabaseError::ConcurrentModification {
                entity_type: "InventoryLot".into(),
                id: lot.id.to_string(),
            }
        } else {
            DatabaseError::NotFound {
                entity_type: "InventoryLot".into(),
                id: lot.id.to_string(),
            }
        });
    }
    Ok(lot.version + 1)
}

pub fn delete_lot(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM inventory WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

/// Flip every available lot past its expiry to `expired`. Returns how many changed.
pub fn mark_expired_lots(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let ts = encode_ts(&now);
    let changed = conn.execute(
        "UPDATE inventory SET status = 'expired', updated_at = ?1, version = version + 1
         WHERE status = 'available' AND expiry_date < ?1",
        params![ts],
    )?;
    Ok(changed)
}

/// Units in available lots, grouped by blood type.
pub fn available_units_by_type(conn: &Connection) -> Result<Vec<(BloodType, u64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT blood_type, SUM(units) FROM inventory
         WHERE status = 'available'
         GROUP BY blood_type
         ORDER BY blood_type",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut totals = Vec::new();
    for row in rows {
        let (blood_type, units) = row?;
        totals.push((BloodType::from_str(&blood_type)?, units.max(0) as u64));
    }
    Ok(totals)
}

struct LotRow {
    id: String,
    blood_type: String,
    units: u32,
    expiry_date: String,
    donor_id: Option<String>,
    status: String,
    collection_date: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn lot_row_from_rusqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<LotRow> {
    Ok(LotRow {
        id: row.get(0)?,
        blood_type: row.get(1)?,
        units: row.get(2)?,
        expiry_date: row.get(3)?,
        donor_id: row.get(4)?,
        status: row.get(5)?,
        collection_date: row.get(6)?,
        version: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn lot_from_row(row: LotRow) -> Result<InventoryLot, DatabaseError> {
    Ok(InventoryLot {
        id: parse_uuid(&row.id)?,
        blood_type: BloodType::from_str(&row.blood_type)?,
        units: row.units,
        expiry_date: decode_ts(&row.expiry_date)?,
        donor_id: row.donor_id.as_deref().map(parse_uuid).transpose()?,
        status: LotStatus::from_str(&row.status)?,
        collection_date: decode_ts(&row.collection_date)?,
        version: row.version,
        created_at: decode_ts(&row.created_at)?,
        updated_at: decode_ts(&row.updated_at)?,
    })
}
