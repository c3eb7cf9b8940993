use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{is_unique_violation, parse_uuid};
use crate::db::{decode_ts, encode_ts, DatabaseError};
use crate::models::enums::*;
use crate::models::*;

const DONOR_COLUMNS: &str = "id, name, age, blood_type, phone, email, address, last_donation,
     is_active, created_at, updated_at";

pub fn insert_donor(conn: &Connection, donor: &Donor) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO donors (id, name, age, blood_type, phone, email, address, last_donation,
         is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            donor.id.to_string(),
            donor.name,
            donor.age,
            donor.blood_type.as_str(),
            donor.phone,
            donor.email,
            donor.address,
            donor.last_donation.as_ref().map(encode_ts),
            donor.is_active as i32,
            encode_ts(&donor.created_at),
            encode_ts(&donor.updated_at),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            DatabaseError::ConstraintViolation("Donor email already exists".into())
        } else {
            DatabaseError::Sqlite(e)
        }
    })?;
    Ok(())
}

pub fn get_donor(conn: &Connection, id: &Uuid) -> Result<Option<Donor>, DatabaseError> {
    let sql = format!("SELECT {DONOR_COLUMNS} FROM donors WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id.to_string()], donor_row_from_rusqlite)
        .optional()?;
    row.map(donor_from_row).transpose()
}

/// All donors, newest registration first.
pub fn list_donors(conn: &Connection) -> Result<Vec<Donor>, DatabaseError> {
    let sql = format!("SELECT {DONOR_COLUMNS} FROM donors ORDER BY created_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], donor_row_from_rusqlite)?;

    let mut donors = Vec::new();
    for row in rows {
        donors.push(donor_from_row(row?)?);
    }
    Ok(donors)
}

pub fn count_donors(conn: &Connection) -> Result<u64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM donors", [], |row| row.get::<_, i64>(0))?;
    Ok(count as u64)
}

struct DonorRow {
    id: String,
    name: String,
    age: u8,
    blood_type: String,
    phone: String,
    email: String,
    address: String,
    last_donation: Option<String>,
    is_active: i32,
    created_at: String,
    updated_at: String,
}

fn donor_row_from_rusqlite(row: &rusqlite::Row<'_>) -> rusqlite::Result<DonorRow> {
    Ok(DonorRow {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        blood_type: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        address: row.get(6)?,
        last_donation: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn donor_from_row(row: DonorRow) -> Result<Donor, DatabaseError> {
    Ok(Donor {
        id: parse_uuid(&row.id)?,
        name: row.name,
        age: row.age,
        blood_type: BloodType::from_str(&row.blood_type)?,
        phone: row.phone,
        email: row.email,
        address: row.address,
        last_donation: row.last_donation.as_deref().map(decode_ts).transpose()?,
        is_active: row.is_active != 0,
        created_at: decode_ts(&row.created_at)?,
        updated_at: decode_ts(&row.updated_at)?,
    })
}
