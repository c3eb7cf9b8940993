//! SQLite-backed `AllocationStore`, delegating to the repository layer.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::traits::AllocationStore;
use crate::db::{self, DatabaseError};
use crate::models::enums::RequestStatus;
use crate::models::*;

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteAllocationStore;

impl AllocationStore for SqliteAllocationStore {
    fn list_lots(
        &self,
        conn: &Connection,
        filter: &LotFilter,
    ) -> Result<Vec<InventoryLot>, DatabaseError> {
        db::list_lots(conn, filter)
    }

    fn save_lot(
        &self,
        conn: &Connection,
        lot: &InventoryLot,
        now: DateTime<Utc>,
    ) -> Result<i64, DatabaseError> {
        db::update_lot(conn, lot, now)
    }

    fn delete_lot(&self, conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
        db::delete_lot(conn, id)
    }

    fn mark_expired(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
        db::mark_expired_lots(conn, now)
    }

    fn list_pending_requests(&self, conn: &Connection) -> Result<Vec<BloodRequest>, DatabaseError> {
        db::list_pending_requests(conn)
    }

    fn get_request(
        &self,
        conn: &Connection,
        id: &Uuid,
    ) -> Result<Option<BloodRequest>, DatabaseError> {
        db::get_request(conn, id)
    }

    fn insert_request(&self, conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError> {
        db::insert_request(conn, request)
    }

    fn save_request(&self, conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError> {
        db::update_request(conn, request)
    }

    fn find_pending_request_for_recipient(
        &self,
        conn: &Connection,
        recipient_id: &Uuid,
    ) -> Result<Option<BloodRequest>, DatabaseError> {
        db::find_pending_request_for_recipient(conn, recipient_id)
    }

    fn list_pending_recipients(&self, conn: &Connection) -> Result<Vec<Recipient>, DatabaseError> {
        db::list_pending_recipients(conn)
    }

    fn update_recipient_status(
        &self,
        conn: &Connection,
        id: &Uuid,
        status: RequestStatus,
        decision: &DecisionRecord,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        db::update_recipient_status(conn, id, status, decision, now)
    }
}
