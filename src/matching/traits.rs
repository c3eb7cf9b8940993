//! The storage collaborator the engine depends on.
//!
//! Every method receives the connection (or open transaction) to act on,
//! so the engine decides where a unit of work begins and ends.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::RequestStatus;
use crate::models::*;

pub trait AllocationStore: Send + Sync {
    /// Lots matching the filter, soonest expiry first.
    fn list_lots(&self, conn: &Connection, filter: &LotFilter)
        -> Result<Vec<InventoryLot>, DatabaseError>;

    /// Write units/status back. Fails with `ConcurrentModification` if the
    /// lot changed since it was read. Returns the new version.
    fn save_lot(
        &self,
        conn: &Connection,
        lot: &InventoryLot,
        now: DateTime<Utc>,
    ) -> Result<i64, DatabaseError>;

    fn delete_lot(&self, conn: &Connection, id: &Uuid) -> Result<(), DatabaseError>;

    /// Flag available lots past expiry as expired. Returns how many changed.
    fn mark_expired(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError>;

    fn list_pending_requests(&self, conn: &Connection) -> Result<Vec<BloodRequest>, DatabaseError>;

    fn get_request(&self, conn: &Connection, id: &Uuid)
        -> Result<Option<BloodRequest>, DatabaseError>;

    fn insert_request(&self, conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError>;

    fn save_request(&self, conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError>;

    fn find_pending_request_for_recipient(
        &self,
        conn: &Connection,
        recipient_id: &Uuid,
    ) -> Result<Option<BloodRequest>, DatabaseError>;

    fn list_pending_recipients(&self, conn: &Connection) -> Result<Vec<Recipient>, DatabaseError>;

    fn update_recipient_status(
        &self,
        conn: &Connection,
        id: &Uuid,
        status: RequestStatus,
        decision: &DecisionRecord,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError>;
}
