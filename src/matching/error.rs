//! Allocation error kinds.
//!
//! Business rejections are `Decision`s, not errors. These cover the
//! infrastructure failures and guard violations that a caller has to see.

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{BloodType, RequestStatus};

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] DatabaseError),

    #[error("Insufficient {blood_type} inventory: requested {requested}, available {available}")]
    InsufficientInventory {
        blood_type: BloodType,
        requested: u32,
        available: u64,
    },

    #[error("Donor type {donor} is not compatible with recipient type {recipient}")]
    IncompatibleType {
        recipient: BloodType,
        donor: BloodType,
    },

    #[error("Inventory lot {lot_id} was modified concurrently")]
    ConcurrentModification { lot_id: String },

    #[error("Request {request_id} is not pending (status: {status})")]
    NotPending {
        request_id: Uuid,
        status: RequestStatus,
    },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<DatabaseError> for AllocationError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConcurrentModification { id, .. } => {
                AllocationError::ConcurrentModification { lot_id: id }
            }
            DatabaseError::NotFound { entity_type, id } => {
                AllocationError::NotFound(format!("{entity_type} {id}"))
            }
            other => AllocationError::StoreUnavailable(other),
        }
    }
}

impl From<rusqlite::Error> for AllocationError {
    fn from(err: rusqlite::Error) -> Self {
        AllocationError::StoreUnavailable(DatabaseError::Sqlite(err))
    }
}
