use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{BloodType, LotStatus};

/// A batch of blood units of one type sharing a single expiry date.
///
/// `version` is bumped on every write and checked on update, so two writers
/// holding the same snapshot cannot both deduct from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryLot {
    pub id: Uuid,
    pub blood_type: BloodType,
    pub units: u32,
    pub expiry_date: DateTime<Utc>,
    pub donor_id: Option<Uuid>,
    pub status: LotStatus,
    pub collection_date: DateTime<Utc>,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryLot {
    pub fn is_available(&self) -> bool {
        self.status == LotStatus::Available && self.units > 0
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date < now
    }

    /// Whole days until expiry, rounded down. Negative once expired.
    pub fn days_to_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expiry_date - now).num_days()
    }
}
