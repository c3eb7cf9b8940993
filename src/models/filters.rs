use chrono::{DateTime, Utc};

use super::enums::{BloodType, LotStatus};

/// Selection over inventory lots. Empty fields do not constrain.
#[derive(Debug, Default, Clone)]
pub struct LotFilter {
    pub blood_types: Vec<BloodType>,
    pub status: Option<LotStatus>,
    pub min_units: Option<u32>,
    /// Only lots whose expiry is at or after this instant.
    pub not_expired_at: Option<DateTime<Utc>>,
    /// Only lots whose expiry is strictly before this instant.
    pub expired_before: Option<DateTime<Utc>>,
}

impl LotFilter {
    /// Available lots of the given types holding at least `min_units`,
    /// still in date at `now`.
    pub fn available(blood_types: Vec<BloodType>, min_units: u32, now: DateTime<Utc>) -> Self {
        Self {
            blood_types,
            status: Some(LotStatus::Available),
            min_units: Some(min_units),
            not_expired_at: Some(now),
            expired_before: None,
        }
    }

    /// Available lots that went out of date before `now`.
    pub fn stale(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(LotStatus::Available),
            expired_before: Some(now),
            ..Self::default()
        }
    }
}
