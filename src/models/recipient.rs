use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::DecisionRecord;
use super::enums::{BloodType, RequestStatus, Urgency};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    pub age: u8,
    pub blood_type: BloodType,
    pub phone: String,
    pub hospital: String,
    pub units_required: u32,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub processed_by: Option<DecisionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
