use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::decision::DecisionRecord;
use super::enums::{BloodType, RequestStatus, Urgency};

/// A unit of allocation work, usually derived 1:1 from a pending recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodRequest {
    pub id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub recipient_name: String,
    pub blood_type: BloodType,
    pub units: u32,
    pub hospital: String,
    pub urgency: Urgency,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub processed_by: Option<DecisionRecord>,
    /// Lot drawn from by an automatic approval. Manual overrides keep it.
    pub allocated_lot_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
