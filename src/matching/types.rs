//! Result types produced by the resolution engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::enums::{BloodType, LotStatus, RequestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

impl DecisionOutcome {
    pub fn status(&self) -> RequestStatus {
        match self {
            DecisionOutcome::Approved => RequestStatus::Approved,
            DecisionOutcome::Rejected => RequestStatus::Rejected,
        }
    }
}

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub request_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub outcome: DecisionOutcome,
    pub reason: String,
    /// `None` when no lot could be matched, so nothing was scored.
    pub score: Option<u8>,
    pub lot_id: Option<Uuid>,
    pub lot_blood_type: Option<BloodType>,
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        self.outcome == DecisionOutcome::Approved
    }
}

/// Units taken from one lot by a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotDeduction {
    pub lot_id: Uuid,
    pub blood_type: BloodType,
    pub units_taken: u32,
    pub units_remaining: u32,
    pub status: LotStatus,
}

/// Where a batch stopped because the store failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAbort {
    pub request_id: Uuid,
    pub error: String,
}

/// Partial-or-complete result of a batch run, in processing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub decisions: Vec<Decision>,
    /// Requests that were no longer pending when their turn came.
    pub skipped: Vec<Uuid>,
    pub aborted: Option<BatchAbort>,
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn approved_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.is_approved()).count()
    }

    pub fn rejected_count(&self) -> usize {
        self.decisions.len() - self.approved_count()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub recipients_examined: usize,
    /// Ids of the requests created by this pass.
    pub created: Vec<Uuid>,
}

/// One sync + batch pass, as run by the scheduler or on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub sync: SyncReport,
    pub batch: BatchReport,
}
