use rusqlite::Connection;
use serde::Serialize;

use super::{
    available_units_by_type, count_donors, count_recipients, count_requests_by_status,
};
use crate::db::DatabaseError;
use crate::models::enums::*;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodTypeUnits {
    pub blood_type: BloodType,
    pub units: u64,
}

/// Dashboard aggregates. Callers sweep expired lots first so dead stock
/// never counts toward `total_units`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_donors: u64,
    pub total_recipients: u64,
    pub total_units: u64,
    pub units_by_blood_type: Vec<BloodTypeUnits>,
    pub pending_requests: u64,
    pub approved_requests: u64,
    pub rejected_requests: u64,
    pub fulfilled_requests: u64,
    pub total_requests: u64,
}

pub fn fetch_dashboard_stats(conn: &Connection) -> Result<DashboardStats, DatabaseError> {
    let mut stats = DashboardStats {
        total_donors: count_donors(conn)?,
        total_recipients: count_recipients(conn)?,
        ..DashboardStats::default()
    };

    for (blood_type, units) in available_units_by_type(conn)? {
        stats.total_units += units;
        stats.units_by_blood_type.push(BloodTypeUnits { blood_type, units });
    }

    for (status, count) in count_requests_by_status(conn)? {
        stats.total_requests += count;
        match status {
            RequestStatus::Pending => stats.pending_requests = count,
            RequestStatus::Approved => stats.approved_requests = count,
            RequestStatus::Rejected => stats.rejected_requests = count,
            RequestStatus::Fulfilled => stats.fulfilled_requests = count,
        }
    }

    Ok(stats)
}
