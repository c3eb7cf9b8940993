//! One processing pass: sync recipients, then resolve every pending request.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::engine::ResolutionEngine;
use super::error::AllocationError;
use super::types::CycleReport;

pub fn run_cycle(
    engine: &ResolutionEngine<'_>,
    conn: &Connection,
    now: DateTime<Utc>,
) -> Result<CycleReport, AllocationError> {
    let sync = engine.sync_pending_requests(conn, now)?;
    let pending = engine.pending_requests(conn)?;
    tracing::info!(pending = pending.len(), "Processing pending requests");
    let batch = engine.resolve_batch(conn, pending, now);
    Ok(CycleReport { sync, batch })
}
