//! Expiry sweep: out-of-date stock leaves the available pool.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::traits::AllocationStore;
use crate::db::DatabaseError;
use crate::models::LotFilter;

/// What happens to an available lot once it is past its expiry date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepPolicy {
    /// Keep the row, flip status to `expired`.
    #[default]
    MarkExpired,
    /// Delete the row.
    Remove,
}

/// Remove expired lots from the available pool. Idempotent.
///
/// Returns the number of lots affected by this call.
pub fn sweep_expired(
    store: &dyn AllocationStore,
    conn: &Connection,
    policy: SweepPolicy,
    now: DateTime<Utc>,
) -> Result<usize, DatabaseError> {
    let affected = match policy {
        SweepPolicy::MarkExpired => store.mark_expired(conn, now)?,
        SweepPolicy::Remove => {
            let stale = store.list_lots(conn, &LotFilter::stale(now))?;
            for lot in &stale {
                store.delete_lot(conn, &lot.id)?;
            }
            stale.len()
        }
    };

    if affected > 0 {
        tracing::info!(affected, ?policy, "Swept expired inventory lots");
    }
    Ok(affected)
}
