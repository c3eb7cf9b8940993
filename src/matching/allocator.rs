//! Lot selection and unit deduction.
//!
//! The allocator never opens a transaction; callers pass the connection or
//! transaction the work belongs to.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::compatibility::substitute_donor_types;
use super::error::AllocationError;
use super::expiry::{sweep_expired, SweepPolicy};
use super::traits::AllocationStore;
use super::types::LotDeduction;
use crate::db::DatabaseError;
use crate::models::enums::{BloodType, LotStatus};
use crate::models::{InventoryLot, LotFilter};

pub struct Allocator<'a> {
    store: &'a dyn AllocationStore,
    policy: SweepPolicy,
}

impl<'a> Allocator<'a> {
    pub fn new(store: &'a dyn AllocationStore, policy: SweepPolicy) -> Self {
        Self { store, policy }
    }

    /// Single lot able to cover `units` on its own.
    ///
    /// Exact type first, then compatible substitutes, soonest expiry first
    /// within each pass. Expired stock is swept beforehand.
    pub fn find_lot(
        &self,
        conn: &Connection,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryLot>, DatabaseError> {
        sweep_expired(self.store, conn, self.policy, now)?;

        let exact = self
            .store
            .list_lots(conn, &LotFilter::available(vec![blood_type], units, now))?;
        if let Some(lot) = exact.into_iter().next() {
            return Ok(Some(lot));
        }

        let substitutes = substitute_donor_types(blood_type);
        if substitutes.is_empty() {
            return Ok(None);
        }
        let compatible = self
            .store
            .list_lots(conn, &LotFilter::available(substitutes, units, now))?;
        Ok(compatible.into_iter().next())
    }

    /// Consume `units` of `blood_type` across lots, soonest expiry first.
    ///
    /// All-or-nothing: total availability is checked before any lot is
    /// written. Exhausted lots are zeroed and marked `used`.
    pub fn deduct(
        &self,
        conn: &Connection,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<LotDeduction>, AllocationError> {
        sweep_expired(self.store, conn, self.policy, now)?;

        let lots = self
            .store
            .list_lots(conn, &LotFilter::available(vec![blood_type], 1, now))?;
        let available: u64 = lots.iter().map(|l| u64::from(l.units)).sum();
        if available < u64::from(units) {
            return Err(AllocationError::InsufficientInventory {
                blood_type,
                requested: units,
                available,
            });
        }

        let mut remaining = units;
        let mut deductions = Vec::new();
        for lot in lots {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(lot.units);
            deductions.push(self.take_from_lot(conn, lot, take, now)?);
            remaining -= take;
        }
        Ok(deductions)
    }

    /// Take `units` from one lot, guarded by its version.
    pub fn take_from_lot(
        &self,
        conn: &Connection,
        mut lot: InventoryLot,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<LotDeduction, AllocationError> {
        if lot.units < units {
            return Err(AllocationError::InsufficientInventory {
                blood_type: lot.blood_type,
                requested: units,
                available: u64::from(lot.units),
            });
        }

        lot.units -= units;
        if lot.units == 0 {
            lot.status = LotStatus::Used;
        }
        self.store.save_lot(conn, &lot, now)?;

        tracing::debug!(
            lot_id = %lot.id,
            blood_type = %lot.blood_type,
            taken = units,
            remaining = lot.units,
            "Deducted units from lot"
        );

        Ok(LotDeduction {
            lot_id: lot.id,
            blood_type: lot.blood_type,
            units_taken: units,
            units_remaining: lot.units,
            status: lot.status,
        })
    }
}
