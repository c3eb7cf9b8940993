//! Request resolution: match, score, decide, deduct, record.
//!
//! Each decision is one SQLite transaction covering the lot write, the
//! request write and the linked recipient write. A failure anywhere drops
//! the transaction and nothing is applied.

use std::cmp::Reverse;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use super::allocator::Allocator;
use super::compatibility::is_compatible;
use super::error::AllocationError;
use super::expiry::{self, SweepPolicy};
use super::scoring::{self, APPROVAL_THRESHOLD};
use super::traits::AllocationStore;
use super::types::{BatchAbort, BatchReport, Decision, DecisionOutcome, LotDeduction, SyncReport};
use crate::models::enums::{BloodType, DecisionActor, RequestStatus};
use crate::models::{BloodRequest, DecisionRecord, InventoryLot};

/// Whether `actor` may move a request from `from` to `to`.
///
/// Automatic processing only ever decides pending requests. Manual
/// overrides may flip between approved and rejected, and only an approved
/// request can be fulfilled.
pub fn transition_allowed(from: RequestStatus, to: RequestStatus, actor: DecisionActor) -> bool {
    use RequestStatus::*;
    match actor {
        DecisionActor::Auto => from == Pending && matches!(to, Approved | Rejected),
        DecisionActor::Manual => match to {
            Approved | Rejected => matches!(from, Pending | Approved | Rejected),
            Fulfilled => from == Approved,
            Pending => false,
        },
    }
}

pub struct ResolutionEngine<'a> {
    store: &'a dyn AllocationStore,
    policy: SweepPolicy,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(store: &'a dyn AllocationStore, policy: SweepPolicy) -> Self {
        Self { store, policy }
    }

    fn allocator(&self) -> Allocator<'a> {
        Allocator::new(self.store, self.policy)
    }

    pub fn sweep_expired(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, AllocationError> {
        let tx = conn.unchecked_transaction()?;
        let swept = expiry::sweep_expired(self.store, &tx, self.policy, now)?;
        tx.commit()?;
        Ok(swept)
    }

    pub fn find_lot(
        &self,
        conn: &Connection,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<InventoryLot>, AllocationError> {
        let tx = conn.unchecked_transaction()?;
        let lot = self.allocator().find_lot(&tx, blood_type, units, now)?;
        tx.commit()?;
        Ok(lot)
    }

    /// Multi-lot deduction of the exact type. Retried once on a version
    /// conflict; a second conflict reports the stock as insufficient.
    pub fn deduct(
        &self,
        conn: &Connection,
        blood_type: BloodType,
        units: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<LotDeduction>, AllocationError> {
        let attempt = || -> Result<Vec<LotDeduction>, AllocationError> {
            let tx = conn.unchecked_transaction()?;
            let taken = self.allocator().deduct(&tx, blood_type, units, now)?;
            tx.commit()?;
            Ok(taken)
        };

        match attempt() {
            Err(AllocationError::ConcurrentModification { lot_id }) => {
                tracing::warn!(%lot_id, %blood_type, "Lot changed during deduction, retrying");
                match attempt() {
                    Err(AllocationError::ConcurrentModification { .. }) => {
                        Err(AllocationError::InsufficientInventory {
                            blood_type,
                            requested: units,
                            available: 0,
                        })
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Decide one pending request.
    ///
    /// The request is re-read inside the transaction, so a stale copy in
    /// the caller's hands cannot be decided twice.
    pub fn resolve_one(
        &self,
        conn: &Connection,
        request: &BloodRequest,
        now: DateTime<Utc>,
    ) -> Result<Decision, AllocationError> {
        match self.try_resolve(conn, &request.id, now) {
            Err(AllocationError::ConcurrentModification { lot_id }) => {
                tracing::warn!(request_id = %request.id, %lot_id, "Lot conflict, retrying resolution");
                match self.try_resolve(conn, &request.id, now) {
                    Err(AllocationError::ConcurrentModification { lot_id }) => {
                        tracing::warn!(request_id = %request.id, %lot_id, "Lot conflict persisted, rejecting");
                        self.reject_insufficient(conn, &request.id, now)
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    fn load_pending(&self, conn: &Connection, id: &Uuid) -> Result<BloodRequest, AllocationError> {
        let request = self
            .store
            .get_request(conn, id)?
            .ok_or_else(|| AllocationError::NotFound(format!("BloodRequest {id}")))?;
        if !request.status.is_pending() {
            return Err(AllocationError::NotPending {
                request_id: request.id,
                status: request.status,
            });
        }
        Ok(request)
    }

    fn try_resolve(
        &self,
        conn: &Connection,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Decision, AllocationError> {
        let tx = conn.unchecked_transaction()?;
        let request = self.load_pending(&tx, id)?;
        let allocator = self.allocator();

        let decision = match allocator.find_lot(&tx, request.blood_type, request.units, now)? {
            None => insufficient(&request),
            Some(lot) => {
                if !is_compatible(request.blood_type, lot.blood_type) {
                    return Err(AllocationError::IncompatibleType {
                        recipient: request.blood_type,
                        donor: lot.blood_type,
                    });
                }
                let breakdown = scoring::breakdown(&request, &lot, now);
                let score = breakdown.total();
                tracing::debug!(request_id = %request.id, ?breakdown, score, "Scored candidate lot");

                let lot_id = lot.id;
                let lot_blood_type = lot.blood_type;
                if scoring::is_approvable(score) {
                    allocator.take_from_lot(&tx, lot, request.units, now)?;
                    Decision {
                        request_id: request.id,
                        recipient_id: request.recipient_id,
                        outcome: DecisionOutcome::Approved,
                        reason: format!("Approved with score {score} from {lot_blood_type} lot"),
                        score: Some(score),
                        lot_id: Some(lot_id),
                        lot_blood_type: Some(lot_blood_type),
                    }
                } else {
                    Decision {
                        request_id: request.id,
                        recipient_id: request.recipient_id,
                        outcome: DecisionOutcome::Rejected,
                        reason: format!(
                            "Rejected due to low priority score. Threshold: {APPROVAL_THRESHOLD}, Score: {score}"
                        ),
                        score: Some(score),
                        lot_id: Some(lot_id),
                        lot_blood_type: Some(lot_blood_type),
                    }
                }
            }
        };

        self.record(&tx, request, &decision, now)?;
        tx.commit()?;

        tracing::info!(
            request_id = %decision.request_id,
            outcome = ?decision.outcome,
            score = ?decision.score,
            "Request resolved"
        );
        Ok(decision)
    }

    fn reject_insufficient(
        &self,
        conn: &Connection,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<Decision, AllocationError> {
        let tx = conn.unchecked_transaction()?;
        let request = self.load_pending(&tx, id)?;
        let decision = insufficient(&request);
        self.record(&tx, request, &decision, now)?;
        tx.commit()?;
        Ok(decision)
    }

    /// Write the decision to the request and its recipient.
    fn record(
        &self,
        conn: &Connection,
        mut request: BloodRequest,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> Result<(), AllocationError> {
        let status = decision.outcome.status();
        if !transition_allowed(request.status, status, DecisionActor::Auto) {
            return Err(AllocationError::InvalidTransition { from: request.status, to: status });
        }
        let record = DecisionRecord::auto(decision.score, decision.reason.clone());

        request.status = status;
        request.notes = Some(decision.reason.clone());
        request.processed_by = Some(record.clone());
        if decision.is_approved() {
            request.allocated_lot_id = decision.lot_id;
        }
        request.updated_at = now;
        self.store.save_request(conn, &request)?;

        if let Some(recipient_id) = request.recipient_id {
            self.store
                .update_recipient_status(conn, &recipient_id, status, &record, now)?;
        }
        Ok(())
    }

    /// Resolve requests in priority order: urgency descending, then oldest
    /// first. Stops at the first store failure and reports what was done.
    pub fn resolve_batch(
        &self,
        conn: &Connection,
        mut requests: Vec<BloodRequest>,
        now: DateTime<Utc>,
    ) -> BatchReport {
        let started = Instant::now();
        requests.sort_by_key(|r| (Reverse(r.urgency.rank()), r.created_at));

        let mut report = BatchReport::default();
        for request in &requests {
            match self.resolve_one(conn, request, now) {
                Ok(decision) => report.decisions.push(decision),
                Err(AllocationError::NotPending { .. }) | Err(AllocationError::NotFound(_)) => {
                    tracing::debug!(request_id = %request.id, "Request no longer pending, skipped");
                    report.skipped.push(request.id);
                }
                Err(e) => {
                    tracing::error!(request_id = %request.id, error = %e, "Batch aborted");
                    report.aborted = Some(BatchAbort {
                        request_id: request.id,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            approved = report.approved_count(),
            rejected = report.rejected_count(),
            skipped = report.skipped.len(),
            aborted = report.aborted.is_some(),
            duration_ms = report.duration_ms,
            "Batch processing complete"
        );
        report
    }

    pub fn pending_requests(&self, conn: &Connection) -> Result<Vec<BloodRequest>, AllocationError> {
        Ok(self.store.list_pending_requests(conn)?)
    }

    /// Give every pending recipient exactly one pending request.
    pub fn sync_pending_requests(
        &self,
        conn: &Connection,
        now: DateTime<Utc>,
    ) -> Result<SyncReport, AllocationError> {
        let tx = conn.unchecked_transaction()?;
        let recipients = self.store.list_pending_recipients(&tx)?;
        let mut report = SyncReport {
            recipients_examined: recipients.len(),
            created: Vec::new(),
        };

        for recipient in &recipients {
            if self
                .store
                .find_pending_request_for_recipient(&tx, &recipient.id)?
                .is_some()
            {
                continue;
            }
            let request = BloodRequest::for_recipient(recipient, now);
            self.store.insert_request(&tx, &request)?;
            report.created.push(request.id);
        }
        tx.commit()?;

        if !report.created.is_empty() {
            tracing::info!(created = report.created.len(), "Created requests for pending recipients");
        }
        Ok(report)
    }

    /// Administrator decision. Bypasses scoring and never touches inventory.
    pub fn override_decision(
        &self,
        conn: &Connection,
        id: &Uuid,
        to: RequestStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<BloodRequest, AllocationError> {
        let reason = reason.unwrap_or_else(|| format!("Manually {to} by administrator"));
        self.apply_manual(conn, id, to, DecisionRecord::manual(reason), now)
    }

    /// Mark an approved request as fulfilled.
    pub fn fulfil(
        &self,
        conn: &Connection,
        id: &Uuid,
        now: DateTime<Utc>,
    ) -> Result<BloodRequest, AllocationError> {
        self.apply_manual(conn, id, RequestStatus::Fulfilled, DecisionRecord::manual("Fulfilled"), now)
    }

    fn apply_manual(
        &self,
        conn: &Connection,
        id: &Uuid,
        to: RequestStatus,
        record: DecisionRecord,
        now: DateTime<Utc>,
    ) -> Result<BloodRequest, AllocationError> {
        let tx = conn.unchecked_transaction()?;
        let mut request = self
            .store
            .get_request(&tx, id)?
            .ok_or_else(|| AllocationError::NotFound(format!("BloodRequest {id}")))?;

        if !transition_allowed(request.status, to, DecisionActor::Manual) {
            return Err(AllocationError::InvalidTransition { from: request.status, to });
        }

        request.status = to;
        request.notes = Some(record.reason.clone());
        request.processed_by = Some(record.clone());
        request.updated_at = now;
        self.store.save_request(&tx, &request)?;

        if let Some(recipient_id) = request.recipient_id {
            self.store
                .update_recipient_status(&tx, &recipient_id, to, &record, now)?;
        }
        tx.commit()?;

        tracing::info!(request_id = %request.id, status = %to, "Manual decision applied");
        Ok(request)
    }
}

fn insufficient(request: &BloodRequest) -> Decision {
    Decision {
        request_id: request.id,
        recipient_id: request.recipient_id,
        outcome: DecisionOutcome::Rejected,
        reason: format!(
            "Insufficient {} blood units available. Required: {}",
            request.blood_type, request.units
        ),
        score: None,
        lot_id: None,
        lot_blood_type: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, open_memory_database, DatabaseError};
    use crate::matching::store::SqliteAllocationStore;
    use crate::models::enums::{LotStatus, Urgency};
    use crate::models::{LotFilter, Recipient};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn lot(blood_type: BloodType, units: u32, days: i64) -> InventoryLot {
        InventoryLot {
            id: Uuid::new_v4(),
            blood_type,
            units,
            expiry_date: now() + Duration::days(days),
            donor_id: None,
            status: LotStatus::Available,
            collection_date: now() - Duration::days(1),
            version: 0,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn recipient(blood_type: BloodType, units: u32, urgency: Urgency, age_minutes: i64) -> Recipient {
        let created = now() - Duration::minutes(age_minutes);
        Recipient {
            id: Uuid::new_v4(),
            name: "Patient".into(),
            age: 40,
            blood_type,
            phone: "5550001111".into(),
            hospital: "City Hospital".into(),
            units_required: units,
            urgency,
            status: RequestStatus::Pending,
            processed_by: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn seed_request(conn: &Connection, r: &Recipient) -> BloodRequest {
        db::insert_recipient(conn, r).unwrap();
        let request = BloodRequest::for_recipient(r, r.created_at);
        db::insert_request(conn, &request).unwrap();
        request
    }

    #[test]
    fn end_to_end_o_negative_critical() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let stock = lot(BloodType::ONeg, 5, 60);
        db::insert_lot(&conn, &stock).unwrap();
        let r = recipient(BloodType::ONeg, 2, Urgency::Critical, 5);
        let request = seed_request(&conn, &r);

        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert!(decision.is_approved());
        assert_eq!(decision.score, Some(95));
        assert_eq!(decision.lot_id, Some(stock.id));

        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 3);
        let stored = db::get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
        let rec = db::get_recipient(&conn, &r.id).unwrap().unwrap();
        assert_eq!(rec.status, RequestStatus::Approved);
        let by = rec.processed_by.unwrap();
        assert_eq!(by.actor, DecisionActor::Auto);
        assert_eq!(by.score, Some(95));
    }

    #[test]
    fn low_score_rejects_without_deducting() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        // 10 + 30 + 10 + 0 = 50
        let stock = lot(BloodType::BPos, 3, 5);
        db::insert_lot(&conn, &stock).unwrap();
        let request = seed_request(&conn, &recipient(BloodType::BPos, 3, Urgency::Low, 1));

        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Rejected);
        assert_eq!(decision.score, Some(50));
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 3);
    }

    #[test]
    fn no_lot_rejects_without_score() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let r = recipient(BloodType::AbNeg, 4, Urgency::High, 1);
        let request = seed_request(&conn, &r);
        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Rejected);
        assert_eq!(decision.score, None);
        assert!(decision.reason.starts_with("Insufficient AB- blood units"));

        let rec = db::get_recipient(&conn, &r.id).unwrap().unwrap();
        assert_eq!(rec.status, RequestStatus::Rejected);
    }

    #[test]
    fn resolved_request_cannot_be_resolved_again() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let request = seed_request(&conn, &recipient(BloodType::APos, 1, Urgency::Medium, 1));
        engine.resolve_one(&conn, &request, now()).unwrap();
        let err = engine.resolve_one(&conn, &request, now()).unwrap_err();
        assert!(matches!(err, AllocationError::NotPending { status: RequestStatus::Rejected, .. }));
    }

    #[test]
    fn batch_serves_critical_before_older_low() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        // Enough for one request of 2 units.
        let stock = lot(BloodType::APos, 3, 60);
        db::insert_lot(&conn, &stock).unwrap();
        let low = seed_request(&conn, &recipient(BloodType::APos, 2, Urgency::Low, 60));
        let critical = seed_request(&conn, &recipient(BloodType::APos, 2, Urgency::Critical, 1));

        let report = engine.resolve_batch(&conn, vec![low.clone(), critical.clone()], now());
        assert!(report.aborted.is_none());
        assert_eq!(report.decisions.len(), 2);
        assert_eq!(report.decisions[0].request_id, critical.id);
        assert!(report.decisions[0].is_approved());
        assert_eq!(report.decisions[1].request_id, low.id);
        assert_eq!(report.decisions[1].outcome, DecisionOutcome::Rejected);
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 1);
    }

    #[test]
    fn batch_orders_same_urgency_oldest_first() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let newer = seed_request(&conn, &recipient(BloodType::OPos, 1, Urgency::High, 5));
        let older = seed_request(&conn, &recipient(BloodType::OPos, 1, Urgency::High, 50));
        let report = engine.resolve_batch(&conn, vec![newer.clone(), older.clone()], now());
        let order: Vec<Uuid> = report.decisions.iter().map(|d| d.request_id).collect();
        assert_eq!(order, vec![older.id, newer.id]);
    }

    #[test]
    fn batch_skips_requests_no_longer_pending() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let request = seed_request(&conn, &recipient(BloodType::OPos, 1, Urgency::High, 5));
        engine
            .override_decision(&conn, &request.id, RequestStatus::Approved, None, now())
            .unwrap();
        let report = engine.resolve_batch(&conn, vec![request.clone()], now());
        assert!(report.decisions.is_empty());
        assert_eq!(report.skipped, vec![request.id]);
    }

    #[test]
    fn sync_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        db::insert_recipient(&conn, &recipient(BloodType::ANeg, 2, Urgency::High, 3)).unwrap();
        db::insert_recipient(&conn, &recipient(BloodType::BNeg, 1, Urgency::Low, 2)).unwrap();

        let first = engine.sync_pending_requests(&conn, now()).unwrap();
        assert_eq!(first.recipients_examined, 2);
        assert_eq!(first.created.len(), 2);

        let second = engine.sync_pending_requests(&conn, now()).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(db::list_pending_requests(&conn).unwrap().len(), 2);
    }

    #[test]
    fn synced_request_keeps_recipient_creation_time() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let r = recipient(BloodType::ANeg, 2, Urgency::High, 30);
        db::insert_recipient(&conn, &r).unwrap();
        engine.sync_pending_requests(&conn, now()).unwrap();
        let request = db::find_pending_request_for_recipient(&conn, &r.id).unwrap().unwrap();
        assert_eq!(request.created_at, r.created_at);
        assert_eq!(request.units, 2);
    }

    #[test]
    fn expired_lot_is_invisible_to_resolution() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let stale = lot(BloodType::ONeg, 10, -2);
        db::insert_lot(&conn, &stale).unwrap();
        assert!(engine.find_lot(&conn, BloodType::ONeg, 1, now()).unwrap().is_none());

        let request = seed_request(&conn, &recipient(BloodType::ONeg, 1, Urgency::Critical, 1));
        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert_eq!(decision.score, None);
        assert_eq!(db::get_lot(&conn, &stale.id).unwrap().unwrap().units, 10);
    }

    #[test]
    fn manual_override_propagates_and_leaves_inventory() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let stock = lot(BloodType::APos, 5, 60);
        db::insert_lot(&conn, &stock).unwrap();
        let r = recipient(BloodType::APos, 2, Urgency::Low, 1);
        let request = seed_request(&conn, &r);

        let updated = engine
            .override_decision(&conn, &request.id, RequestStatus::Approved, None, now())
            .unwrap();
        assert_eq!(updated.status, RequestStatus::Approved);
        assert_eq!(updated.processed_by.as_ref().unwrap().actor, DecisionActor::Manual);

        let rec = db::get_recipient(&conn, &r.id).unwrap().unwrap();
        assert_eq!(rec.status, RequestStatus::Approved);
        assert_eq!(rec.processed_by.unwrap().actor, DecisionActor::Manual);
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 5);

        let rejected = engine
            .override_decision(&conn, &request.id, RequestStatus::Rejected, Some("Donor recall".into()), now())
            .unwrap();
        assert_eq!(rejected.notes.as_deref(), Some("Donor recall"));
    }

    #[test]
    fn fulfil_only_from_approved() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let request = seed_request(&conn, &recipient(BloodType::APos, 2, Urgency::Low, 1));
        let err = engine.fulfil(&conn, &request.id, now()).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::InvalidTransition { from: RequestStatus::Pending, to: RequestStatus::Fulfilled }
        ));

        engine
            .override_decision(&conn, &request.id, RequestStatus::Approved, None, now())
            .unwrap();
        let done = engine.fulfil(&conn, &request.id, now()).unwrap();
        assert_eq!(done.status, RequestStatus::Fulfilled);

        let err = engine
            .override_decision(&conn, &request.id, RequestStatus::Rejected, None, now())
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidTransition { .. }));
    }

    #[test]
    fn transition_table() {
        use RequestStatus::*;
        assert!(transition_allowed(Pending, Approved, DecisionActor::Auto));
        assert!(!transition_allowed(Rejected, Approved, DecisionActor::Auto));
        assert!(!transition_allowed(Pending, Fulfilled, DecisionActor::Auto));
        assert!(transition_allowed(Rejected, Approved, DecisionActor::Manual));
        assert!(!transition_allowed(Rejected, Fulfilled, DecisionActor::Manual));
        assert!(!transition_allowed(Fulfilled, Rejected, DecisionActor::Manual));
    }

    #[test]
    fn engine_deduct_is_all_or_nothing() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let a = lot(BloodType::BNeg, 5, 10);
        let b = lot(BloodType::BNeg, 3, 20);
        db::insert_lot(&conn, &a).unwrap();
        db::insert_lot(&conn, &b).unwrap();

        assert!(matches!(
            engine.deduct(&conn, BloodType::BNeg, 10, now()),
            Err(AllocationError::InsufficientInventory { .. })
        ));
        let taken = engine.deduct(&conn, BloodType::BNeg, 6, now()).unwrap();
        assert_eq!(taken.iter().map(|d| d.units_taken).sum::<u32>(), 6);
        assert_eq!(db::get_lot(&conn, &a.id).unwrap().unwrap().units, 0);
        assert_eq!(db::get_lot(&conn, &b.id).unwrap().unwrap().units, 2);
    }

    /// Fails the first `failures` lot saves with a version conflict, and
    /// every save of `broken_request` with a storage error.
    struct FaultyStore {
        inner: SqliteAllocationStore,
        failures: AtomicUsize,
        broken_request: Option<Uuid>,
        saved_requests: Mutex<Vec<Uuid>>,
    }

    impl FaultyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: SqliteAllocationStore,
                failures: AtomicUsize::new(failures),
                broken_request: None,
                saved_requests: Mutex::new(Vec::new()),
            }
        }

        fn failing_request(id: Uuid) -> Self {
            Self { broken_request: Some(id), ..Self::new(0) }
        }

        fn saved_requests(&self) -> Vec<Uuid> {
            self.saved_requests.lock().unwrap().clone()
        }
    }

    impl AllocationStore for FaultyStore {
        fn list_lots(&self, conn: &Connection, filter: &LotFilter) -> Result<Vec<InventoryLot>, DatabaseError> {
            self.inner.list_lots(conn, filter)
        }
        fn save_lot(&self, conn: &Connection, lot: &InventoryLot, now: DateTime<Utc>) -> Result<i64, DatabaseError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(DatabaseError::ConcurrentModification {
                    entity_type: "InventoryLot".into(),
                    id: lot.id.to_string(),
                });
            }
            self.inner.save_lot(conn, lot, now)
        }
        fn delete_lot(&self, conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
            self.inner.delete_lot(conn, id)
        }
        fn mark_expired(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
            self.inner.mark_expired(conn, now)
        }
        fn list_pending_requests(&self, conn: &Connection) -> Result<Vec<BloodRequest>, DatabaseError> {
            self.inner.list_pending_requests(conn)
        }
        fn get_request(&self, conn: &Connection, id: &Uuid) -> Result<Option<BloodRequest>, DatabaseError> {
            self.inner.get_request(conn, id)
        }
        fn insert_request(&self, conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError> {
            self.inner.insert_request(conn, request)
        }
        fn save_request(&self, conn: &Connection, request: &BloodRequest) -> Result<(), DatabaseError> {
            self.saved_requests.lock().unwrap().push(request.id);
            if self.broken_request == Some(request.id) {
                return Err(DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
                    Some("disk I/O error".into()),
                )));
            }
            self.inner.save_request(conn, request)
        }
        fn find_pending_request_for_recipient(
            &self,
            conn: &Connection,
            recipient_id: &Uuid,
        ) -> Result<Option<BloodRequest>, DatabaseError> {
            self.inner.find_pending_request_for_recipient(conn, recipient_id)
        }
        fn list_pending_recipients(&self, conn: &Connection) -> Result<Vec<Recipient>, DatabaseError> {
            self.inner.list_pending_recipients(conn)
        }
        fn update_recipient_status(
            &self,
            conn: &Connection,
            id: &Uuid,
            status: RequestStatus,
            decision: &DecisionRecord,
            now: DateTime<Utc>,
        ) -> Result<(), DatabaseError> {
            self.inner.update_recipient_status(conn, id, status, decision, now)
        }
    }

    #[test]
    fn single_conflict_is_retried() {
        let conn = open_memory_database().unwrap();
        let store = FaultyStore::new(1);
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let stock = lot(BloodType::ONeg, 5, 60);
        db::insert_lot(&conn, &stock).unwrap();
        let request = seed_request(&conn, &recipient(BloodType::ONeg, 2, Urgency::Critical, 1));

        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert!(decision.is_approved());
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 3);
    }

    #[test]
    fn repeated_conflict_rejects_as_insufficient() {
        let conn = open_memory_database().unwrap();
        let store = FaultyStore::new(2);
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let stock = lot(BloodType::ONeg, 5, 60);
        db::insert_lot(&conn, &stock).unwrap();
        let r = recipient(BloodType::ONeg, 2, Urgency::Critical, 1);
        let request = seed_request(&conn, &r);

        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Rejected);
        assert_eq!(decision.score, None);
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 5);
        assert_eq!(db::get_recipient(&conn, &r.id).unwrap().unwrap().status, RequestStatus::Rejected);
    }

    #[test]
    fn store_failure_aborts_batch_and_keeps_earlier_decisions() {
        let conn = open_memory_database().unwrap();
        let stock = lot(BloodType::ONeg, 10, 60);
        db::insert_lot(&conn, &stock).unwrap();

        let first = seed_request(&conn, &recipient(BloodType::ONeg, 1, Urgency::Critical, 30));
        let second = seed_request(&conn, &recipient(BloodType::ONeg, 1, Urgency::High, 20));
        let third = seed_request(&conn, &recipient(BloodType::ONeg, 1, Urgency::Medium, 10));

        let store = FaultyStore::failing_request(second.id);
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);
        let report = engine.resolve_batch(
            &conn,
            vec![third.clone(), second.clone(), first.clone()],
            now(),
        );

        assert_eq!(report.decisions.len(), 1);
        assert_eq!(report.decisions[0].request_id, first.id);
        assert!(report.decisions[0].is_approved());
        let aborted = report.aborted.expect("batch should abort");
        assert_eq!(aborted.request_id, second.id);
        assert!(report.skipped.is_empty());

        // First decision committed; the failed one rolled back with its deduction.
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 9);
        assert_eq!(
            db::get_request(&conn, &first.id).unwrap().unwrap().status,
            RequestStatus::Approved
        );
        assert_eq!(
            db::get_request(&conn, &second.id).unwrap().unwrap().status,
            RequestStatus::Pending
        );
        assert_eq!(
            db::get_request(&conn, &third.id).unwrap().unwrap().status,
            RequestStatus::Pending
        );
        assert!(!store.saved_requests().contains(&third.id));
    }

    #[test]
    fn manual_reject_keeps_allocated_lot_for_reconciliation() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let stock = lot(BloodType::BPos, 4, 60);
        db::insert_lot(&conn, &stock).unwrap();
        let request = seed_request(&conn, &recipient(BloodType::BPos, 2, Urgency::Critical, 1));

        engine.resolve_one(&conn, &request, now()).unwrap();
        let approved = db::get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(approved.allocated_lot_id, Some(stock.id));

        let rejected = engine
            .override_decision(&conn, &request.id, RequestStatus::Rejected, None, now())
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.allocated_lot_id, Some(stock.id));
        let stored = db::get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.allocated_lot_id, Some(stock.id));
        assert_eq!(db::get_lot(&conn, &stock.id).unwrap().unwrap().units, 2);
    }

    #[test]
    fn rejection_records_no_allocated_lot() {
        let conn = open_memory_database().unwrap();
        let store = SqliteAllocationStore;
        let engine = ResolutionEngine::new(&store, SweepPolicy::MarkExpired);

        let request = seed_request(&conn, &recipient(BloodType::AbNeg, 3, Urgency::Critical, 1));
        let decision = engine.resolve_one(&conn, &request, now()).unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Rejected);
        let stored = db::get_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(stored.allocated_lot_id, None);
    }
}
