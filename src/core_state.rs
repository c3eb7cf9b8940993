//! Process-wide application state shared by the HTTP layer and the
//! background scheduler.
//!
//! Holds the single SQLite connection behind a mutex, so every allocation
//! decision is serialized, plus the run guard that keeps batch cycles from
//! overlapping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::config::ServerConfig;
use crate::db;
use crate::matching::{
    self, AllocationError, AllocationStore, CycleReport, ResolutionEngine, SqliteAllocationStore,
    SweepPolicy,
};

pub struct CoreState {
    db: Mutex<Connection>,
    store: SqliteAllocationStore,
    sweep_policy: SweepPolicy,
    /// Set while a sync + batch cycle is in flight.
    processing: AtomicBool,
    started_at: Instant,
}

impl CoreState {
    pub fn new(conn: Connection, sweep_policy: SweepPolicy) -> Self {
        Self {
            db: Mutex::new(conn),
            store: SqliteAllocationStore,
            sweep_policy,
            processing: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    /// Open (and migrate) the database named by the config.
    pub fn open(config: &ServerConfig) -> Result<Self, CoreError> {
        let conn = db::open_database(&config.db_path)?;
        tracing::info!(path = %config.db_path.display(), "Database opened");
        Ok(Self::new(conn, config.sweep_policy))
    }

    pub fn in_memory() -> Result<Self, CoreError> {
        Ok(Self::new(db::open_memory_database()?, SweepPolicy::default()))
    }

    /// Exclusive access to the connection. Hold it for the whole unit of work.
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn store(&self) -> &dyn AllocationStore {
        &self.store
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        self.sweep_policy
    }

    pub fn engine(&self) -> ResolutionEngine<'_> {
        ResolutionEngine::new(&self.store, self.sweep_policy)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Claim the processing slot. Fails if another cycle holds it.
    pub fn try_begin_run(&self) -> Result<RunGuard<'_>, CoreError> {
        self.processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::RunInProgress)?;
        Ok(RunGuard { flag: &self.processing })
    }

    /// Sync pending recipients into requests, then resolve all pending
    /// requests. Skipped with `RunInProgress` when a cycle is already running.
    pub fn run_processing_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, CoreError> {
        let _run = self.try_begin_run()?;
        let conn = self.lock_db()?;
        Ok(matching::run_cycle(&self.engine(), &conn, now)?)
    }
}

/// Releases the processing slot on drop.
pub struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("A processing run is already in progress")]
    RunInProgress,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{BloodType, RequestStatus, Urgency};
    use crate::models::Recipient;
    use uuid::Uuid;

    fn pending_recipient() -> Recipient {
        let now = Utc::now();
        Recipient {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            age: 30,
            blood_type: BloodType::OPos,
            phone: "5551234567".into(),
            hospital: "North Clinic".into(),
            units_required: 1,
            urgency: Urgency::Medium,
            status: RequestStatus::Pending,
            processed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn run_guard_is_exclusive_and_released() {
        let state = CoreState::in_memory().unwrap();
        let guard = state.try_begin_run().unwrap();
        assert!(state.is_processing());
        assert!(matches!(state.try_begin_run(), Err(CoreError::RunInProgress)));
        drop(guard);
        assert!(!state.is_processing());
        assert!(state.try_begin_run().is_ok());
    }

    #[test]
    fn cycle_is_skipped_while_another_runs() {
        let state = CoreState::in_memory().unwrap();
        let _held = state.try_begin_run().unwrap();
        let err = state.run_processing_cycle(Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::RunInProgress));
    }

    #[test]
    fn cycle_syncs_and_resolves() {
        let state = CoreState::in_memory().unwrap();
        let recipient = pending_recipient();
        {
            let conn = state.lock_db().unwrap();
            db::insert_recipient(&conn, &recipient).unwrap();
        }

        let report = state.run_processing_cycle(Utc::now()).unwrap();
        assert_eq!(report.sync.created.len(), 1);
        assert_eq!(report.batch.decisions.len(), 1);
        assert!(!state.is_processing());

        let conn = state.lock_db().unwrap();
        let stored = db::get_recipient(&conn, &recipient.id).unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Rejected);
    }

    #[test]
    fn open_creates_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            db_path: dir.path().join("nested").join("bb.db"),
            ..ServerConfig::default()
        };
        let state = CoreState::open(&config).unwrap();
        assert!(db::ping(&state.lock_db().unwrap()));
        assert!(config.db_path.exists());
    }
}
