//! Allocation core: compatibility, scoring, expiry, lot allocation and the
//! request resolution engine.
//!
//! Everything here talks to storage through [`AllocationStore`] and takes
//! the connection to act on, so callers choose the unit of work.

pub mod allocator;
pub mod background;
pub mod compatibility;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod scoring;
pub mod store;
pub mod traits;
pub mod types;

pub use allocator::Allocator;
pub use compatibility::{compatible_donor_types, is_compatible};
pub use cycle::run_cycle;
pub use engine::{transition_allowed, ResolutionEngine};
pub use error::AllocationError;
pub use expiry::{sweep_expired, SweepPolicy};
pub use scoring::{score, APPROVAL_THRESHOLD};
pub use store::SqliteAllocationStore;
pub use traits::AllocationStore;
pub use types::*;
