//! API middleware.

pub mod rate;
