//! API endpoint handlers, one module per resource.

pub mod donors;
pub mod health;
pub mod inventory;
pub mod processing;
pub mod recipients;
pub mod requests;
pub mod stats;
