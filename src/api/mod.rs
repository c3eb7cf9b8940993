//! HTTP API.
//!
//! JSON over axum. `/health` at the root, resources under `/api/`,
//! rate limited per client. Handlers call into `matching` and `db`
//! through the shared `CoreState`.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer, StartupError};
pub use types::ApiContext;
