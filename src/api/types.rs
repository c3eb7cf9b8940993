//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::core_state::CoreState;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    /// Rate-limit on the forwarded client address rather than the peer.
    pub trust_proxy: bool,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>, rate_limiter: RateLimiter, trust_proxy: bool) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
            trust_proxy,
        }
    }

    /// Run database work on the blocking pool. A processing run holds the
    /// connection for its whole batch, so waiting must not tie up an async
    /// worker.
    pub async fn with_db<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&CoreState, &Connection) -> Result<T, ApiError> + Send + 'static,
    {
        let core = self.core.clone();
        tokio::task::spawn_blocking(move || {
            let conn = core.lock_db()?;
            work(&core, &conn)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("database task failed: {e}")))?
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter: at most `limit` requests in any `window`.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            limit,
            window,
        }
    }

    /// Record a request for `key`. Returns `Err(retry_after_secs)` if over
    /// the limit; rejected requests are not recorded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        let window = self.window;
        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.duration_since(*ts) < window);

        if entries.len() as u32 >= self.limit {
            let retry_after = entries
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)).as_secs().max(1))
                .unwrap_or(1);
            return Err(retry_after);
        }

        entries.push(now);

        if self.windows.len() > 10_000 {
            self.windows
                .retain(|_, v| v.last().is_some_and(|ts| now.duration_since(*ts) < window));
        }
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            crate::config::DEFAULT_RATE_LIMIT,
            Duration::from_secs(crate::config::RATE_LIMIT_WINDOW_SECS),
        )
    }
}
