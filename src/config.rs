use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::matching::SweepPolicy;

/// Application-level constants
pub const APP_NAME: &str = "BloodBank";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 3000;

/// Automatic processing runs every 30 minutes.
pub const DEFAULT_PROCESS_INTERVAL_SECS: u64 = 30 * 60;

/// First run fires shortly after startup so pending work is not left waiting.
pub const STARTUP_DELAY_SECS: u64 = 5;

/// 100 requests per client per 15 minutes on `/api`.
pub const DEFAULT_RATE_LIMIT: u32 = 100;
pub const RATE_LIMIT_WINDOW_SECS: u64 = 15 * 60;

/// Get the application data directory.
/// ~/BloodBank/ on all platforms, falling back to the working directory
/// when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join("bloodbank.db")
}

/// Used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "bloodbank_lib=info,bloodbank=info,tower_http=info"
}

/// Runtime settings for the HTTP service and the processing scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub process_interval: Duration,
    pub startup_delay: Duration,
    pub rate_limit: u32,
    pub rate_window: Duration,
    pub sweep_policy: SweepPolicy,
    /// Key rate limits on `X-Forwarded-For` instead of the peer address.
    /// Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            db_path: default_db_path(),
            cors_origins: Vec::new(),
            process_interval: Duration::from_secs(DEFAULT_PROCESS_INTERVAL_SECS),
            startup_delay: Duration::from_secs(STARTUP_DELAY_SECS),
            rate_limit: DEFAULT_RATE_LIMIT,
            rate_window: Duration::from_secs(RATE_LIMIT_WINDOW_SECS),
            sweep_policy: SweepPolicy::MarkExpired,
            trust_proxy: false,
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("BLOODBANK_ADDR") {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => config.addr = addr,
                Err(_) => tracing::warn!(value = %raw, "Invalid BLOODBANK_ADDR, using default"),
            }
        } else if let Some(raw) = lookup("PORT") {
            match raw.parse::<u16>() {
                Ok(port) => config.addr.set_port(port),
                Err(_) => tracing::warn!(value = %raw, "Invalid PORT, using {DEFAULT_PORT}"),
            }
        }

        if let Some(raw) = lookup("BLOODBANK_DB") {
            if !raw.trim().is_empty() {
                config.db_path = PathBuf::from(raw.trim());
            }
        }

        if let Some(raw) = lookup("BLOODBANK_CORS_ORIGINS") {
            config.cors_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(raw) = lookup("BLOODBANK_PROCESS_INTERVAL_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.process_interval = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "Invalid BLOODBANK_PROCESS_INTERVAL_SECS, using default"),
            }
        }

        if let Some(raw) = lookup("BLOODBANK_RATE_LIMIT") {
            match raw.parse::<u32>() {
                Ok(limit) if limit > 0 => config.rate_limit = limit,
                _ => tracing::warn!(value = %raw, "Invalid BLOODBANK_RATE_LIMIT, using default"),
            }
        }

        if let Some(raw) = lookup("BLOODBANK_REMOVE_EXPIRED") {
            if matches!(raw.trim(), "1" | "true" | "yes") {
                config.sweep_policy = SweepPolicy::Remove;
            }
        }

        if let Some(raw) = lookup("BLOODBANK_TRUST_PROXY") {
            config.trust_proxy = matches!(raw.trim(), "1" | "true" | "yes");
        }

        config
    }
}
