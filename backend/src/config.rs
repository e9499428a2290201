//! Runtime configuration.
//!
//! Values come from CLI flags, which fall back to environment variables
//! (a `.env` file is loaded at startup), which fall back to the defaults here.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default record cap when `preview_only` is set.
pub const DEFAULT_PREVIEW_LIMIT: usize = 1000;

/// Accepted range for `preview_limit`.
pub const PREVIEW_LIMIT_RANGE: std::ops::RangeInclusive<usize> = 10..=10_000;

pub const DEFAULT_PORT: u16 = 5000;

/// Options of one ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestOptions {
    /// Cap the published records at `preview_limit`.
    pub preview_only: bool,
    pub preview_limit: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            preview_only: false,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl IngestOptions {
    pub fn preview(limit: usize) -> Self {
        Self {
            preview_only: true,
            preview_limit: limit,
        }
    }

    /// Check `preview_limit` against [`PREVIEW_LIMIT_RANGE`].
    pub fn validate(&self) -> Result<(), String> {
        if PREVIEW_LIMIT_RANGE.contains(&self.preview_limit) {
            Ok(())
        } else {
            Err(format!(
                "preview_limit must be between {} and {}",
                PREVIEW_LIMIT_RANGE.start(),
                PREVIEW_LIMIT_RANGE.end()
            ))
        }
    }

    /// Number of records to publish out of `total`.
    pub fn record_cap(&self, total: usize) -> usize {
        if self.preview_only {
            total.min(self.preview_limit)
        } else {
            total
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
