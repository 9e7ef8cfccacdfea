//! Streaming pipeline configuration
//!
//! Defaults are chosen for desktop browsers; mobile clients get a
//! smaller reassembly bound to keep memory use and render latency down.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default reassembly bound for desktop clients (1 MiB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Default reassembly bound for mobile clients (512 KiB)
pub const MOBILE_MAX_BUFFER_SIZE: usize = 512 * 1024;

/// Default session deadline (~7.5 minutes)
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 450;

/// Client device profile, used to pick the reassembly bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientProfile {
    /// Desktop browser (default)
    #[default]
    Desktop,
    /// Mobile browser, constrained memory
    Mobile,
}

/// Configuration for one streaming session's pipeline
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Reassembly buffer bound for desktop clients, in bytes
    pub max_buffer_size: usize,

    /// Reassembly buffer bound for mobile clients, in bytes
    pub mobile_buffer_size: usize,

    /// Hard deadline for a session; past it the stream is force-closed
    pub session_timeout: Duration,

    /// Capacity of the outbound event channel
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            mobile_buffer_size: MOBILE_MAX_BUFFER_SIZE,
            session_timeout: Duration::from_secs(DEFAULT_SESSION_TIMEOUT_SECS),
            channel_capacity: 64,
        }
    }
}

impl StreamConfig {
    /// Build config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_buffer_size: env_usize("STREAM_MAX_BUFFER_BYTES", defaults.max_buffer_size),
            mobile_buffer_size: env_usize(
                "STREAM_MOBILE_BUFFER_BYTES",
                defaults.mobile_buffer_size,
            ),
            session_timeout: Duration::from_secs(env_u64(
                "STREAM_SESSION_TIMEOUT_SECS",
                DEFAULT_SESSION_TIMEOUT_SECS,
            )),
            channel_capacity: env_usize("STREAM_CHANNEL_CAPACITY", defaults.channel_capacity),
        }
    }

    /// Reassembly bound for the given client profile
    pub fn buffer_size_for(&self, profile: ClientProfile) -> usize {
        match profile {
            ClientProfile::Desktop => self.max_buffer_size,
            ClientProfile::Mobile => self.mobile_buffer_size,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(default)
}
