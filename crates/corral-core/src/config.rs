//! Substrate configuration.
//!
//! All durations are configurable: the source material has no canonical
//! heartbeat or TTL values, so nothing here is hard-coded beyond explicit
//! defaults. Lease duration must exceed the worst-case board
//! read-modify-write latency, since leases are not renewed mid-operation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CorralError, Result};

fn default_data_dir() -> PathBuf {
    PathBuf::from(".corral")
}

fn default_lease_duration_secs() -> u64 {
    30
}

fn default_lock_timeout_secs() -> u64 {
    10
}

fn default_heartbeat_ttl_secs() -> u64 {
    120
}

fn default_heartbeat_interval_secs() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Configuration shared by workers, the reclaimer, and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorralConfig {
    /// Root directory holding boards, locks, the liveness registry, and
    /// mailboxes.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// How long an acquired lease stays valid before any process may
    /// take the lock over.
    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: u64,

    /// Budget for acquiring a lease lock before `LockTimeout`.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// A worker whose last heartbeat is older than this is considered gone
    /// and its tasks are requeued.
    #[serde(default = "default_heartbeat_ttl_secs")]
    pub heartbeat_ttl_secs: u64,

    /// Cadence on which workers are expected to heartbeat.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Cadence of the reclaimer's sweep loop.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CorralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lease_duration_secs: default_lease_duration_secs(),
            lock_timeout_secs: default_lock_timeout_secs(),
            heartbeat_ttl_secs: default_heartbeat_ttl_secs(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CorralConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorralError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| CorralError::Serialization {
            format: "TOML".to_string(),
            message: e.to_string(),
        })
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_duration_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn heartbeat_ttl(&self) -> Duration {
        Duration::from_secs(self.heartbeat_ttl_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
