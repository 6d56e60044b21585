//! Timing configuration and cluster membership (§6).
//!
//! The five parameters below are all the tuning knobs the protocol has; a
//! [`RaftConfig`] is loaded once at process start and handed to every
//! component that needs a timeout or a sleep duration.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::RaftError;

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RaftConfig {
    /// Lower bound of the randomized election-timeout range, ms.
    pub low_timeout_ms: u64,
    /// Upper bound of the randomized election-timeout range, ms. Swapped with
    /// `low_timeout_ms` at load time if it turns out to be the smaller one
    /// (spec.md §6/§8: "with LOW_TIMEOUT > HIGH_TIMEOUT, the range is swapped").
    pub high_timeout_ms: u64,
    /// Leader heartbeat period, ms.
    pub hb_time_ms: u64,
    /// Replication confirmation deadline, ms.
    pub max_log_wait_ms: u64,
    /// Per-RPC hard timeout, ms.
    pub requests_timeout_ms: u64,
}

impl Default for RaftConfig {
    fn default() -> Self {
        RaftConfig {
            low_timeout_ms: 150,
            high_timeout_ms: 300,
            hb_time_ms: 50,
            max_log_wait_ms: 500,
            requests_timeout_ms: 100,
        }
    }
}

impl RaftConfig {
    /// Loads an optional TOML file, then layers `RAFT_*` environment
    /// variable overrides on top of it (or on top of the defaults, if no
    /// file was given).
    pub fn load(path: Option<&Path>) -> Result<Self, RaftError> {
        let mut cfg = match path {
            Some(path) => {
                let contents =
                    std::fs::read_to_string(path).map_err(|source| RaftError::ConfigRead {
                        path: path.display().to_string(),
                        source,
                    })?;
                toml::from_str(&contents).map_err(|source| RaftError::ConfigParse {
                    path: path.display().to_string(),
                    source,
                })?
            }
            None => RaftConfig::default(),
        };

        cfg.apply_env_overrides();
        if cfg.low_timeout_ms > cfg.high_timeout_ms {
            tracing::warn!(
                low = cfg.low_timeout_ms,
                high = cfg.high_timeout_ms,
                "low_timeout_ms > high_timeout_ms, swapping"
            );
            std::mem::swap(&mut cfg.low_timeout_ms, &mut cfg.high_timeout_ms);
        }
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        Self::override_from_env("RAFT_LOW_TIMEOUT_MS", &mut self.low_timeout_ms);
        Self::override_from_env("RAFT_HIGH_TIMEOUT_MS", &mut self.high_timeout_ms);
        Self::override_from_env("RAFT_HB_TIME_MS", &mut self.hb_time_ms);
        Self::override_from_env("RAFT_MAX_LOG_WAIT_MS", &mut self.max_log_wait_ms);
        Self::override_from_env("RAFT_REQUESTS_TIMEOUT_MS", &mut self.requests_timeout_ms);
    }

    fn override_from_env(key: &str, slot: &mut u64) {
        if let Ok(value) = env::var(key) {
            match value.parse() {
                Ok(parsed) => *slot = parsed,
                Err(_) => tracing::warn!(key, value, "ignoring unparsable env override"),
            }
        }
    }
}

/// Cluster membership: the local peer's own address plus every other
/// (`fellow`) peer, loaded from an ordered `scheme:host:port`-per-line file
/// (spec.md §6).
#[derive(Debug, Clone)]
pub struct Roster {
    pub me: String,
    pub fellows: Vec<String>,
}

impl Roster {
    pub fn load(path: &Path, index: usize) -> Result<Self, RaftError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RaftError::RosterRead {
            path: path.display().to_string(),
            source,
        })?;
        let mut peers: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if peers.is_empty() {
            return Err(RaftError::RosterEmpty);
        }
        if index >= peers.len() {
            return Err(RaftError::RosterIndexOutOfRange {
                index,
                count: peers.len(),
            });
        }

        let me = peers.remove(index);
        Ok(Roster { me, fellows: peers })
    }

    /// ⌊N/2⌋+1 where N = fellows + self (spec.md §3).
    pub fn majority(&self) -> usize {
        (self.fellows.len() + 1) / 2 + 1
    }
}
