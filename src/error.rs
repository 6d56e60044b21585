//! Errors raised by the ambient stack (config/roster loading). Protocol-level
//! outcomes (quorum failure, key miss, bad client message — spec.md §7) are
//! not modeled as `Err`s; they are encoded directly in JSON reply bodies by
//! `src/api`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RaftError {
    #[error("failed to read roster file {path}: {source}")]
    RosterRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("roster index {index} out of range for {count} peers")]
    RosterIndexOutOfRange { index: usize, count: usize },

    #[error("roster file is empty")]
    RosterEmpty,

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
