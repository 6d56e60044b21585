//! The committed log and its key/value projection.
//!
//! Kept deliberately separate from [`crate::raft::role::RoleState`] so that a
//! `GET` can take the map lock without contending with election or heartbeat
//! traffic on the role lock (see SPEC_FULL.md §6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A single committed mutation. The wire format is exactly `{key, value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: String,
}

/// The committed log plus its last-writer-wins key/value projection.
///
/// `commit_idx` always equals `log.len()` (spec.md §3 invariant); the two are
/// kept next to each other so `commit()` can't update one without the other.
#[derive(Default)]
pub struct Store {
    log: Vec<Entry>,
    map: HashMap<String, String>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit_idx(&self) -> u64 {
        self.log.len() as u64
    }

    pub fn log(&self) -> &[Entry] {
        &self.log
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    /// Removes `key` directly from the map without touching the log. This is
    /// the DELETE-bypasses-replication divergence documented in spec.md §9;
    /// it is not a bug to be fixed here.
    pub fn delete_local(&mut self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    /// Appends `entry` to the log and applies it to the map. The caller is
    /// responsible for clearing the staged slot (role.rs owns that lock).
    pub fn commit(&mut self, entry: Entry) {
        self.map.insert(entry.key.clone(), entry.value.clone());
        self.log.push(entry);
    }
}

pub type SharedStore = RwLock<Store>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_advances_idx_and_map_together() {
        let mut store = Store::new();
        assert_eq!(store.commit_idx(), 0);
        store.commit(Entry { key: "x".into(), value: "1".into() });
        assert_eq!(store.commit_idx(), 1);
        assert_eq!(store.get("x"), Some("1".into()));
        assert_eq!(store.log().len(), 1);
    }

    #[test]
    fn last_writer_wins_on_same_key() {
        let mut store = Store::new();
        store.commit(Entry { key: "x".into(), value: "1".into() });
        store.commit(Entry { key: "x".into(), value: "2".into() });
        assert_eq!(store.get("x"), Some("2".into()));
        assert_eq!(store.commit_idx(), 2);
        assert_eq!(store.log().len(), 2);
    }

    #[test]
    fn delete_local_does_not_touch_log() {
        let mut store = Store::new();
        store.commit(Entry { key: "x".into(), value: "1".into() });
        assert!(store.delete_local("x"));
        assert_eq!(store.get("x"), None);
        assert_eq!(store.commit_idx(), 1); // log untouched
        assert_eq!(store.log().len(), 1);
    }

    #[test]
    fn delete_local_missing_key_returns_false() {
        let mut store = Store::new();
        assert!(!store.delete_local("missing"));
    }
}
