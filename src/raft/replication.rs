//! Replication coordinator (§4.5): the leader's write path. Stages an
//! entry, fans out a "log" heartbeat, waits for quorum confirmations, then
//! commits locally and fans out a "commit" heartbeat.
//!
//! Confirmation counting uses an `mpsc` channel drained under a single
//! `tokio::time::timeout`, replacing the source's 0.5 ms spin-poll on a
//! shared confirmation vector (REDESIGN FLAGS).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::heartbeat::HeartbeatMsg;
use super::peer::Peer;
use crate::store::Entry;

/// §4.5 steps 1-6. Returns `true` on successful local commit.
pub async fn propose(peer: Arc<Peer>, entry: Entry) -> bool {
    let _gate = peer.write_gate.lock().await;

    peer.role.set_staged(Some(entry.clone())).await;
    let snapshot = peer.role.snapshot().await;
    let term = snapshot.term;
    let commit_idx_before = peer.store.read().await.commit_idx();

    if peer.fellows.is_empty() {
        return finish_commit(&peer, entry, term, commit_idx_before).await;
    }

    let log_msg = HeartbeatMsg {
        term,
        addr: peer.self_addr.clone(),
        action: Some("log".into()),
        payload: Some(entry.clone()),
        commit_idx: Some(commit_idx_before),
    };
    let log_body = serde_json::to_value(&log_msg).expect("HeartbeatMsg always serializes");

    let (tx, mut rx) = mpsc::channel::<()>(peer.fellows.len().max(1));
    for fellow in peer.fellows.clone() {
        let peer = peer.clone();
        let tx = tx.clone();
        let body = log_body.clone();
        tokio::spawn(async move {
            if peer.transport.send(&fellow, "heartbeat", body).await.is_some() {
                let _ = tx.send(()).await;
            }
        });
    }
    drop(tx);

    let majority = peer.majority();
    let mut confirmed = 1; // self
    let deadline = Duration::from_millis(peer.config.max_log_wait_ms);
    let wait = tokio::time::timeout(deadline, async {
        while confirmed < majority {
            match rx.recv().await {
                Some(()) => confirmed += 1,
                None => break, // every fellow task finished without confirming
            }
        }
    })
    .await;

    if wait.is_err() || confirmed < majority {
        warn!(addr = %peer.self_addr, term, "replication rejected: quorum not reached within deadline");
        return false;
    }

    finish_commit(&peer, entry, term, commit_idx_before).await
}

async fn finish_commit(peer: &Arc<Peer>, entry: Entry, term: u64, commit_idx: u64) -> bool {
    peer.role.take_staged().await;
    peer.store.write().await.commit(entry.clone());
    info!(addr = %peer.self_addr, key = %entry.key, term, "committed log entry");

    if !peer.fellows.is_empty() {
        let commit_msg = HeartbeatMsg {
            term,
            addr: peer.self_addr.clone(),
            action: Some("commit".into()),
            payload: Some(entry),
            commit_idx: Some(commit_idx),
        };
        let body = serde_json::to_value(&commit_msg).expect("HeartbeatMsg always serializes");
        for fellow in peer.fellows.clone() {
            let peer = peer.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let _ = peer.transport.send(&fellow, "heartbeat", body).await;
            });
        }
    }

    true
}
