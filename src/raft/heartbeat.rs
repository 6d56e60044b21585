//! Heartbeat engine (§4.4): the leader's per-fellow liveness pings, and the
//! follower/candidate side that processes them and applies the "log"/
//! "commit" directives they carry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::peer::Peer;
use super::role::Role;
use crate::store::Entry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatMsg {
    pub term: u64,
    pub addr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Entry>,
    #[serde(rename = "commitIdx", skip_serializing_if = "Option::is_none")]
    pub commit_idx: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatReply {
    pub term: u64,
    #[serde(rename = "commitIdx")]
    pub commit_idx: u64,
}

/// Spawns one independent heartbeat loop per fellow, captured at the moment
/// the peer becomes leader for `term`. Each loop stops as soon as a fresh
/// role snapshot reports a different `(role, term)`.
pub fn spawn_heartbeat_loops(peer: Arc<Peer>, term: u64) {
    for fellow in peer.fellows.clone() {
        let peer = peer.clone();
        tokio::spawn(async move { heartbeat_loop(peer, fellow, term).await });
    }
}

async fn heartbeat_loop(peer: Arc<Peer>, fellow: String, term: u64) {
    let hb_time = Duration::from_millis(peer.config.hb_time_ms);
    loop {
        let snapshot = peer.role.snapshot().await;
        if snapshot.role != Role::Leader || snapshot.term != term {
            return;
        }

        let started = Instant::now();
        let msg = HeartbeatMsg {
            term,
            addr: peer.self_addr.clone(),
            action: None,
            payload: None,
            commit_idx: None,
        };
        let body = serde_json::to_value(&msg).expect("HeartbeatMsg always serializes");

        match peer.transport.send(&fellow, "heartbeat", body).await {
            Some(raw) => {
                if let Ok(reply) = serde_json::from_value::<HeartbeatReply>(raw) {
                    debug!(addr = %peer.self_addr, %fellow, "heartbeat acknowledged");
                    if reply.term > term {
                        warn!(addr = %peer.self_addr, their_term = reply.term, "stepping down after heartbeat reply");
                        peer.role.observe_term(reply.term).await;
                    }
                }
            }
            None => {
                debug!(addr = %peer.self_addr, %fellow, "no reply to heartbeat");
            }
        }

        let elapsed = started.elapsed();
        if elapsed < hb_time {
            tokio::time::sleep(hb_time - elapsed).await;
        }
    }
}

/// Follower/candidate side of §4.4: process an incoming heartbeat and reply
/// with `{term, commitIdx}`.
pub async fn on_heartbeat_received(peer: &Peer, msg: HeartbeatMsg) -> HeartbeatReply {
    let current = peer.role.snapshot().await;
    if msg.term < current.term {
        return HeartbeatReply { term: current.term, commit_idx: peer.store.read().await.commit_idx() };
    }

    peer.role.adopt_leader(msg.term, &msg.addr).await;
    peer.reset_election_timer();
    info!(addr = %peer.self_addr, leader = %msg.addr, term = msg.term, "heartbeat from leader");

    match msg.action.as_deref() {
        Some("log") => {
            if let Some(payload) = msg.payload {
                peer.role.set_staged(Some(payload)).await;
            }
        }
        _ => {
            let local_commit_idx = peer.store.read().await.commit_idx();
            if let Some(leader_commit_idx) = msg.commit_idx {
                if local_commit_idx <= leader_commit_idx {
                    let staged = peer.role.take_staged().await;
                    let entry = match staged {
                        Some(entry) => Some(entry),
                        None => msg.payload,
                    };
                    if let Some(entry) = entry {
                        peer.store.write().await.commit(entry);
                    }
                }
            }
        }
    }

    let term = peer.role.snapshot().await.term;
    let commit_idx = peer.store.read().await.commit_idx();
    HeartbeatReply { term, commit_idx }
}
