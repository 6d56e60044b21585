//! Election timer (§4.2) and election protocol (§4.3).

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::peer::Peer;
use super::role::Role;
use crate::store::Entry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub term: u64,
    #[serde(rename = "commitIdx")]
    pub commit_idx: u64,
    pub staged: Option<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReply {
    pub choice: bool,
    pub term: u64,
}

/// Uniform draw from `[low, high)` ms. `RaftConfig::load` already swaps an
/// inverted range, so by the time this runs low <= high always holds; the
/// degenerate `low == high` case still needs a non-panicking fallback.
pub fn random_timeout(low_ms: u64, high_ms: u64) -> Duration {
    if low_ms >= high_ms {
        return Duration::from_millis(low_ms);
    }
    let millis = rand::thread_rng().gen_range(low_ms..high_ms);
    Duration::from_millis(millis)
}

/// Background activity: sleeps out a randomized timeout, racing a reset
/// notification. On expiry while not leader, starts a new election. Exactly
/// one of these runs per peer for its whole lifetime; it simply no-ops while
/// leader rather than being torn down and rebuilt.
pub async fn run_timer(peer: Arc<Peer>, notify: Arc<Notify>) {
    loop {
        let (low, high) = (peer.config.low_timeout_ms, peer.config.high_timeout_ms);
        let timeout = random_timeout(low, high);
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                let role = peer.role.snapshot().await.role;
                if role != Role::Leader {
                    info!(addr = %peer.self_addr, "election timer expired, starting election");
                    start_election(peer.clone()).await;
                }
            }
            _ = notify.notified() => {
                debug!(addr = %peer.self_addr, "election timer reset");
            }
        }
    }
}

/// §4.3: set role <- candidate, term += 1, tally <- 1, leader <- none, reset
/// the timer, recompute majority, fan out a vote request to every fellow.
pub async fn start_election(peer: Arc<Peer>) {
    let (_, term) = peer.role.start_election().await;
    peer.reset_election_timer();
    warn!(addr = %peer.self_addr, term, "starting election");

    if peer.fellows.is_empty() {
        // Single-node cluster: majority is 1, the self-vote already counts.
        peer.role.increment_vote(term, peer.majority(), &peer.self_addr).await;
        return;
    }

    let store = peer.store.read().await;
    let commit_idx = store.commit_idx();
    let role = peer.role.snapshot().await;
    drop(store);

    for fellow in peer.fellows.clone() {
        let peer = peer.clone();
        let staged = role.staged.clone();
        tokio::spawn(async move {
            ask_for_vote(peer, fellow, term, commit_idx, staged).await;
        });
    }
}

/// Requests a vote from `fellow`, retrying while still candidate in `term`
/// (spec.md §4.3: "the sender loops until a reply arrives or the candidate
/// steps out of the term").
async fn ask_for_vote(peer: Arc<Peer>, fellow: String, term: u64, commit_idx: u64, staged: Option<Entry>) {
    let request = VoteRequest { term, commit_idx, staged };
    let body = serde_json::to_value(&request).expect("VoteRequest always serializes");

    loop {
        let snapshot = peer.role.snapshot().await;
        if snapshot.role != Role::Candidate || snapshot.term != term {
            return;
        }

        match peer.transport.send(&fellow, "vote_req", body.clone()).await {
            Some(raw) => {
                let Ok(reply) = serde_json::from_value::<VoteReply>(raw) else {
                    return;
                };
                if reply.choice {
                    if peer
                        .role
                        .increment_vote(term, peer.majority(), &peer.self_addr)
                        .await
                    {
                        info!(addr = %peer.self_addr, term, "elected leader");
                        peer.clone().spawn_heartbeats(term);
                    }
                } else if reply.term > term {
                    peer.role.observe_term(reply.term).await;
                }
                return;
            }
            None => {
                debug!(addr = %peer.self_addr, %fellow, term, "no reply to vote_req");
            }
        }
    }
}

/// Vote-grant predicate (§4.3), evaluated under the role lock so a grant and
/// a concurrent step-down can't interleave.
pub async fn decide_vote(peer: &Peer, request: VoteRequest) -> VoteReply {
    let commit_idx = peer.store.read().await.commit_idx();
    let commit_idx_ok = commit_idx <= request.commit_idx;
    let (granted, reply_term) = peer
        .role
        .grant_vote(request.term, commit_idx_ok, &request.staged)
        .await;

    if granted {
        peer.reset_election_timer();
        info!(addr = %peer.self_addr, term = request.term, "granting vote");
    } else {
        debug!(addr = %peer.self_addr, term = request.term, current = reply_term, "denying vote");
    }

    VoteReply { choice: granted, term: reply_term }
}
