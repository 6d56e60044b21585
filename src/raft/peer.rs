//! Composition root: one `Peer` per process, owning every lock the
//! protocol needs and exposing the operations the HTTP façade calls.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::info;

use crate::config::{RaftConfig, Roster};
use crate::store::{Entry, SharedStore, Store};
use crate::transport::PeerTransport;

use super::election::{self, VoteReply, VoteRequest};
use super::heartbeat::{self, HeartbeatMsg, HeartbeatReply};
use super::replication;
use super::role::{Role, RoleHandle};

pub struct Peer {
    pub self_addr: String,
    pub fellows: Vec<String>,
    pub config: RaftConfig,
    pub role: RoleHandle,
    pub store: SharedStore,
    pub transport: Arc<dyn PeerTransport>,
    pub write_gate: Mutex<()>,
    election_notify: Arc<Notify>,
}

/// Outcome of a client GET (§4.6): a local hit, a local miss, or a redirect
/// to the current leader (possibly unknown mid-election).
pub enum GetOutcome {
    Hit(String),
    Miss,
    Redirect(Option<String>),
}

/// Outcome of a client PUT/DELETE: committed, quorum failure, or redirect.
pub enum WriteOutcome {
    Committed,
    Failed,
    Redirect(Option<String>),
}

impl Peer {
    pub fn new(roster: Roster, config: RaftConfig, transport: Arc<dyn PeerTransport>) -> Arc<Self> {
        Arc::new(Peer {
            self_addr: roster.me,
            fellows: roster.fellows,
            config,
            role: RoleHandle::new(),
            store: SharedStore::new(Store::new()),
            transport,
            write_gate: Mutex::new(()),
            election_notify: Arc::new(Notify::new()),
        })
    }

    /// Spawns the one background activity that runs for the peer's whole
    /// lifetime: the election timer (§4.2).
    pub fn spawn_background(self: &Arc<Self>) {
        let peer = self.clone();
        let notify = self.election_notify.clone();
        tokio::spawn(async move { election::run_timer(peer, notify).await });
    }

    pub fn reset_election_timer(&self) {
        self.election_notify.notify_one();
    }

    pub fn majority(&self) -> usize {
        (self.fellows.len() + 1) / 2 + 1
    }

    /// Spawns the per-fellow leader heartbeat loops (§4.4) for the term the
    /// caller just won.
    pub fn spawn_heartbeats(self: Arc<Self>, term: u64) {
        heartbeat::spawn_heartbeat_loops(self, term);
    }

    pub async fn handle_vote_req(&self, request: VoteRequest) -> VoteReply {
        election::decide_vote(self, request).await
    }

    pub async fn handle_heartbeat(&self, msg: HeartbeatMsg) -> HeartbeatReply {
        heartbeat::on_heartbeat_received(self, msg).await
    }

    /// `POST /leader_down`: unconditional step-down + election-timer restart.
    pub async fn handle_leader_down(&self) {
        let term = self.role.snapshot().await.term;
        self.role.step_down(term).await;
        self.reset_election_timer();
        info!(addr = %self.self_addr, "leader reported stepping down");
    }

    pub async fn is_leader(&self) -> bool {
        self.role.snapshot().await.role == Role::Leader
    }

    pub async fn current_leader(&self) -> Option<String> {
        self.role.snapshot().await.leader
    }

    /// §4.6 GET.
    pub async fn get(&self, key: &str) -> GetOutcome {
        let state = self.role.snapshot().await;
        if state.role != Role::Leader {
            return GetOutcome::Redirect(state.leader);
        }
        match self.store.read().await.get(key) {
            Some(value) => GetOutcome::Hit(value),
            None => GetOutcome::Miss,
        }
    }

    /// §4.6 DELETE: bypasses the replicated log (known divergence, §9).
    pub async fn delete(&self, key: &str) -> WriteOutcome {
        let state = self.role.snapshot().await;
        if state.role != Role::Leader {
            return WriteOutcome::Redirect(state.leader);
        }
        if self.store.write().await.delete_local(key) {
            WriteOutcome::Committed
        } else {
            WriteOutcome::Failed
        }
    }

    /// §4.5 PUT, via the replication coordinator.
    pub async fn put(self: &Arc<Self>, key: String, value: String) -> WriteOutcome {
        let state = self.role.snapshot().await;
        if state.role != Role::Leader {
            return WriteOutcome::Redirect(state.leader);
        }
        let committed = replication::propose(self.clone(), Entry { key, value }).await;
        if committed {
            WriteOutcome::Committed
        } else {
            WriteOutcome::Failed
        }
    }

    pub async fn show_log(&self) -> Vec<Entry> {
        self.store.read().await.log().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::loopback::LoopbackTransport;

    fn test_roster() -> Roster {
        Roster { me: "http://127.0.0.1:5000".into(), fellows: vec!["http://127.0.0.1:5001".into()] }
    }

    #[tokio::test]
    async fn new_peer_starts_as_follower_with_empty_store() {
        let peer = Peer::new(test_roster(), RaftConfig::default(), Arc::new(LoopbackTransport::new()));
        assert!(!peer.is_leader().await);
        assert!(peer.current_leader().await.is_none());
        assert!(peer.show_log().await.is_empty());
    }

    #[tokio::test]
    async fn get_on_follower_redirects() {
        let peer = Peer::new(test_roster(), RaftConfig::default(), Arc::new(LoopbackTransport::new()));
        match peer.get("x").await {
            GetOutcome::Redirect(None) => {}
            _ => panic!("expected redirect with no known leader"),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips_on_leader() {
        let roster = Roster { me: "solo".into(), fellows: vec![] };
        let peer = Peer::new(roster, RaftConfig::default(), Arc::new(LoopbackTransport::new()));
        peer.role.start_election().await;
        peer.role.increment_vote(1, peer.majority(), "solo").await;

        let outcome = peer.put("x".into(), "1".into()).await;
        assert!(matches!(outcome, WriteOutcome::Committed));

        match peer.get("x").await {
            GetOutcome::Hit(value) => assert_eq!(value, "1"),
            _ => panic!("expected hit"),
        }
    }

    #[tokio::test]
    async fn delete_then_get_misses() {
        let roster = Roster { me: "solo".into(), fellows: vec![] };
        let peer = Peer::new(roster, RaftConfig::default(), Arc::new(LoopbackTransport::new()));
        peer.role.start_election().await;
        peer.role.increment_vote(1, peer.majority(), "solo").await;
        peer.put("x".into(), "1".into()).await;

        let outcome = peer.delete("x").await;
        assert!(matches!(outcome, WriteOutcome::Committed));
        assert!(matches!(peer.get("x").await, GetOutcome::Miss));
    }
}
