//! Multi-peer integration scenarios (spec.md §8, end-to-end 1/2/4/5/6): real
//! `Peer`s wired together over the real `HttpTransport`, each running its own
//! axum server on an OS-assigned port inside its own dedicated Tokio runtime.
//!
//! A peer's "process" is stood in for by its runtime: killing a peer (spec §8
//! scenarios 4 and 5) means shutting that runtime down, which drops its HTTP
//! listener and aborts its election timer, heartbeat loops, and any in-flight
//! RPC tasks all at once — closer to `kill -9` than cancelling one task.
//! Assertions call straight into each surviving `Peer`'s own methods (`get`/
//! `put`/`show_log`), exactly what `src/api`'s handlers do over HTTP.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::time::Duration;

use raftkv::config::{RaftConfig, Roster};
use raftkv::raft::peer::{GetOutcome, WriteOutcome};
use raftkv::raft::Peer;
use raftkv::transport::HttpTransport;
use tokio::runtime::Runtime;
use tokio::time::sleep;

fn fast_config() -> RaftConfig {
    RaftConfig {
        low_timeout_ms: 40,
        high_timeout_ms: 80,
        hb_time_ms: 15,
        max_log_wait_ms: 150,
        requests_timeout_ms: 50,
    }
}

/// One cluster member: the `Peer` core plus the dedicated runtime hosting its
/// HTTP server, election timer, and heartbeat loops.
struct Node {
    peer: Arc<Peer>,
    runtime: Runtime,
}

impl Node {
    /// Stand-in for killing the process: non-blocking shutdown of every task
    /// this peer owns. Also the only safe way to retire a `Runtime` from
    /// inside another runtime's async context (dropping one there panics).
    fn crash(self) {
        self.runtime.shutdown_background();
    }
}

fn shutdown_all(nodes: Vec<Node>) {
    for node in nodes {
        node.crash();
    }
}

/// Spins up `n` real peers, each bound to its own ephemeral `127.0.0.1` port
/// and wired together with the real `HttpTransport` (spec §4.7's HTTP+JSON
/// wire), matching SPEC_FULL.md's promised integration coverage.
fn spawn_cluster(config: RaftConfig, n: usize) -> Vec<Node> {
    let listeners: Vec<StdTcpListener> = (0..n)
        .map(|_| StdTcpListener::bind("127.0.0.1:0").expect("bind ephemeral port"))
        .collect();
    let addrs: Vec<String> = listeners
        .iter()
        .map(|l| format!("http://{}", l.local_addr().expect("local_addr")))
        .collect();

    listeners
        .into_iter()
        .enumerate()
        .map(|(i, listener)| {
            let me = addrs[i].clone();
            let fellows: Vec<String> = addrs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, a)| a.clone())
                .collect();

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("build per-peer runtime");

            let roster = Roster { me, fellows };
            let transport =
                Arc::new(HttpTransport::new(Duration::from_millis(config.requests_timeout_ms)));
            let peer = Peer::new(roster, config, transport);

            let peer_for_server = peer.clone();
            runtime.spawn(async move {
                peer_for_server.spawn_background();
                let app = raftkv::api::router(peer_for_server.clone());
                listener.set_nonblocking(true).expect("nonblocking listener");
                let listener = tokio::net::TcpListener::from_std(listener).expect("adopt std listener");
                axum::serve(listener, app).await.expect("peer server exits cleanly");
            });

            Node { peer, runtime }
        })
        .collect()
}

/// Polls every node's role snapshot until exactly one reports leader, or
/// `timeout` elapses. Mirrors spec §8 scenario 1 ("within 300ms exactly one
/// reports leader") without coupling the test to exact wall-clock timing.
async fn wait_for_leader(nodes: &[Node], timeout: Duration) -> Option<usize> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let mut leaders = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            if node.peer.is_leader().await {
                leaders.push(i);
            }
        }
        if leaders.len() == 1 {
            return Some(leaders[0]);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        sleep(Duration::from_millis(10)).await;
    }
}

/// Spec §8 scenario 1: three peers converge on exactly one leader, and the
/// other two report follower with leader set to the elected peer.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn election_converges_to_single_leader() {
    let nodes = spawn_cluster(fast_config(), 3);
    let leader_idx = wait_for_leader(&nodes, Duration::from_millis(2000))
        .await
        .expect("a leader is elected");

    sleep(Duration::from_millis(60)).await; // let a heartbeat round land on both followers
    let leader_addr = nodes[leader_idx].peer.self_addr.clone();
    for (i, node) in nodes.iter().enumerate() {
        if i == leader_idx {
            continue;
        }
        assert!(!node.peer.is_leader().await);
        assert_eq!(node.peer.current_leader().await.as_deref(), Some(leader_addr.as_str()));
    }

    shutdown_all(nodes);
}

/// Spec §8 scenario 2/3: a PUT on the leader commits and reads back; a GET on
/// a follower redirects to the elected leader's address.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn write_then_read_and_follower_redirect() {
    let nodes = spawn_cluster(fast_config(), 3);
    let leader_idx = wait_for_leader(&nodes, Duration::from_millis(2000))
        .await
        .expect("a leader is elected");
    let leader = &nodes[leader_idx].peer;

    assert!(matches!(
        leader.put("x".into(), "1".into()).await,
        WriteOutcome::Committed
    ));

    match leader.get("x").await {
        GetOutcome::Hit(value) => assert_eq!(value, "1"),
        _ => panic!("expected a hit on the leader"),
    }

    let follower_idx = (leader_idx + 1) % nodes.len();
    let leader_addr = leader.self_addr.clone();
    match nodes[follower_idx].peer.get("x").await {
        GetOutcome::Redirect(Some(addr)) => assert_eq!(addr, leader_addr),
        _ => panic!("expected a redirect to the leader"),
    }

    shutdown_all(nodes);
}

/// Spec §8 scenario 4: killing the leader after a committed write triggers a
/// new election at a higher term, and the new leader already has the
/// committed entry (it was replicated to a majority, including at least one
/// survivor, before the old leader acknowledged the write).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leader_failure_triggers_reelection_and_new_leader_keeps_committed_value() {
    let mut nodes = spawn_cluster(fast_config(), 3);
    let leader_idx = wait_for_leader(&nodes, Duration::from_millis(2000))
        .await
        .expect("a leader is elected");
    let first_term = nodes[leader_idx].peer.role.snapshot().await.term;

    assert!(matches!(
        nodes[leader_idx].peer.put("x".into(), "1".into()).await,
        WriteOutcome::Committed
    ));
    sleep(Duration::from_millis(60)).await; // let the commit heartbeat land on both followers

    nodes.remove(leader_idx).crash();

    let new_leader_idx = wait_for_leader(&nodes, Duration::from_millis(3000))
        .await
        .expect("a new leader is elected after the old one disappears");
    let new_leader = &nodes[new_leader_idx].peer;
    assert!(new_leader.role.snapshot().await.term > first_term);

    match new_leader.get("x").await {
        GetOutcome::Hit(value) => assert_eq!(value, "1"),
        _ => panic!("expected the new leader to already have the committed entry"),
    }

    shutdown_all(nodes);
}

/// Spec §8 scenario 5: with the leader's two fellows both gone, a PUT at the
/// leader fails once `max_log_wait_ms` elapses, and the log is left
/// unchanged (quorum failure never reaches local commit).
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn quorum_loss_fails_writes_without_advancing_the_log() {
    let mut nodes = spawn_cluster(fast_config(), 3);
    let leader_idx = wait_for_leader(&nodes, Duration::from_millis(2000))
        .await
        .expect("a leader is elected");
    let leader = nodes[leader_idx].peer.clone();

    let mut follower_positions: Vec<usize> = (0..nodes.len()).filter(|&i| i != leader_idx).collect();
    follower_positions.sort_unstable_by(|a, b| b.cmp(a)); // remove back-to-front so earlier indices stay valid
    for pos in follower_positions {
        nodes.remove(pos).crash();
    }
    sleep(Duration::from_millis(30)).await;

    let log_len_before = leader.show_log().await.len();
    let outcome = leader.put("x".into(), "1".into()).await;
    assert!(matches!(outcome, WriteOutcome::Failed));
    assert_eq!(leader.show_log().await.len(), log_len_before);

    shutdown_all(nodes);
}

/// Spec §8 scenario 6: a tight, near-identical election-timeout range makes
/// near-simultaneous candidacies likely, but the randomized re-election on
/// timeout (spec §4.3) still converges on exactly one leader within a few
/// cycles.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn split_vote_eventually_resolves_to_one_leader() {
    let config = RaftConfig {
        low_timeout_ms: 20,
        high_timeout_ms: 25,
        hb_time_ms: 10,
        max_log_wait_ms: 150,
        requests_timeout_ms: 50,
    };
    let nodes = spawn_cluster(config, 3);
    let leader_idx = wait_for_leader(&nodes, Duration::from_millis(3000))
        .await
        .expect("exactly one leader eventually emerges despite near-simultaneous elections");
    assert!(nodes[leader_idx].peer.role.snapshot().await.term >= 1);

    shutdown_all(nodes);
}
