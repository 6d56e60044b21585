//! Role state machine (§4.1): role, current term, current leader address,
//! staged entry, and vote tally, all behind one lock so that a step-down
//! can never interleave with a vote-tally update from a stale term.
//!
//! Segregated from the committed log/map (see [`crate::store`]) per
//! SPEC_FULL.md §6, so a `GET` never contends with election or heartbeat
//! traffic.

use tokio::sync::Mutex;

use crate::store::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

#[derive(Debug, Clone)]
pub struct RoleState {
    pub role: Role,
    pub term: u64,
    pub leader: Option<String>,
    pub vote_count: usize,
    pub staged: Option<Entry>,
}

impl Default for RoleState {
    fn default() -> Self {
        RoleState {
            role: Role::Follower,
            term: 0,
            leader: None,
            vote_count: 0,
            staged: None,
        }
    }
}

/// Owns the role lock. Every transition below takes it for the duration of
/// one logically atomic operation, so a step-down can never interleave with
/// a vote-tally update from a stale term.
///
/// Background loops (election timer, heartbeat senders, vote-request
/// senders) stop themselves by re-reading [`snapshot`](Self::snapshot) each
/// iteration and comparing `(role, term)` against the value they captured
/// when they started — the `while role == X && term == T` re-check from the
/// source, carried over as-is (see SPEC_FULL.md REDESIGN FLAGS discussion).
pub struct RoleHandle {
    state: Mutex<RoleState>,
}

impl Default for RoleHandle {
    fn default() -> Self {
        RoleHandle {
            state: Mutex::new(RoleState::default()),
        }
    }
}

impl RoleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> RoleState {
        self.state.lock().await.clone()
    }

    /// observe-term(t): if t > currentTerm, step down and adopt t.
    /// Returns true if a step-down occurred.
    pub async fn observe_term(&self, t: u64) -> bool {
        let mut state = self.state.lock().await;
        if t > state.term {
            state.term = t;
            state.role = Role::Follower;
            state.leader = None;
            true
        } else {
            false
        }
    }

    /// step-down(t): as observe-term but unconditional on role (used when a
    /// heartbeat/leader_down forces a follower transition even within the
    /// same term).
    pub async fn step_down(&self, t: u64) {
        let mut state = self.state.lock().await;
        state.term = state.term.max(t);
        state.role = Role::Follower;
    }

    /// Begins a new election: role -> candidate, term += 1, self-vote,
    /// leader cleared. Returns the resulting `(role, term)`.
    pub async fn start_election(&self) -> (Role, u64) {
        let mut state = self.state.lock().await;
        state.term += 1;
        state.role = Role::Candidate;
        state.vote_count = 1;
        state.leader = None;
        (state.role, state.term)
    }

    /// increment-vote: bump tally; if it reaches majority while still
    /// candidate in the counted term, transition to leader. Returns `true`
    /// when the transition happens in this call.
    pub async fn increment_vote(&self, term: u64, majority: usize, self_addr: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.role != Role::Candidate || state.term != term {
            return false;
        }
        state.vote_count += 1;
        let became_leader = state.vote_count >= majority;
        if became_leader {
            state.role = Role::Leader;
            state.leader = Some(self_addr.to_string());
        }
        became_leader
    }

    /// Adopts `addr` as the current leader, resetting to follower if the
    /// caller was candidate or a stale leader (§4.4).
    pub async fn adopt_leader(&self, term: u64, addr: &str) {
        let mut state = self.state.lock().await;
        if state.role != Role::Follower {
            state.role = Role::Follower;
        }
        if term > state.term {
            state.term = term;
        }
        state.leader = Some(addr.to_string());
    }

    /// Vote-grant predicate (§4.3), evaluated and applied atomically under
    /// the role lock. `commit_idx_ok` is `self.commitIdx <= request.commitIdx`,
    /// computed by the caller against the store lock before this call.
    pub async fn grant_vote(&self, term: u64, commit_idx_ok: bool, staged: &Option<Entry>) -> (bool, u64) {
        let mut state = self.state.lock().await;
        let grant = state.term < term && commit_idx_ok && (staged.is_some() || state.staged == *staged);
        if grant {
            state.term = term;
        }
        (grant, state.term)
    }

    pub async fn set_staged(&self, entry: Option<Entry>) {
        let mut state = self.state.lock().await;
        state.staged = entry;
    }

    pub async fn take_staged(&self) -> Option<Entry> {
        let mut state = self.state.lock().await;
        state.staged.take()
    }
}
