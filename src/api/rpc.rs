//! Peer RPC façade (§6): `/vote_req`, `/heartbeat`, `/leader_down`. Thin
//! handlers — deserialize, delegate to [`crate::raft::Peer`], serialize.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::raft::election::VoteRequest;
use crate::raft::heartbeat::HeartbeatMsg;
use crate::raft::Peer;

pub async fn vote_req(State(peer): State<Arc<Peer>>, Json(body): Json<VoteRequest>) -> Json<Value> {
    let reply = peer.handle_vote_req(body).await;
    Json(json!({ "choice": reply.choice, "term": reply.term }))
}

pub async fn heartbeat(State(peer): State<Arc<Peer>>, Json(body): Json<HeartbeatMsg>) -> Json<Value> {
    let reply = peer.handle_heartbeat(body).await;
    Json(json!({ "term": reply.term, "commitIdx": reply.commit_idx }))
}

#[derive(Debug, Deserialize)]
pub struct LeaderDownBody {
    #[allow(dead_code)]
    pub addr: String,
}

pub async fn leader_down(State(peer): State<Arc<Peer>>, Json(_body): Json<LeaderDownBody>) -> Json<Value> {
    peer.handle_leader_down().await;
    Json(json!({ "status": "ok" }))
}
