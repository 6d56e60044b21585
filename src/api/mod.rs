//! HTTP/JSON façade (§6): thin axum handlers in front of the consensus
//! core. Routing mirrors the teacher's own `Router`/`State` wiring in
//! `main.rs`, trimmed of everything this system has no use for (TLS,
//! compression, CORS, static files, proxying).

pub mod client;
pub mod rpc;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::raft::Peer;

pub fn router(peer: Arc<Peer>) -> Router {
    Router::new()
        .route("/vote_req", post(rpc::vote_req))
        .route("/heartbeat", post(rpc::heartbeat))
        .route("/leader_down", post(rpc::leader_down))
        .route(
            "/request",
            get(client::get).put(client::put).delete(client::delete),
        )
        .route("/show_log", get(client::show_log))
        .layer(TraceLayer::new_for_http())
        .with_state(peer)
}
