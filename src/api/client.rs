//! Client RPC façade (§6): `/request` GET/PUT/DELETE, `/show_log`.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::raft::peer::{GetOutcome, WriteOutcome};
use crate::raft::Peer;

#[derive(Debug, Deserialize)]
pub struct KeyValuePayload {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct KeyPayload {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct PutBody {
    pub payload: KeyValuePayload,
}

#[derive(Debug, Deserialize)]
pub struct KeyOnlyBody {
    pub payload: KeyPayload,
}

pub async fn put(State(peer): State<Arc<Peer>>, Json(body): Json<PutBody>) -> Json<Value> {
    let key = body.payload.key;
    let value = body.payload.value;
    match peer.put(key.clone(), value.clone()).await {
        WriteOutcome::Committed => Json(json!({ "code": "success" })),
        WriteOutcome::Failed => Json(json!({ "code": "fail" })),
        WriteOutcome::Redirect(leader) => Json(json!({
            "code": "fail",
            "payload": { "key": key, "value": value, "message": leader },
        })),
    }
}

pub async fn get(State(peer): State<Arc<Peer>>, Json(body): Json<KeyOnlyBody>) -> Json<Value> {
    let key = body.payload.key;
    match peer.get(&key).await {
        GetOutcome::Hit(value) => Json(json!({
            "code": "success",
            "payload": { "key": key, "value": value },
        })),
        GetOutcome::Miss => Json(json!({
            "code": "fail",
            "payload": { "key": key },
        })),
        GetOutcome::Redirect(leader) => Json(json!({
            "code": "fail",
            "payload": { "key": key, "message": leader },
        })),
    }
}

pub async fn delete(State(peer): State<Arc<Peer>>, Json(body): Json<KeyOnlyBody>) -> Json<Value> {
    let key = body.payload.key;
    match peer.delete(&key).await {
        WriteOutcome::Committed => Json(json!({ "code": "success" })),
        WriteOutcome::Failed => Json(json!({ "code": "fail" })),
        WriteOutcome::Redirect(leader) => Json(json!({
            "code": "fail",
            "payload": { "key": key, "message": leader },
        })),
    }
}

pub async fn show_log(State(peer): State<Arc<Peer>>) -> Json<Value> {
    Json(json!({ "log": peer.show_log().await }))
}
