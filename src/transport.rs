//! Peer transport adapter (§4.7): fire-and-wait RPC to a named peer with a
//! hard per-call timeout. Any transport error, non-success status, or
//! timeout collapses to `None` — callers never see the difference between
//! "peer down" and "peer slow".

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// `send(peer, route, message) -> reply | none`, exactly spec.md §4.7.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn send(&self, peer: &str, route: &str, message: Value) -> Option<Value>;
}

/// HTTP+JSON transport (§6), grounded in `utils.py`'s `send()`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with a fixed timeout");
        HttpTransport { client }
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send(&self, peer: &str, route: &str, message: Value) -> Option<Value> {
        let url = format!("{peer}/{route}");
        let reply = match self.client.post(&url).json(&message).send().await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::debug!(peer, route, error = %err, "peer unreachable");
                return None;
            }
        };
        if !reply.status().is_success() {
            tracing::debug!(peer, route, status = %reply.status(), "peer returned non-success");
            return None;
        }
        reply.json().await.ok()
    }
}


#[cfg(test)]
mod tests {
    use super::loopback::LoopbackTransport;
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn loopback_routes_by_address() {
        let transport = LoopbackTransport::new();
        transport
            .register(
                "peer-a",
                Arc::new(|route, _msg| Some(json!({"route": route, "echo": true}))),
            )
            .await;

        let reply = transport.send("peer-a", "heartbeat", json!({})).await;
        assert_eq!(reply, Some(json!({"route": "heartbeat", "echo": true})));
    }

    #[tokio::test]
    async fn loopback_unregistered_peer_is_none() {
        let transport = LoopbackTransport::new();
        assert_eq!(transport.send("ghost", "heartbeat", json!({})).await, None);
    }
}
