//! Ping handler for health checks

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::serve;
use crate::error::DispatchError;
use crate::services::DispatchServices;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PingRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PongResponse {
    message: String,
    store: String,
    timestamp: DateTime<Utc>,
}

fn pong(request: PingRequest, store: &str) -> PongResponse {
    PongResponse {
        message: request
            .message
            .map(|m| format!("Pong: {}", m))
            .unwrap_or_else(|| "Pong".to_string()),
        store: store.to_string(),
        timestamp: Utc::now(),
    }
}

/// Handle ping messages
pub async fn handle_ping(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "ping", |req: Option<PingRequest>| {
        let services = services.clone();
        async move { Ok::<_, DispatchError>(pong(req.unwrap_or_default(), services.store.name())) }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pong_echoes_message() {
        let response = pong(PingRequest { message: Some("hi".into()) }, "memory");
        assert_eq!(response.message, "Pong: hi");
        assert_eq!(response.store, "memory");
    }

    #[test]
    fn test_pong_without_message() {
        assert_eq!(pong(PingRequest::default(), "postgres").message, "Pong");
    }
}
