//! NATS message handlers

pub mod assignment;
pub mod customer;
pub mod delivery;
pub mod depot;
pub mod ping;
pub mod route;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::services::DispatchServices;
use crate::types::{ErrorResponse, Request, SuccessResponse};

/// Prefix shared by every subject the worker listens on
pub const SUBJECT_PREFIX: &str = "dispatch";

fn log_failure(subject: &str, err: &DispatchError) {
    match err {
        DispatchError::Storage(_) | DispatchError::Internal(_) | DispatchError::BatchIdCollision(_) => {
            error!("{} failed: {}", subject, err)
        }
        _ => warn!("{} rejected: {}", subject, err),
    }
}

/// Decode a request envelope; a payload that does not parse becomes the
/// `INVALID_REQUEST` reply.
fn decode_request<T: DeserializeOwned>(payload: &[u8]) -> std::result::Result<Request<T>, ErrorResponse> {
    serde_json::from_slice(payload)
        .map_err(|e| ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string()))
}

/// Encode the reply for a handled request.
fn encode_reply<R: Serialize>(request_id: Uuid, outcome: &crate::error::Result<R>) -> serde_json::Result<Vec<u8>> {
    match outcome {
        Ok(payload) => serde_json::to_vec(&SuccessResponse::new(request_id, payload)),
        Err(e) => serde_json::to_vec(&ErrorResponse::from_error(request_id, e)),
    }
}

/// Answer every request on `subscriber` with the outcome of `handle`.
pub async fn serve<T, R, F, Fut>(
    client: Client,
    mut subscriber: Subscriber,
    subject: &'static str,
    handle: F,
) -> Result<()>
where
    T: DeserializeOwned,
    R: Serialize,
    F: Fn(T) -> Fut,
    Fut: Future<Output = crate::error::Result<R>>,
{
    while let Some(msg) = subscriber.next().await {
        debug!("Received {} message", subject);

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("{} message without reply subject", subject);
                continue;
            }
        };

        let request: Request<T> = match decode_request(&msg.payload) {
            Ok(req) => req,
            Err(invalid) => {
                error!("Failed to parse {} request: {}", subject, invalid.error.message);
                let _ = client.publish(reply, serde_json::to_vec(&invalid)?.into()).await;
                continue;
            }
        };

        let outcome = handle(request.payload).await;
        if let Err(e) = &outcome {
            log_failure(subject, e);
        }
        let body = encode_reply(request.id, &outcome)?;
        if let Err(e) = client.publish(reply, body.into()).await {
            error!("Failed to publish {} reply: {}", subject, e);
        }
    }

    Ok(())
}

type HandlerFn<Fut> = fn(Client, Subscriber, Arc<DispatchServices>) -> Fut;

async fn spawn_handler<Fut>(
    client: &Client,
    services: &Arc<DispatchServices>,
    subject: &'static str,
    handler: HandlerFn<Fut>,
) -> Result<(&'static str, JoinHandle<Result<()>>)>
where
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let subscriber = client.subscribe(format!("{SUBJECT_PREFIX}.{subject}")).await?;
    let handle = tokio::spawn(handler(client.clone(), subscriber, services.clone()));
    Ok((subject, handle))
}

/// Start all message handlers
pub async fn start_handlers(client: Client, services: Arc<DispatchServices>) -> Result<()> {
    info!("Starting message handlers (store: {})...", services.store.name());

    let c = &client;
    let s = &services;
    let handlers = vec![
        spawn_handler(c, s, "ping", ping::handle_ping).await?,
        // Routes
        spawn_handler(c, s, "route.optimize", route::handle_optimize).await?,
        spawn_handler(c, s, "route.get", route::handle_get).await?,
        spawn_handler(c, s, "route.release", route::handle_release).await?,
        spawn_handler(c, s, "route.eta", route::handle_eta).await?,
        // Assignments
        spawn_handler(c, s, "assignment.create", assignment::handle_create).await?,
        spawn_handler(c, s, "assignment.get", assignment::handle_get).await?,
        spawn_handler(c, s, "assignment.schedule", assignment::handle_schedule).await?,
        spawn_handler(c, s, "assignment.cancel", assignment::handle_cancel).await?,
        spawn_handler(c, s, "assignment.stats", assignment::handle_stats).await?,
        // Deliveries
        spawn_handler(c, s, "delivery.list", delivery::handle_list).await?,
        spawn_handler(c, s, "delivery.start", delivery::handle_start).await?,
        spawn_handler(c, s, "delivery.complete", delivery::handle_complete).await?,
        spawn_handler(c, s, "delivery.fail", delivery::handle_fail).await?,
        spawn_handler(c, s, "delivery.cancel", delivery::handle_cancel).await?,
        spawn_handler(c, s, "delivery.stats", delivery::handle_stats).await?,
        // Depots
        spawn_handler(c, s, "depot.list", depot::handle_list).await?,
        spawn_handler(c, s, "depot.create", depot::handle_create).await?,
        spawn_handler(c, s, "depot.update", depot::handle_update).await?,
        spawn_handler(c, s, "depot.delete", depot::handle_delete).await?,
        spawn_handler(c, s, "depot.set_default", depot::handle_set_default).await?,
        spawn_handler(c, s, "depot.default", depot::handle_default).await?,
        // Customer directory
        spawn_handler(c, s, "customer.upsert", customer::handle_upsert).await?,
    ];

    info!("Listening on {} subjects under '{}.'", handlers.len(), SUBJECT_PREFIX);

    let (subjects, handles): (Vec<&'static str>, Vec<_>) = handlers.into_iter().unzip();
    let (result, index, _remaining) = futures::future::select_all(handles).await;
    error!("{} handler finished: {:?}", subjects[index], result);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BatchIdRequest, EmptyPayload};
    use serde_json::Value;

    #[test]
    fn test_decode_rejects_malformed_envelope() {
        let invalid = decode_request::<BatchIdRequest>(b"{not json").unwrap_err();
        assert_eq!(invalid.id, Uuid::nil());
        assert_eq!(invalid.error.code, "INVALID_REQUEST");
    }

    #[test]
    fn test_decode_rejects_payload_of_wrong_shape() {
        let json = br#"{"id":"00000000-0000-0000-0000-000000000001","timestamp":"2026-01-07T08:00:00Z","payload":{"batch":1}}"#;
        let invalid = decode_request::<BatchIdRequest>(json).unwrap_err();
        assert_eq!(invalid.error.code, "INVALID_REQUEST");
    }

    #[test]
    fn test_decode_accepts_missing_optional_payload() {
        let json = br#"{"id":"00000000-0000-0000-0000-000000000001","timestamp":"2026-01-07T08:00:00Z"}"#;
        let request = decode_request::<Option<EmptyPayload>>(json).unwrap();
        assert!(request.payload.is_none());
        assert_eq!(request.id, Uuid::from_u128(1));
    }

    #[test]
    fn test_encode_success_echoes_request_id() {
        let id = Uuid::new_v4();
        let body = encode_reply(id, &Ok(vec![1, 2])).unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["id"], serde_json::json!(id));
        assert_eq!(json["payload"], serde_json::json!([1, 2]));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_encode_error_carries_code_and_task_ids() {
        let id = Uuid::new_v4();
        let task = Uuid::new_v4();
        let outcome: crate::error::Result<()> = Err(DispatchError::conflict_on("already batched", vec![task]));
        let json: Value = serde_json::from_slice(&encode_reply(id, &outcome).unwrap()).unwrap();
        assert_eq!(json["id"], serde_json::json!(id));
        assert_eq!(json["error"]["code"], "CONFLICT");
        assert_eq!(json["error"]["details"]["taskIds"][0], serde_json::json!(task));
        assert!(json.get("payload").is_none());
    }
}
