//! Depot message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use serde::Serialize;
use uuid::Uuid;

use super::serve;
use crate::error::DispatchError;
use crate::services::DispatchServices;
use crate::types::{CreateDepotRequest, DepotIdRequest, EmptyPayload, ListResponse, UpdateDepotRequest};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    id: Uuid,
    deleted: bool,
}

/// Handle depot.list messages
pub async fn handle_list(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "depot.list", |_: Option<EmptyPayload>| {
        let services = services.clone();
        async move { services.depots.list().await.map(ListResponse::from) }
    })
    .await
}

/// Handle depot.create messages
pub async fn handle_create(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "depot.create", |req: CreateDepotRequest| {
        let services = services.clone();
        async move { services.depots.create(req).await }
    })
    .await
}

/// Handle depot.update messages
pub async fn handle_update(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "depot.update", |req: UpdateDepotRequest| {
        let services = services.clone();
        async move { services.depots.update(req).await }
    })
    .await
}

/// Handle depot.delete messages
pub async fn handle_delete(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "depot.delete", |req: DepotIdRequest| {
        let services = services.clone();
        async move {
            services.depots.delete(req.id).await?;
            Ok::<_, DispatchError>(DeleteResponse { id: req.id, deleted: true })
        }
    })
    .await
}

/// Handle depot.set_default messages
pub async fn handle_set_default(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "depot.set_default", |req: DepotIdRequest| {
        let services = services.clone();
        async move { services.depots.set_default(req.id).await }
    })
    .await
}

/// Handle depot.default messages; the payload is null when no default is set
pub async fn handle_default(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "depot.default", |_: Option<EmptyPayload>| {
        let services = services.clone();
        async move { services.depots.default_depot().await }
    })
    .await
}
