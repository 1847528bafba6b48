//! Route batch message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::serve;
use crate::services::DispatchServices;
use crate::types::{BatchIdRequest, EstimateArrivalsRequest, ListResponse, OptimizeRouteRequest};

/// Handle route.optimize messages
///
/// Orders the day's WAITING deliveries from the depot and commits them as a
/// new batch.
pub async fn handle_optimize(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "route.optimize", |req: OptimizeRouteRequest| {
        let services = services.clone();
        async move { services.dispatcher.optimize(req).await }
    })
    .await
}

/// Handle route.get messages
pub async fn handle_get(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "route.get", |req: BatchIdRequest| {
        let services = services.clone();
        async move { services.dispatcher.get_batch(&req.batch_id).await }
    })
    .await
}

/// Handle route.release messages
pub async fn handle_release(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "route.release", |req: BatchIdRequest| {
        let services = services.clone();
        async move { services.dispatcher.release_batch(&req.batch_id).await }
    })
    .await
}

/// Handle route.eta messages (estimate only, nothing is stored)
pub async fn handle_eta(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "route.eta", |req: EstimateArrivalsRequest| {
        let services = services.clone();
        async move {
            services
                .dispatcher
                .estimate_arrivals(req)
                .await
                .map(ListResponse::from)
        }
    })
    .await
}
