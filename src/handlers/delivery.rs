//! Delivery task message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::serve;
use crate::services::DispatchServices;
use crate::types::{
    CompleteDeliveryRequest, DeliveryStatsRequest, FailDeliveryRequest, ListDeliveriesRequest,
    ListResponse, TaskIdRequest,
};

/// Handle delivery.list messages
pub async fn handle_list(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "delivery.list", |req: Option<ListDeliveriesRequest>| {
        let services = services.clone();
        async move {
            let filter = req.unwrap_or_default();
            services
                .lifecycle
                .list_deliveries(&filter)
                .await
                .map(ListResponse::from)
        }
    })
    .await
}

/// Handle delivery.start messages
pub async fn handle_start(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "delivery.start", |req: TaskIdRequest| {
        let services = services.clone();
        async move { services.lifecycle.start_delivery(req.task_id).await }
    })
    .await
}

/// Handle delivery.complete messages
pub async fn handle_complete(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "delivery.complete", |req: CompleteDeliveryRequest| {
        let services = services.clone();
        async move {
            services
                .lifecycle
                .complete_delivery(req.task_id, req.completed_by)
                .await
        }
    })
    .await
}

/// Handle delivery.fail messages
pub async fn handle_fail(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "delivery.fail", |req: FailDeliveryRequest| {
        let services = services.clone();
        async move { services.lifecycle.fail_delivery(req.task_id, req.reason).await }
    })
    .await
}

/// Handle delivery.cancel messages
///
/// Deletes the task; the owning assignment goes back to PLANNED.
pub async fn handle_cancel(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "delivery.cancel", |req: TaskIdRequest| {
        let services = services.clone();
        async move { services.lifecycle.cancel_delivery(req.task_id).await }
    })
    .await
}

/// Handle delivery.stats messages
pub async fn handle_stats(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "delivery.stats", |req: Option<DeliveryStatsRequest>| {
        let services = services.clone();
        async move {
            let req = req.unwrap_or_default();
            services.lifecycle.delivery_stats(&req).await
        }
    })
    .await
}
