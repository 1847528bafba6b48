//! Assignment message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::serve;
use crate::services::DispatchServices;
use crate::types::{
    AssignmentIdRequest, CreateAssignmentRequest, EmptyPayload, ScheduleAssignmentRequest,
};

/// Handle assignment.create messages
///
/// Creates the assignment together with its WAITING delivery task.
pub async fn handle_create(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "assignment.create", |req: CreateAssignmentRequest| {
        let services = services.clone();
        async move { services.lifecycle.create_assignment(req).await }
    })
    .await
}

/// Handle assignment.get messages
pub async fn handle_get(client: Client, subscriber: Subscriber, services: Arc<DispatchServices>) -> Result<()> {
    serve(client, subscriber, "assignment.get", |req: AssignmentIdRequest| {
        let services = services.clone();
        async move { services.lifecycle.get_assignment(req.assignment_id).await }
    })
    .await
}

/// Handle assignment.schedule messages
pub async fn handle_schedule(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "assignment.schedule", |req: ScheduleAssignmentRequest| {
        let services = services.clone();
        async move { services.lifecycle.schedule(req.assignment_id, req.date).await }
    })
    .await
}

/// Handle assignment.cancel messages
pub async fn handle_cancel(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "assignment.cancel", |req: AssignmentIdRequest| {
        let services = services.clone();
        async move { services.lifecycle.cancel_assignment(req.assignment_id).await }
    })
    .await
}

/// Handle assignment.stats messages
pub async fn handle_stats(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "assignment.stats", |_: Option<EmptyPayload>| {
        let services = services.clone();
        async move { services.lifecycle.assignment_stats().await }
    })
    .await
}
