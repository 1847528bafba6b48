//! Storage abstraction for the dispatch worker
//!
//! Implementations must make every multi-row write atomic: a failed batch
//! commit or lifecycle transition leaves no partial state behind.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::services::lifecycle::{LifecycleEvent, Transition, TransitionKey};
use crate::types::{
    Assignment, AssignmentStatsResponse, CreateDepotRequest, CustomerSnapshot, DeliveryStatsRequest,
    DeliveryStatsResponse, DeliveryTask, Depot, ListDeliveriesRequest, RouteBatch,
    UpdateDepotRequest,
};

#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    // ── Customers ──────────────────────────────────────────────────────

    async fn upsert_customer(&self, customer: &CustomerSnapshot) -> Result<()>;
    async fn get_customer(&self, id: Uuid) -> Result<Option<CustomerSnapshot>>;

    // ── Depots ─────────────────────────────────────────────────────────

    /// Conflict when the name is taken.
    async fn create_depot(&self, req: &CreateDepotRequest) -> Result<Depot>;
    async fn update_depot(&self, req: &UpdateDepotRequest) -> Result<Option<Depot>>;
    /// Conflict while a route batch still references the depot.
    async fn delete_depot(&self, id: Uuid) -> Result<bool>;
    async fn get_depot(&self, id: Uuid) -> Result<Option<Depot>>;
    /// Default depot first, then by name.
    async fn list_depots(&self) -> Result<Vec<Depot>>;
    async fn get_default_depot(&self) -> Result<Option<Depot>>;
    /// Clears every other default flag in the same transaction.
    async fn set_default_depot(&self, id: Uuid) -> Result<Option<Depot>>;

    // ── Assignments and delivery tasks ─────────────────────────────────

    async fn insert_assignment(&self, assignment: &Assignment, task: &DeliveryTask) -> Result<()>;
    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>>;
    async fn get_task(&self, id: Uuid) -> Result<Option<DeliveryTask>>;
    async fn get_task_for_assignment(&self, assignment_id: Uuid) -> Result<Option<DeliveryTask>>;
    async fn list_tasks(&self, filter: &ListDeliveriesRequest) -> Result<Vec<DeliveryTask>>;

    /// WAITING tasks scheduled for `date`.
    ///
    /// With `ids`, returns the matching tasks whatever their batch state so
    /// the commit can report conflicts. Without, only unbatched tasks are
    /// returned, oldest first.
    async fn select_tasks_for_route(
        &self,
        date: NaiveDate,
        ids: Option<&[Uuid]>,
    ) -> Result<Vec<DeliveryTask>>;

    /// Load and lock the assignment/task pair named by `key`, plan the
    /// transition and write it, all in one transaction.
    async fn apply_transition(
        &self,
        key: TransitionKey,
        event: &LifecycleEvent,
        now: DateTime<Utc>,
    ) -> Result<Transition>;

    // ── Route batches ──────────────────────────────────────────────────

    /// Write the batch and claim each stop's task.
    ///
    /// All-or-nothing: Conflict (with the offending ids) if any task is
    /// missing or already claimed, BatchIdCollision if the id exists.
    async fn commit_batch(&self, batch: &RouteBatch) -> Result<()>;
    async fn get_batch(&self, id: &str) -> Result<Option<RouteBatch>>;

    /// Mark the batch released and clear batch fields on its WAITING tasks.
    /// Returns the ids of the tasks that were freed.
    async fn release_batch(&self, id: &str, at: DateTime<Utc>) -> Result<Vec<Uuid>>;

    // ── Statistics ─────────────────────────────────────────────────────

    /// `since` bounds the delivered window.
    async fn delivery_stats(
        &self,
        req: &DeliveryStatsRequest,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStatsResponse>;
    async fn assignment_stats(&self) -> Result<AssignmentStatsResponse>;
}
