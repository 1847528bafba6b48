//! PostgreSQL dispatch store

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::db::queries::{assignment, customer, delivery, depot, route};
use crate::db::DispatchStore;
use crate::error::{DispatchError, Result};
use crate::services::lifecycle::{self, LifecycleEvent, TaskChange, Transition, TransitionKey};
use crate::types::{
    Assignment, AssignmentStatsResponse, CreateDepotRequest, CustomerSnapshot, DeliveryStatsRequest,
    DeliveryStatsResponse, DeliveryTask, Depot, ListDeliveriesRequest, RouteBatch,
    UpdateDepotRequest,
};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn database_error(err: &DispatchError) -> Option<&dyn sqlx::error::DatabaseError> {
    match err {
        DispatchError::Storage(sqlx::Error::Database(db)) => Some(&**db),
        _ => None,
    }
}

/// Turn unique violations into a Conflict carrying `message`
fn unique_to_conflict(err: DispatchError, message: impl FnOnce() -> String) -> DispatchError {
    match database_error(&err) {
        Some(db) if db.is_unique_violation() => DispatchError::conflict(message()),
        _ => err,
    }
}

#[async_trait]
impl DispatchStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn upsert_customer(&self, c: &CustomerSnapshot) -> Result<()> {
        customer::upsert_customer(&self.pool, c).await
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<CustomerSnapshot>> {
        customer::get_customer(&self.pool, id).await
    }

    async fn create_depot(&self, req: &CreateDepotRequest) -> Result<Depot> {
        let mut tx = self.pool.begin().await?;
        if req.is_default == Some(true) {
            depot::clear_default(&mut tx, None).await?;
        }
        let created = depot::create_depot(&mut tx, req)
            .await
            .map_err(|e| unique_to_conflict(e, || format!("depot name '{}' already exists", req.name)))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_depot(&self, req: &UpdateDepotRequest) -> Result<Option<Depot>> {
        let mut tx = self.pool.begin().await?;
        if req.is_default == Some(true) {
            depot::clear_default(&mut tx, Some(req.id)).await?;
        }
        let updated = depot::update_depot(&mut tx, req).await.map_err(|e| {
            unique_to_conflict(e, || {
                format!("depot name '{}' already exists", req.name.as_deref().unwrap_or_default())
            })
        })?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_depot(&self, id: Uuid) -> Result<bool> {
        depot::delete_depot(&self.pool, id).await.map_err(|err| match database_error(&err) {
            Some(db) if db.is_foreign_key_violation() => {
                DispatchError::conflict(format!("depot {id} is referenced by route batches"))
            }
            _ => err,
        })
    }

    async fn get_depot(&self, id: Uuid) -> Result<Option<Depot>> {
        depot::get_depot(&self.pool, id).await
    }

    async fn list_depots(&self) -> Result<Vec<Depot>> {
        depot::list_depots(&self.pool).await
    }

    async fn get_default_depot(&self) -> Result<Option<Depot>> {
        depot::get_default_depot(&self.pool).await
    }

    async fn set_default_depot(&self, id: Uuid) -> Result<Option<Depot>> {
        let mut tx = self.pool.begin().await?;
        if depot::get_depot(&mut *tx, id).await?.is_none() {
            return Ok(None);
        }
        depot::clear_default(&mut tx, Some(id)).await?;
        let updated = depot::mark_default(&mut tx, id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn insert_assignment(&self, a: &Assignment, task: &DeliveryTask) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        assignment::insert_assignment(&mut *tx, a).await?;
        delivery::insert_task(&mut *tx, task).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        assignment::get_assignment(&self.pool, id).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<DeliveryTask>> {
        delivery::get_task(&self.pool, id).await
    }

    async fn get_task_for_assignment(&self, assignment_id: Uuid) -> Result<Option<DeliveryTask>> {
        delivery::get_task_for_assignment(&self.pool, assignment_id).await
    }

    async fn list_tasks(&self, filter: &ListDeliveriesRequest) -> Result<Vec<DeliveryTask>> {
        delivery::list_tasks(&self.pool, filter).await
    }

    async fn select_tasks_for_route(
        &self,
        date: NaiveDate,
        ids: Option<&[Uuid]>,
    ) -> Result<Vec<DeliveryTask>> {
        let Some(ids) = ids else {
            return delivery::select_unbatched(&self.pool, date).await;
        };

        let mut by_id: HashMap<Uuid, DeliveryTask> = delivery::select_by_ids(&self.pool, date, ids)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();
        // request order, duplicates dropped
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn apply_transition(
        &self,
        key: TransitionKey,
        event: &LifecycleEvent,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let mut tx = self.pool.begin().await?;

        // Lock order is always assignment, then task.
        let (current_assignment, current_task) = match key {
            TransitionKey::Assignment(id) => {
                let a = assignment::lock_assignment(&mut tx, id)
                    .await?
                    .ok_or_else(|| DispatchError::not_found("assignment", id))?;
                let task = delivery::lock_task_for_assignment(&mut tx, id).await?;
                (Some(a), task)
            }
            TransitionKey::Task(id) => {
                let owner = delivery::get_task(&mut *tx, id)
                    .await?
                    .ok_or_else(|| DispatchError::not_found("delivery task", id))?
                    .assignment_id;
                let a = assignment::lock_assignment(&mut tx, owner).await?;
                let task = delivery::lock_task(&mut tx, id)
                    .await?
                    .ok_or_else(|| DispatchError::not_found("delivery task", id))?;
                (a, Some(task))
            }
        };

        let transition = lifecycle::plan(event, current_assignment, current_task, now)?;

        if let (true, Some(a)) = (transition.assignment_changed, &transition.assignment) {
            assignment::update_status(&mut tx, a).await?;
        }
        match &transition.task {
            TaskChange::Unchanged(_) => {}
            TaskChange::Insert(task) => {
                delivery::insert_task(&mut *tx, task).await.map_err(|e| {
                    unique_to_conflict(e, || {
                        format!("assignment {} already has a delivery task", task.assignment_id)
                    })
                })?;
            }
            TaskChange::Update(task) => delivery::update_task(&mut tx, task).await?,
            TaskChange::Delete(task) => delivery::delete_task(&mut tx, task.id).await?,
        }

        tx.commit().await?;
        Ok(transition)
    }

    async fn commit_batch(&self, batch: &RouteBatch) -> Result<()> {
        let ids = batch.task_ids();
        let repeated = batch.duplicate_task_ids();
        if !repeated.is_empty() {
            return Err(DispatchError::conflict_on("batch lists the same task more than once", repeated));
        }

        let mut tx = self.pool.begin().await?;

        let claimable: HashSet<Uuid> = delivery::lock_tasks(&mut tx, &ids)
            .await?
            .into_iter()
            .filter(DeliveryTask::is_claimable)
            .map(|t| t.id)
            .collect();
        let unavailable: Vec<Uuid> = ids.iter().copied().filter(|id| !claimable.contains(id)).collect();
        if !unavailable.is_empty() {
            return Err(DispatchError::conflict_on(
                format!("{} task(s) missing or already in an open batch", unavailable.len()),
                unavailable,
            ));
        }

        if !route::insert_batch(&mut tx, batch).await? {
            return Err(DispatchError::BatchIdCollision(batch.id.clone()));
        }

        for stop in &batch.stops {
            let claimed =
                delivery::claim_task(&mut tx, &batch.id, batch.depot_id, stop, batch.created_at).await?;
            if !claimed {
                return Err(DispatchError::conflict_on(
                    format!("task {} was claimed concurrently", stop.task_id),
                    vec![stop.task_id],
                ));
            }
            route::insert_stop(&mut tx, &batch.id, stop).await?;
        }

        tx.commit().await?;
        debug!("Committed batch {} with {} stops", batch.id, batch.stops.len());
        Ok(())
    }

    async fn get_batch(&self, id: &str) -> Result<Option<RouteBatch>> {
        let mut conn = self.pool.acquire().await?;
        route::get_batch(&mut conn, id).await
    }

    async fn release_batch(&self, id: &str, at: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;
        match route::lock_batch(&mut tx, id).await? {
            None => return Err(DispatchError::not_found("route batch", id)),
            Some(Some(_)) => {
                return Err(DispatchError::conflict(format!("batch {id} is already released")))
            }
            Some(None) => {}
        }

        let released = delivery::release_waiting(&mut tx, id, at).await?;
        route::mark_released(&mut *tx, id, at).await?;
        tx.commit().await?;
        Ok(released)
    }

    async fn delivery_stats(
        &self,
        req: &DeliveryStatsRequest,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStatsResponse> {
        delivery::delivery_stats(&self.pool, req, since).await
    }

    async fn assignment_stats(&self) -> Result<AssignmentStatsResponse> {
        assignment::assignment_stats(&self.pool).await
    }
}
