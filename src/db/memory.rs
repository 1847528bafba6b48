//! In-memory dispatch store
//!
//! All state sits behind one mutex, so every validate-then-write sequence is
//! atomic. Used for tests and for running the worker without PostgreSQL
//! (`STORE_BACKEND=memory`).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::db::DispatchStore;
use crate::error::{DispatchError, Result};
use crate::services::lifecycle::{self, LifecycleEvent, TaskChange, Transition, TransitionKey};
use crate::types::{
    Assignment, AssignmentStatsResponse, CreateDepotRequest, CustomerSnapshot, DeliveryStatsRequest,
    DeliveryStatsResponse, DeliveryStatus, DeliveryTask, Depot, ListDeliveriesRequest, RouteBatch,
    UpdateDepotRequest,
};

#[derive(Default)]
struct State {
    customers: HashMap<Uuid, CustomerSnapshot>,
    depots: HashMap<Uuid, Depot>,
    assignments: HashMap<Uuid, Assignment>,
    tasks: HashMap<Uuid, DeliveryTask>,
    batches: HashMap<String, RouteBatch>,
}

impl State {
    fn task_for_assignment(&self, assignment_id: Uuid) -> Option<&DeliveryTask> {
        self.tasks.values().find(|t| t.assignment_id == assignment_id)
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.depots
            .values()
            .any(|d| d.name == name && Some(d.id) != except)
    }

    fn clear_default(&mut self, now: DateTime<Utc>) {
        for depot in self.depots.values_mut().filter(|d| d.is_default) {
            depot.is_default = false;
            depot.updated_at = now;
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop an assignment without touching its task, leaving an orphan.
    #[cfg(test)]
    pub fn remove_assignment(&self, id: Uuid) {
        self.state.lock().assignments.remove(&id);
    }
}

fn name_conflict(name: &str) -> DispatchError {
    DispatchError::conflict(format!("depot name '{name}' already exists"))
}

#[async_trait]
impl DispatchStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upsert_customer(&self, customer: &CustomerSnapshot) -> Result<()> {
        self.state.lock().customers.insert(customer.id, customer.clone());
        Ok(())
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<CustomerSnapshot>> {
        Ok(self.state.lock().customers.get(&id).cloned())
    }

    async fn create_depot(&self, req: &CreateDepotRequest) -> Result<Depot> {
        let mut state = self.state.lock();
        if state.name_taken(&req.name, None) {
            return Err(name_conflict(&req.name));
        }

        let now = Utc::now();
        let is_default = req.is_default.unwrap_or(false);
        if is_default {
            state.clear_default(now);
        }

        let depot = Depot {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            lat: req.lat,
            lng: req.lng,
            is_default,
            created_at: now,
            updated_at: now,
        };
        state.depots.insert(depot.id, depot.clone());
        Ok(depot)
    }

    async fn update_depot(&self, req: &UpdateDepotRequest) -> Result<Option<Depot>> {
        let mut state = self.state.lock();
        if !state.depots.contains_key(&req.id) {
            return Ok(None);
        }
        if let Some(name) = &req.name {
            if state.name_taken(name, Some(req.id)) {
                return Err(name_conflict(name));
            }
        }

        let now = Utc::now();
        if req.is_default == Some(true) {
            state.clear_default(now);
        }

        let Some(depot) = state.depots.get_mut(&req.id) else {
            return Ok(None);
        };
        if let Some(name) = &req.name {
            depot.name = name.clone();
        }
        if let Some(lat) = req.lat {
            depot.lat = lat;
        }
        if let Some(lng) = req.lng {
            depot.lng = lng;
        }
        if let Some(is_default) = req.is_default {
            depot.is_default = is_default;
        }
        depot.updated_at = now;
        Ok(Some(depot.clone()))
    }

    async fn delete_depot(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.lock();
        if state.batches.values().any(|b| b.depot_id == id) {
            return Err(DispatchError::conflict(format!(
                "depot {id} is referenced by route batches"
            )));
        }
        if state.depots.remove(&id).is_none() {
            return Ok(false);
        }
        for task in state.tasks.values_mut().filter(|t| t.depot_id == Some(id)) {
            task.depot_id = None;
        }
        Ok(true)
    }

    async fn get_depot(&self, id: Uuid) -> Result<Option<Depot>> {
        Ok(self.state.lock().depots.get(&id).cloned())
    }

    async fn list_depots(&self) -> Result<Vec<Depot>> {
        let mut depots: Vec<Depot> = self.state.lock().depots.values().cloned().collect();
        depots.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| a.name.cmp(&b.name)));
        Ok(depots)
    }

    async fn get_default_depot(&self) -> Result<Option<Depot>> {
        Ok(self.state.lock().depots.values().find(|d| d.is_default).cloned())
    }

    async fn set_default_depot(&self, id: Uuid) -> Result<Option<Depot>> {
        let mut state = self.state.lock();
        if !state.depots.contains_key(&id) {
            return Ok(None);
        }
        let now = Utc::now();
        state.clear_default(now);
        let depot = state.depots.get_mut(&id).map(|d| {
            d.is_default = true;
            d.updated_at = now;
            d.clone()
        });
        Ok(depot)
    }

    async fn insert_assignment(&self, assignment: &Assignment, task: &DeliveryTask) -> Result<()> {
        let mut state = self.state.lock();
        state.assignments.insert(assignment.id, assignment.clone());
        state.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: Uuid) -> Result<Option<Assignment>> {
        Ok(self.state.lock().assignments.get(&id).cloned())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<DeliveryTask>> {
        Ok(self.state.lock().tasks.get(&id).cloned())
    }

    async fn get_task_for_assignment(&self, assignment_id: Uuid) -> Result<Option<DeliveryTask>> {
        Ok(self.state.lock().task_for_assignment(assignment_id).cloned())
    }

    async fn list_tasks(&self, filter: &ListDeliveriesRequest) -> Result<Vec<DeliveryTask>> {
        let state = self.state.lock();
        let mut tasks: Vec<DeliveryTask> = state
            .tasks
            .values()
            .filter(|t| filter.date.map_or(true, |d| t.scheduled_date == Some(d)))
            .filter(|t| filter.status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.route_batch_id
                .cmp(&b.route_batch_id)
                .then(a.delivery_order.cmp(&b.delivery_order))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    async fn select_tasks_for_route(
        &self,
        date: NaiveDate,
        ids: Option<&[Uuid]>,
    ) -> Result<Vec<DeliveryTask>> {
        let state = self.state.lock();
        let eligible =
            |t: &DeliveryTask| t.status == DeliveryStatus::Waiting && t.scheduled_date == Some(date);

        let tasks = match ids {
            Some(ids) => {
                // request order, duplicates dropped
                let mut seen = HashSet::new();
                ids.iter()
                    .filter(|id| seen.insert(**id))
                    .filter_map(|id| state.tasks.get(id))
                    .filter(|t| eligible(t))
                    .cloned()
                    .collect()
            }
            None => {
                let mut tasks: Vec<DeliveryTask> = state
                    .tasks
                    .values()
                    .filter(|t| eligible(t) && t.route_batch_id.is_none())
                    .cloned()
                    .collect();
                tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
                tasks
            }
        };
        Ok(tasks)
    }

    async fn apply_transition(
        &self,
        key: TransitionKey,
        event: &LifecycleEvent,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        let mut state = self.state.lock();

        let (assignment, task) = match key {
            TransitionKey::Assignment(id) => {
                let assignment = state
                    .assignments
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| DispatchError::not_found("assignment", id))?;
                let task = state.task_for_assignment(id).cloned();
                (Some(assignment), task)
            }
            TransitionKey::Task(id) => {
                let task = state
                    .tasks
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| DispatchError::not_found("delivery task", id))?;
                let assignment = state.assignments.get(&task.assignment_id).cloned();
                (assignment, Some(task))
            }
        };

        let transition = lifecycle::plan(event, assignment, task, now)?;

        if let (true, Some(assignment)) = (transition.assignment_changed, &transition.assignment) {
            state.assignments.insert(assignment.id, assignment.clone());
        }
        match &transition.task {
            TaskChange::Unchanged(_) => {}
            TaskChange::Insert(task) | TaskChange::Update(task) => {
                state.tasks.insert(task.id, task.clone());
            }
            TaskChange::Delete(task) => {
                state.tasks.remove(&task.id);
            }
        }

        Ok(transition)
    }

    async fn commit_batch(&self, batch: &RouteBatch) -> Result<()> {
        let mut state = self.state.lock();
        if state.batches.contains_key(&batch.id) {
            return Err(DispatchError::BatchIdCollision(batch.id.clone()));
        }
        let repeated = batch.duplicate_task_ids();
        if !repeated.is_empty() {
            return Err(DispatchError::conflict_on("batch lists the same task more than once", repeated));
        }

        let unavailable: Vec<Uuid> = batch
            .stops
            .iter()
            .filter(|stop| !state.tasks.get(&stop.task_id).is_some_and(DeliveryTask::is_claimable))
            .map(|stop| stop.task_id)
            .collect();
        if !unavailable.is_empty() {
            return Err(DispatchError::conflict_on(
                format!("{} task(s) missing or already in an open batch", unavailable.len()),
                unavailable,
            ));
        }

        for stop in &batch.stops {
            if let Some(task) = state.tasks.get_mut(&stop.task_id) {
                task.route_batch_id = Some(batch.id.clone());
                task.delivery_order = Some(stop.order);
                task.distance_km = Some(stop.distance_from_previous_km);
                task.estimated_arrival = stop.estimated_arrival;
                task.depot_id = Some(batch.depot_id);
                task.updated_at = batch.created_at;
            }
        }
        state.batches.insert(batch.id.clone(), batch.clone());
        Ok(())
    }

    async fn get_batch(&self, id: &str) -> Result<Option<RouteBatch>> {
        Ok(self.state.lock().batches.get(id).cloned())
    }

    async fn release_batch(&self, id: &str, at: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock();
        let task_ids = match state.batches.get(id) {
            None => return Err(DispatchError::not_found("route batch", id)),
            Some(batch) if !batch.is_open() => {
                return Err(DispatchError::conflict(format!("batch {id} is already released")))
            }
            Some(batch) => batch.task_ids(),
        };

        let mut released = Vec::new();
        for task_id in task_ids {
            if let Some(task) = state.tasks.get_mut(&task_id) {
                if task.status == DeliveryStatus::Waiting && task.route_batch_id.as_deref() == Some(id) {
                    task.clear_batch();
                    task.updated_at = at;
                    released.push(task_id);
                }
            }
        }
        if let Some(batch) = state.batches.get_mut(id) {
            batch.released_at = Some(at);
        }
        Ok(released)
    }

    async fn delivery_stats(
        &self,
        req: &DeliveryStatsRequest,
        since: DateTime<Utc>,
    ) -> Result<DeliveryStatsResponse> {
        let state = self.state.lock();
        let mut stats = DeliveryStatsResponse::default();
        for task in state
            .tasks
            .values()
            .filter(|t| req.depot_id.map_or(true, |d| t.depot_id == Some(d)))
        {
            if matches!(task.status, DeliveryStatus::Waiting | DeliveryStatus::OutForDelivery) {
                stats.waiting_count += 1;
            }
            if task.status == DeliveryStatus::Delivered && task.delivered_at.is_some_and(|at| at >= since) {
                stats.delivered_last_10_days_count += 1;
            }
            if req.date.is_some() && task.scheduled_date == req.date {
                stats.scheduled_for_selected_date_count += 1;
            }
        }
        Ok(stats)
    }

    async fn assignment_stats(&self) -> Result<AssignmentStatsResponse> {
        let state = self.state.lock();
        let mut stats = AssignmentStatsResponse::default();
        for assignment in state.assignments.values() {
            stats.add(assignment.status, 1);
        }
        Ok(stats)
    }
}
