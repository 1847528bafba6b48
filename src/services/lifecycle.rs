//! Assignment / delivery task state machine
//!
//! Assignment: PLANNED -> SCHEDULED -> OUT_FOR_DELIVERY -> DELIVERED, with
//! CANCELLED from PLANNED or SCHEDULED.
//! Task: WAITING -> OUT_FOR_DELIVERY -> DELIVERED, with FAILED from WAITING or
//! OUT_FOR_DELIVERY.
//!
//! `plan` is pure: the store loads and locks the assignment/task pair, asks
//! `plan` for the next state, and writes the result in the same transaction.
//! The consistency check runs on the planned state before anything is written.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DispatchStore;
use crate::defaults::DELIVERED_STATS_WINDOW_DAYS;
use crate::error::{DispatchError, Result};
use crate::services::batch_id::Clock;
use crate::types::{
    Assignment, AssignmentStatsResponse, AssignmentStatus, AssignmentWithDelivery,
    CancelDeliveryResponse, CreateAssignmentRequest, CustomerSnapshot, DeliveryStatsRequest,
    DeliveryStatsResponse, DeliveryStatus, DeliveryTask, ListDeliveriesRequest,
};

/// Which side of the pair a transition is addressed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKey {
    Assignment(Uuid),
    Task(Uuid),
}

#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// `replacement` is used when the assignment currently has no task.
    Schedule {
        date: NaiveDate,
        replacement: Option<DeliveryTask>,
    },
    StartDelivery,
    Complete { actor: String },
    Fail { reason: Option<String> },
    CancelDelivery,
    CancelAssignment,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Schedule { .. } => "schedule",
            LifecycleEvent::StartDelivery => "start_delivery",
            LifecycleEvent::Complete { .. } => "complete",
            LifecycleEvent::Fail { .. } => "fail",
            LifecycleEvent::CancelDelivery => "cancel_delivery",
            LifecycleEvent::CancelAssignment => "cancel_assignment",
        }
    }
}

/// Write to apply to the task row
#[derive(Debug, Clone, PartialEq)]
pub enum TaskChange {
    Unchanged(Option<DeliveryTask>),
    Insert(DeliveryTask),
    Update(DeliveryTask),
    Delete(DeliveryTask),
}

impl TaskChange {
    /// Task as it exists after the transition
    pub fn resulting_task(&self) -> Option<&DeliveryTask> {
        match self {
            TaskChange::Unchanged(task) => task.as_ref(),
            TaskChange::Insert(task) | TaskChange::Update(task) => Some(task),
            TaskChange::Delete(_) => None,
        }
    }
}

/// Planned outcome of one lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// None when the owning assignment no longer exists
    pub assignment: Option<Assignment>,
    pub assignment_changed: bool,
    pub task: TaskChange,
}

/// Consistency rule between an assignment and its task.
///
/// SCHEDULED requires a live, WAITING task; delivery states mirror the task;
/// CANCELLED owns nothing; PLANNED owns nothing, an unbatched WAITING task,
/// or a FAILED one awaiting cleanup.
pub fn check_consistency(assignment: &Assignment, task: Option<&DeliveryTask>) -> Result<()> {
    let status = task.map(|t| t.status);
    let consistent = match assignment.status {
        AssignmentStatus::Planned => match task {
            None => true,
            Some(t) => {
                (t.status == DeliveryStatus::Waiting && !t.in_open_batch())
                    || t.status == DeliveryStatus::Failed
            }
        },
        AssignmentStatus::Scheduled => status == Some(DeliveryStatus::Waiting),
        AssignmentStatus::OutForDelivery => status == Some(DeliveryStatus::OutForDelivery),
        AssignmentStatus::Delivered => status == Some(DeliveryStatus::Delivered),
        AssignmentStatus::Cancelled => task.is_none(),
    };

    if consistent {
        Ok(())
    } else {
        Err(DispatchError::conflict_on(
            format!(
                "assignment {} would be {} with task status {}",
                assignment.id,
                assignment.status,
                status.map_or("none", |s| s.as_str())
            ),
            task.map(|t| vec![t.id]).unwrap_or_default(),
        ))
    }
}

/// Build the WAITING task an assignment starts with.
pub fn new_task(
    assignment_id: Uuid,
    customer: &CustomerSnapshot,
    depot_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> DeliveryTask {
    DeliveryTask {
        id: Uuid::new_v4(),
        assignment_id,
        coordinate: customer.coordinate,
        status: DeliveryStatus::Waiting,
        route_batch_id: None,
        delivery_order: None,
        distance_km: None,
        estimated_arrival: None,
        scheduled_date: None,
        depot_id,
        address_snapshot: customer.address.clone(),
        phone_snapshot: customer.phone.clone(),
        delivered_at: None,
        delivered_by: None,
        failure_reason: None,
        created_at: now,
        updated_at: now,
    }
}

fn require_task(task: Option<DeliveryTask>, key_hint: &str) -> Result<DeliveryTask> {
    task.ok_or_else(|| DispatchError::not_found("delivery task", key_hint))
}

fn not_permitted(event: &LifecycleEvent, task: &DeliveryTask) -> DispatchError {
    DispatchError::conflict_on(
        format!("cannot {} task {} in status {}", event.name(), task.id, task.status),
        vec![task.id],
    )
}

fn assignment_not_permitted(event: &LifecycleEvent, assignment: &Assignment) -> DispatchError {
    DispatchError::conflict(format!(
        "cannot {} assignment {} in status {}",
        event.name(),
        assignment.id,
        assignment.status
    ))
}

/// Compute the next state of the pair for `event`.
pub fn plan(
    event: &LifecycleEvent,
    assignment: Option<Assignment>,
    task: Option<DeliveryTask>,
    now: DateTime<Utc>,
) -> Result<Transition> {
    let hint = task
        .as_ref()
        .map(|t| t.id.to_string())
        .unwrap_or_else(|| "none".to_string());

    let (assignment, task_change) = match event {
        LifecycleEvent::Schedule { date, replacement } => {
            let mut assignment = assignment.ok_or_else(|| DispatchError::not_found("assignment", &hint))?;
            if !matches!(assignment.status, AssignmentStatus::Planned | AssignmentStatus::Scheduled) {
                return Err(assignment_not_permitted(event, &assignment));
            }
            let change = match task {
                Some(mut task) => {
                    if task.status != DeliveryStatus::Waiting || task.in_open_batch() {
                        return Err(DispatchError::conflict_on(
                            format!(
                                "task {} is {} and {} an open batch",
                                task.id,
                                task.status,
                                if task.in_open_batch() { "in" } else { "not in" }
                            ),
                            vec![task.id],
                        ));
                    }
                    task.scheduled_date = Some(*date);
                    task.updated_at = now;
                    TaskChange::Update(task)
                }
                None => {
                    let mut task = replacement.clone().ok_or_else(|| {
                        DispatchError::conflict(format!(
                            "assignment {} has no delivery task to schedule",
                            assignment.id
                        ))
                    })?;
                    task.assignment_id = assignment.id;
                    task.scheduled_date = Some(*date);
                    task.updated_at = now;
                    TaskChange::Insert(task)
                }
            };
            assignment.status = AssignmentStatus::Scheduled;
            (Some(assignment), change)
        }

        LifecycleEvent::StartDelivery => {
            let mut task = require_task(task, &hint)?;
            if task.status != DeliveryStatus::Waiting {
                return Err(not_permitted(event, &task));
            }
            let assignment = match assignment {
                Some(mut a) if a.status == AssignmentStatus::Scheduled => {
                    a.status = AssignmentStatus::OutForDelivery;
                    Some(a)
                }
                Some(a) => return Err(assignment_not_permitted(event, &a)),
                None => None,
            };
            task.status = DeliveryStatus::OutForDelivery;
            task.updated_at = now;
            (assignment, TaskChange::Update(task))
        }

        LifecycleEvent::Complete { actor } => {
            let mut task = require_task(task, &hint)?;
            if task.status != DeliveryStatus::OutForDelivery {
                return Err(not_permitted(event, &task));
            }
            let assignment = match assignment {
                Some(mut a) if a.status == AssignmentStatus::OutForDelivery => {
                    a.status = AssignmentStatus::Delivered;
                    Some(a)
                }
                Some(a) => return Err(assignment_not_permitted(event, &a)),
                None => None,
            };
            task.status = DeliveryStatus::Delivered;
            task.delivered_at = Some(now);
            task.delivered_by = Some(actor.clone());
            task.updated_at = now;
            (assignment, TaskChange::Update(task))
        }

        LifecycleEvent::Fail { reason } => {
            let mut task = require_task(task, &hint)?;
            if !matches!(task.status, DeliveryStatus::Waiting | DeliveryStatus::OutForDelivery) {
                return Err(not_permitted(event, &task));
            }
            task.status = DeliveryStatus::Failed;
            task.failure_reason = reason.clone();
            task.updated_at = now;
            let assignment = assignment.map(|mut a| {
                if !a.status.is_terminal() {
                    a.status = AssignmentStatus::Planned;
                }
                a
            });
            (assignment, TaskChange::Update(task))
        }

        LifecycleEvent::CancelDelivery => {
            let task = require_task(task, &hint)?;
            if task.status == DeliveryStatus::Delivered {
                return Err(not_permitted(event, &task));
            }
            let assignment = assignment.map(|mut a| {
                if !a.status.is_terminal() {
                    a.status = AssignmentStatus::Planned;
                }
                a
            });
            (assignment, TaskChange::Delete(task))
        }

        LifecycleEvent::CancelAssignment => {
            let mut assignment = assignment.ok_or_else(|| DispatchError::not_found("assignment", &hint))?;
            if !matches!(assignment.status, AssignmentStatus::Planned | AssignmentStatus::Scheduled) {
                return Err(assignment_not_permitted(event, &assignment));
            }
            let change = match task {
                None => TaskChange::Unchanged(None),
                Some(task)
                    if task.status == DeliveryStatus::Failed
                        || (task.status == DeliveryStatus::Waiting && !task.in_open_batch()) =>
                {
                    TaskChange::Delete(task)
                }
                Some(task) => {
                    return Err(DispatchError::conflict_on(
                        format!("task {} is still routed or underway", task.id),
                        vec![task.id],
                    ))
                }
            };
            assignment.status = AssignmentStatus::Cancelled;
            (Some(assignment), change)
        }
    };

    let assignment = assignment.map(|mut a| {
        a.updated_at = now;
        a
    });
    if let Some(a) = &assignment {
        check_consistency(a, task_change.resulting_task())?;
    }

    Ok(Transition {
        assignment_changed: assignment.is_some(),
        assignment,
        task: task_change,
    })
}

/// Lifecycle operations over the store
pub struct DeliveryLifecycle {
    store: Arc<dyn DispatchStore>,
    clock: Arc<dyn Clock>,
}

impl DeliveryLifecycle {
    pub fn new(store: Arc<dyn DispatchStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn customer(&self, customer_id: Uuid) -> Result<CustomerSnapshot> {
        self.store
            .get_customer(customer_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("customer", customer_id))
    }

    async fn default_depot_id(&self) -> Result<Option<Uuid>> {
        Ok(self.store.get_default_depot().await?.map(|d| d.id))
    }

    /// Create an assignment in PLANNED together with its WAITING task.
    pub async fn create_assignment(&self, req: CreateAssignmentRequest) -> Result<AssignmentWithDelivery> {
        if req.product.trim().is_empty() {
            return Err(DispatchError::Validation("product is required".into()));
        }
        if req.quantity < 1 {
            return Err(DispatchError::invalid_parameter("quantity", "must be at least 1"));
        }

        let customer = self.customer(req.customer_id).await?;
        let depot_id = self.default_depot_id().await?;
        let now = self.clock.now();

        let assignment = Assignment {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            product: req.product,
            quantity: req.quantity,
            status: AssignmentStatus::Planned,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };
        let task = new_task(assignment.id, &customer, depot_id, now);
        check_consistency(&assignment, Some(&task))?;

        self.store.insert_assignment(&assignment, &task).await?;
        if task.coordinate.is_none() {
            warn!("Customer {} has no coordinates; task {} cannot be routed yet", customer.id, task.id);
        }
        info!("Created assignment {} with delivery task {}", assignment.id, task.id);

        Ok(AssignmentWithDelivery {
            assignment,
            delivery: Some(task),
        })
    }

    pub async fn get_assignment(&self, assignment_id: Uuid) -> Result<AssignmentWithDelivery> {
        let assignment = self
            .store
            .get_assignment(assignment_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("assignment", assignment_id))?;
        let delivery = self.store.get_task_for_assignment(assignment_id).await?;
        Ok(AssignmentWithDelivery { assignment, delivery })
    }

    async fn apply(&self, key: TransitionKey, event: LifecycleEvent) -> Result<Transition> {
        let name = event.name();
        let transition = self.store.apply_transition(key, &event, self.clock.now()).await?;
        info!("Applied {} to {:?}", name, key);
        Ok(transition)
    }

    fn into_pair(transition: Transition, assignment_id: Uuid) -> Result<AssignmentWithDelivery> {
        let delivery = transition.task.resulting_task().cloned();
        let assignment = transition
            .assignment
            .ok_or_else(|| DispatchError::not_found("assignment", assignment_id))?;
        Ok(AssignmentWithDelivery { assignment, delivery })
    }

    /// PLANNED -> SCHEDULED for `date`; re-snapshots a task if the previous one was cancelled.
    pub async fn schedule(&self, assignment_id: Uuid, date: NaiveDate) -> Result<AssignmentWithDelivery> {
        let current = self.get_assignment(assignment_id).await?;
        let replacement = match current.delivery {
            Some(_) => None,
            None => {
                let customer = self.customer(current.assignment.customer_id).await?;
                let depot_id = self.default_depot_id().await?;
                Some(new_task(assignment_id, &customer, depot_id, self.clock.now()))
            }
        };

        let transition = self
            .apply(
                TransitionKey::Assignment(assignment_id),
                LifecycleEvent::Schedule { date, replacement },
            )
            .await?;
        Self::into_pair(transition, assignment_id)
    }

    pub async fn start_delivery(&self, task_id: Uuid) -> Result<DeliveryTask> {
        let transition = self.apply(TransitionKey::Task(task_id), LifecycleEvent::StartDelivery).await?;
        if transition.assignment.is_none() {
            warn!("Task {} started without an owning assignment", task_id);
        }
        transition
            .task
            .resulting_task()
            .cloned()
            .ok_or_else(|| DispatchError::not_found("delivery task", task_id))
    }

    pub async fn complete_delivery(&self, task_id: Uuid, actor: String) -> Result<DeliveryTask> {
        if actor.trim().is_empty() {
            return Err(DispatchError::Validation("completedBy is required".into()));
        }
        let transition = self
            .apply(TransitionKey::Task(task_id), LifecycleEvent::Complete { actor })
            .await?;
        if transition.assignment.is_none() {
            warn!("Task {} completed without an owning assignment", task_id);
        }
        transition
            .task
            .resulting_task()
            .cloned()
            .ok_or_else(|| DispatchError::not_found("delivery task", task_id))
    }

    pub async fn fail_delivery(&self, task_id: Uuid, reason: Option<String>) -> Result<DeliveryTask> {
        let transition = self
            .apply(TransitionKey::Task(task_id), LifecycleEvent::Fail { reason })
            .await?;
        transition
            .task
            .resulting_task()
            .cloned()
            .ok_or_else(|| DispatchError::not_found("delivery task", task_id))
    }

    /// Delete the task and revert its assignment to PLANNED. A missing
    /// assignment does not block the deletion.
    pub async fn cancel_delivery(&self, task_id: Uuid) -> Result<CancelDeliveryResponse> {
        let transition = self
            .apply(TransitionKey::Task(task_id), LifecycleEvent::CancelDelivery)
            .await?;
        let assignment_id = match &transition.task {
            TaskChange::Delete(task) => task.assignment_id,
            _ => return Err(DispatchError::Internal(format!("task {task_id} was not deleted"))),
        };
        let assignment_reverted = transition.assignment.is_some();
        if !assignment_reverted {
            warn!(
                "Deleted task {} but assignment {} no longer exists; nothing to revert",
                task_id, assignment_id
            );
        }
        Ok(CancelDeliveryResponse {
            task_id,
            assignment_id,
            assignment_reverted,
        })
    }

    pub async fn cancel_assignment(&self, assignment_id: Uuid) -> Result<AssignmentWithDelivery> {
        let transition = self
            .apply(TransitionKey::Assignment(assignment_id), LifecycleEvent::CancelAssignment)
            .await?;
        Self::into_pair(transition, assignment_id)
    }

    pub async fn list_deliveries(&self, filter: &ListDeliveriesRequest) -> Result<Vec<DeliveryTask>> {
        self.store.list_tasks(filter).await
    }

    /// Counts for the dashboard; `date` defaults to today.
    pub async fn delivery_stats(&self, req: &DeliveryStatsRequest) -> Result<DeliveryStatsResponse> {
        let now = self.clock.now();
        let req = DeliveryStatsRequest {
            date: Some(req.date.unwrap_or_else(|| now.date_naive())),
            depot_id: req.depot_id,
        };
        let since = now - Duration::days(DELIVERED_STATS_WINDOW_DAYS);
        self.store.delivery_stats(&req, since).await
    }

    pub async fn assignment_stats(&self) -> Result<AssignmentStatsResponse> {
        self.store.assignment_stats().await
    }
}
