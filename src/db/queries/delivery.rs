//! Delivery task database queries

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    Coordinate, DeliveryStatsRequest, DeliveryStatsResponse, DeliveryStatus, DeliveryTask,
    ListDeliveriesRequest, RouteStop,
};

const TASK_COLUMNS: &str = r#"
    id, assignment_id, lat, lng, status, route_batch_id, delivery_order,
    distance_km, estimated_arrival, scheduled_date, depot_id,
    address_snapshot, phone_snapshot, delivered_at, delivered_by,
    failure_reason, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    assignment_id: Uuid,
    lat: Option<f64>,
    lng: Option<f64>,
    status: DeliveryStatus,
    route_batch_id: Option<String>,
    delivery_order: Option<i32>,
    distance_km: Option<f64>,
    estimated_arrival: Option<DateTime<Utc>>,
    scheduled_date: Option<NaiveDate>,
    depot_id: Option<Uuid>,
    address_snapshot: String,
    phone_snapshot: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    delivered_by: Option<String>,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for DeliveryTask {
    fn from(row: TaskRow) -> Self {
        DeliveryTask {
            id: row.id,
            assignment_id: row.assignment_id,
            coordinate: Coordinate::from_parts(row.lat, row.lng),
            status: row.status,
            route_batch_id: row.route_batch_id,
            delivery_order: row.delivery_order,
            distance_km: row.distance_km,
            estimated_arrival: row.estimated_arrival,
            scheduled_date: row.scheduled_date,
            depot_id: row.depot_id,
            address_snapshot: row.address_snapshot,
            phone_snapshot: row.phone_snapshot,
            delivered_at: row.delivered_at,
            delivered_by: row.delivered_by,
            failure_reason: row.failure_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn into_tasks(rows: Vec<TaskRow>) -> Vec<DeliveryTask> {
    rows.into_iter().map(DeliveryTask::from).collect()
}

pub async fn insert_task<'e>(ex: impl PgExecutor<'e>, task: &DeliveryTask) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO delivery_tasks (
            id, assignment_id, lat, lng, status, route_batch_id, delivery_order,
            distance_km, estimated_arrival, scheduled_date, depot_id,
            address_snapshot, phone_snapshot, delivered_at, delivered_by,
            failure_reason, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(task.id)
    .bind(task.assignment_id)
    .bind(task.coordinate.map(|c| c.lat))
    .bind(task.coordinate.map(|c| c.lng))
    .bind(task.status)
    .bind(&task.route_batch_id)
    .bind(task.delivery_order)
    .bind(task.distance_km)
    .bind(task.estimated_arrival)
    .bind(task.scheduled_date)
    .bind(task.depot_id)
    .bind(&task.address_snapshot)
    .bind(&task.phone_snapshot)
    .bind(task.delivered_at)
    .bind(&task.delivered_by)
    .bind(&task.failure_reason)
    .bind(task.created_at)
    .bind(task.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

/// Write the mutable lifecycle fields of a task
pub async fn update_task(conn: &mut PgConnection, task: &DeliveryTask) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE delivery_tasks SET
            status = $2,
            route_batch_id = $3,
            delivery_order = $4,
            distance_km = $5,
            estimated_arrival = $6,
            scheduled_date = $7,
            depot_id = $8,
            delivered_at = $9,
            delivered_by = $10,
            failure_reason = $11,
            updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(task.id)
    .bind(task.status)
    .bind(&task.route_batch_id)
    .bind(task.delivery_order)
    .bind(task.distance_km)
    .bind(task.estimated_arrival)
    .bind(task.scheduled_date)
    .bind(task.depot_id)
    .bind(task.delivered_at)
    .bind(&task.delivered_by)
    .bind(&task.failure_reason)
    .bind(task.updated_at)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn delete_task(conn: &mut PgConnection, task_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM delivery_tasks WHERE id = $1")
        .bind(task_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn get_task<'e>(ex: impl PgExecutor<'e>, id: Uuid) -> Result<Option<DeliveryTask>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM delivery_tasks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(row.map(DeliveryTask::from))
}

pub async fn lock_task(conn: &mut PgConnection, id: Uuid) -> Result<Option<DeliveryTask>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM delivery_tasks WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(DeliveryTask::from))
}

pub async fn get_task_for_assignment<'e>(
    ex: impl PgExecutor<'e>,
    assignment_id: Uuid,
) -> Result<Option<DeliveryTask>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM delivery_tasks WHERE assignment_id = $1"
    ))
    .bind(assignment_id)
    .fetch_optional(ex)
    .await?;

    Ok(row.map(DeliveryTask::from))
}

pub async fn lock_task_for_assignment(
    conn: &mut PgConnection,
    assignment_id: Uuid,
) -> Result<Option<DeliveryTask>> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM delivery_tasks WHERE assignment_id = $1 FOR UPDATE"
    ))
    .bind(assignment_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(DeliveryTask::from))
}

/// List tasks filtered by scheduled date and status
pub async fn list_tasks<'e>(
    ex: impl PgExecutor<'e>,
    filter: &ListDeliveriesRequest,
) -> Result<Vec<DeliveryTask>> {
    let rows = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM delivery_tasks
        WHERE ($1::date IS NULL OR scheduled_date = $1)
          AND ($2::delivery_status IS NULL OR status = $2)
        ORDER BY route_batch_id NULLS FIRST, delivery_order NULLS FIRST, created_at, id
        "#
    ))
    .bind(filter.date)
    .bind(filter.status)
    .fetch_all(ex)
    .await?;

    Ok(into_tasks(rows))
}

/// Unbatched WAITING tasks scheduled for `date`, oldest first
pub async fn select_unbatched<'e>(ex: impl PgExecutor<'e>, date: NaiveDate) -> Result<Vec<DeliveryTask>> {
    let rows = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM delivery_tasks
        WHERE scheduled_date = $1
          AND status = 'WAITING'
          AND route_batch_id IS NULL
        ORDER BY created_at, id
        "#
    ))
    .bind(date)
    .fetch_all(ex)
    .await?;

    Ok(into_tasks(rows))
}

/// WAITING tasks among `ids` scheduled for `date`, in no particular order
pub async fn select_by_ids<'e>(
    ex: impl PgExecutor<'e>,
    date: NaiveDate,
    ids: &[Uuid],
) -> Result<Vec<DeliveryTask>> {
    let rows = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM delivery_tasks
        WHERE id = ANY($1)
          AND scheduled_date = $2
          AND status = 'WAITING'
        "#
    ))
    .bind(ids)
    .bind(date)
    .fetch_all(ex)
    .await?;

    Ok(into_tasks(rows))
}

/// Lock tasks in id order so concurrent commits cannot deadlock
pub async fn lock_tasks(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<DeliveryTask>> {
    let rows = sqlx::query_as::<_, TaskRow>(&format!(
        "SELECT {TASK_COLUMNS} FROM delivery_tasks WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    ))
    .bind(ids)
    .fetch_all(conn)
    .await?;

    Ok(into_tasks(rows))
}

/// Claim a task for a batch. Returns false if another writer got there first.
pub async fn claim_task(
    conn: &mut PgConnection,
    batch_id: &str,
    depot_id: Uuid,
    stop: &RouteStop,
    at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE delivery_tasks SET
            route_batch_id = $2,
            delivery_order = $3,
            distance_km = $4,
            estimated_arrival = $5,
            depot_id = $6,
            updated_at = $7
        WHERE id = $1
          AND status = 'WAITING'
          AND route_batch_id IS NULL
        "#,
    )
    .bind(stop.task_id)
    .bind(batch_id)
    .bind(stop.order)
    .bind(stop.distance_from_previous_km)
    .bind(stop.estimated_arrival)
    .bind(depot_id)
    .bind(at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Clear batch fields on the batch's tasks that are still WAITING
pub async fn release_waiting(
    conn: &mut PgConnection,
    batch_id: &str,
    at: DateTime<Utc>,
) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        r#"
        UPDATE delivery_tasks SET
            route_batch_id = NULL,
            delivery_order = NULL,
            distance_km = NULL,
            estimated_arrival = NULL,
            updated_at = $2
        WHERE route_batch_id = $1
          AND status = 'WAITING'
        RETURNING id
        "#,
    )
    .bind(batch_id)
    .bind(at)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Dashboard counters
pub async fn delivery_stats<'e>(
    ex: impl PgExecutor<'e>,
    req: &DeliveryStatsRequest,
    since: DateTime<Utc>,
) -> Result<DeliveryStatsResponse> {
    let (waiting_count, delivered_last_10_days_count, scheduled_for_selected_date_count): (i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status IN ('WAITING', 'OUT_FOR_DELIVERY')),
                COUNT(*) FILTER (WHERE status = 'DELIVERED' AND delivered_at >= $2),
                COUNT(*) FILTER (WHERE $3::date IS NOT NULL AND scheduled_date = $3)
            FROM delivery_tasks
            WHERE ($1::uuid IS NULL OR depot_id = $1)
            "#,
        )
        .bind(req.depot_id)
        .bind(since)
        .bind(req.date)
        .fetch_one(ex)
        .await?;

    Ok(DeliveryStatsResponse {
        waiting_count,
        delivered_last_10_days_count,
        scheduled_for_selected_date_count,
    })
}
