//! Route batch database queries

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{RouteBatch, RouteStop};

#[derive(Debug, FromRow)]
struct BatchRow {
    id: String,
    depot_id: Uuid,
    date: NaiveDate,
    algorithm: String,
    total_distance_km: f64,
    created_at: DateTime<Utc>,
    released_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct StopRow {
    task_id: Uuid,
    stop_order: i32,
    distance_from_previous_km: f64,
    estimated_arrival: Option<DateTime<Utc>>,
}

impl From<StopRow> for RouteStop {
    fn from(row: StopRow) -> Self {
        RouteStop {
            task_id: row.task_id,
            order: row.stop_order,
            distance_from_previous_km: row.distance_from_previous_km,
            estimated_arrival: row.estimated_arrival,
        }
    }
}

/// Insert the batch header. Returns false if the id is already taken.
pub async fn insert_batch(conn: &mut PgConnection, batch: &RouteBatch) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO route_batches (id, depot_id, date, algorithm, total_distance_km, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&batch.id)
    .bind(batch.depot_id)
    .bind(batch.date)
    .bind(&batch.algorithm)
    .bind(batch.total_distance_km)
    .bind(batch.created_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_stop(conn: &mut PgConnection, batch_id: &str, stop: &RouteStop) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_stops (batch_id, stop_order, task_id, distance_from_previous_km, estimated_arrival)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(batch_id)
    .bind(stop.order)
    .bind(stop.task_id)
    .bind(stop.distance_from_previous_km)
    .bind(stop.estimated_arrival)
    .execute(conn)
    .await?;

    Ok(())
}

/// Load a batch with its stops in route order
pub async fn get_batch(conn: &mut PgConnection, id: &str) -> Result<Option<RouteBatch>> {
    let Some(row) = sqlx::query_as::<_, BatchRow>(
        r#"
        SELECT id, depot_id, date, algorithm, total_distance_km, created_at, released_at
        FROM route_batches
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let stops = sqlx::query_as::<_, StopRow>(
        r#"
        SELECT task_id, stop_order, distance_from_previous_km, estimated_arrival
        FROM route_stops
        WHERE batch_id = $1
        ORDER BY stop_order ASC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(RouteBatch {
        id: row.id,
        depot_id: row.depot_id,
        date: row.date,
        algorithm: row.algorithm,
        stops: stops.into_iter().map(RouteStop::from).collect(),
        total_distance_km: row.total_distance_km,
        created_at: row.created_at,
        released_at: row.released_at,
    }))
}

/// Lock the batch header; returns its `released_at` if the batch exists
pub async fn lock_batch(
    conn: &mut PgConnection,
    id: &str,
) -> Result<Option<Option<DateTime<Utc>>>> {
    let row: Option<(Option<DateTime<Utc>>,)> =
        sqlx::query_as("SELECT released_at FROM route_batches WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(conn)
            .await?;

    Ok(row.map(|(released_at,)| released_at))
}

pub async fn mark_released<'e>(ex: impl PgExecutor<'e>, id: &str, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE route_batches SET released_at = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(ex)
        .await?;

    Ok(())
}
