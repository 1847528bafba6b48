//! Assignment database queries

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Assignment, AssignmentStatsResponse, AssignmentStatus};

const ASSIGNMENT_COLUMNS: &str =
    "id, customer_id, product, quantity, status, notes, created_at, updated_at";

pub async fn insert_assignment<'e>(ex: impl PgExecutor<'e>, assignment: &Assignment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO assignments (id, customer_id, product, quantity, status, notes, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(assignment.id)
    .bind(assignment.customer_id)
    .bind(&assignment.product)
    .bind(assignment.quantity)
    .bind(assignment.status)
    .bind(&assignment.notes)
    .bind(assignment.created_at)
    .bind(assignment.updated_at)
    .execute(ex)
    .await?;

    Ok(())
}

pub async fn get_assignment<'e>(ex: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Assignment>> {
    let assignment = sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(assignment)
}

/// Lock the assignment row for the rest of the transaction
pub async fn lock_assignment(conn: &mut PgConnection, id: Uuid) -> Result<Option<Assignment>> {
    let assignment = sqlx::query_as::<_, Assignment>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(assignment)
}

pub async fn update_status(conn: &mut PgConnection, assignment: &Assignment) -> Result<()> {
    sqlx::query("UPDATE assignments SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(assignment.id)
        .bind(assignment.status)
        .bind(assignment.updated_at)
        .execute(conn)
        .await?;

    Ok(())
}

/// Count assignments per status
pub async fn assignment_stats<'e>(ex: impl PgExecutor<'e>) -> Result<AssignmentStatsResponse> {
    let rows: Vec<(AssignmentStatus, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM assignments GROUP BY status")
            .fetch_all(ex)
            .await?;

    let mut stats = AssignmentStatsResponse::default();
    for (status, count) in rows {
        stats.add(status, count);
    }
    Ok(stats)
}
