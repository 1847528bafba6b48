//! Depot database queries

use sqlx::{PgConnection, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{CreateDepotRequest, Depot, UpdateDepotRequest};

const DEPOT_COLUMNS: &str = "id, name, lat, lng, is_default, created_at, updated_at";

/// List all depots, default first
pub async fn list_depots<'e>(ex: impl PgExecutor<'e>) -> Result<Vec<Depot>> {
    let depots = sqlx::query_as::<_, Depot>(&format!(
        "SELECT {DEPOT_COLUMNS} FROM depots ORDER BY is_default DESC, name ASC"
    ))
    .fetch_all(ex)
    .await?;

    Ok(depots)
}

/// Get a single depot
pub async fn get_depot<'e>(ex: impl PgExecutor<'e>, depot_id: Uuid) -> Result<Option<Depot>> {
    let depot = sqlx::query_as::<_, Depot>(&format!(
        "SELECT {DEPOT_COLUMNS} FROM depots WHERE id = $1"
    ))
    .bind(depot_id)
    .fetch_optional(ex)
    .await?;

    Ok(depot)
}

/// Get the default depot
pub async fn get_default_depot<'e>(ex: impl PgExecutor<'e>) -> Result<Option<Depot>> {
    let depot = sqlx::query_as::<_, Depot>(&format!(
        "SELECT {DEPOT_COLUMNS} FROM depots WHERE is_default = true"
    ))
    .fetch_optional(ex)
    .await?;

    Ok(depot)
}

/// Unset the default flag everywhere except `keep`
pub async fn clear_default(conn: &mut PgConnection, keep: Option<Uuid>) -> Result<()> {
    sqlx::query(
        "UPDATE depots SET is_default = false, updated_at = NOW()
         WHERE is_default = true AND ($1::uuid IS NULL OR id <> $1)",
    )
    .bind(keep)
    .execute(conn)
    .await?;

    Ok(())
}

/// Create a new depot. The caller clears any existing default first.
pub async fn create_depot(conn: &mut PgConnection, req: &CreateDepotRequest) -> Result<Depot> {
    let depot = sqlx::query_as::<_, Depot>(&format!(
        r#"
        INSERT INTO depots (id, name, lat, lng, is_default)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {DEPOT_COLUMNS}
        "#
    ))
    .bind(Uuid::new_v4())
    .bind(&req.name)
    .bind(req.lat)
    .bind(req.lng)
    .bind(req.is_default.unwrap_or(false))
    .fetch_one(conn)
    .await?;

    Ok(depot)
}

/// Update a depot
pub async fn update_depot(conn: &mut PgConnection, req: &UpdateDepotRequest) -> Result<Option<Depot>> {
    let depot = sqlx::query_as::<_, Depot>(&format!(
        r#"
        UPDATE depots SET
            name = COALESCE($2, name),
            lat = COALESCE($3, lat),
            lng = COALESCE($4, lng),
            is_default = COALESCE($5, is_default),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {DEPOT_COLUMNS}
        "#
    ))
    .bind(req.id)
    .bind(&req.name)
    .bind(req.lat)
    .bind(req.lng)
    .bind(req.is_default)
    .fetch_optional(conn)
    .await?;

    Ok(depot)
}

/// Mark one depot as default
pub async fn mark_default(conn: &mut PgConnection, depot_id: Uuid) -> Result<Option<Depot>> {
    let depot = sqlx::query_as::<_, Depot>(&format!(
        "UPDATE depots SET is_default = true, updated_at = NOW() WHERE id = $1 RETURNING {DEPOT_COLUMNS}"
    ))
    .bind(depot_id)
    .fetch_optional(conn)
    .await?;

    Ok(depot)
}

/// Delete a depot
pub async fn delete_depot<'e>(ex: impl PgExecutor<'e>, depot_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM depots WHERE id = $1")
        .bind(depot_id)
        .execute(ex)
        .await?;

    Ok(result.rows_affected() > 0)
}
