//! Customer directory queries

use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Coordinate, CustomerSnapshot};

#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    phone: Option<String>,
    address: String,
    lat: Option<f64>,
    lng: Option<f64>,
}

impl From<CustomerRow> for CustomerSnapshot {
    fn from(row: CustomerRow) -> Self {
        CustomerSnapshot {
            id: row.id,
            name: row.name,
            phone: row.phone,
            address: row.address,
            coordinate: Coordinate::from_parts(row.lat, row.lng),
        }
    }
}

/// Insert or refresh a customer record
pub async fn upsert_customer<'e>(ex: impl PgExecutor<'e>, customer: &CustomerSnapshot) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO customers (id, name, phone, address, lat, lng)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            phone = EXCLUDED.phone,
            address = EXCLUDED.address,
            lat = EXCLUDED.lat,
            lng = EXCLUDED.lng,
            updated_at = NOW()
        "#,
    )
    .bind(customer.id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(&customer.address)
    .bind(customer.coordinate.map(|c| c.lat))
    .bind(customer.coordinate.map(|c| c.lng))
    .execute(ex)
    .await?;

    Ok(())
}

/// Get a customer by id
pub async fn get_customer<'e>(ex: impl PgExecutor<'e>, id: Uuid) -> Result<Option<CustomerSnapshot>> {
    let row = sqlx::query_as::<_, CustomerRow>(
        "SELECT id, name, phone, address, lat, lng FROM customers WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(ex)
    .await?;

    Ok(row.map(CustomerSnapshot::from))
}
