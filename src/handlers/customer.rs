//! Customer directory message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};

use super::serve;
use crate::error::{self, DispatchError};
use crate::services::DispatchServices;
use crate::types::CustomerSnapshot;

fn validate_customer(customer: &CustomerSnapshot) -> error::Result<()> {
    if customer.name.trim().is_empty() {
        return Err(DispatchError::Validation("customer name is required".into()));
    }
    if let Some(coordinate) = &customer.coordinate {
        coordinate.validate()?;
    }
    Ok(())
}

/// Handle customer.upsert messages
///
/// Stores the snapshot that later assignments copy onto their delivery task.
pub async fn handle_upsert(
    client: Client,
    subscriber: Subscriber,
    services: Arc<DispatchServices>,
) -> Result<()> {
    serve(client, subscriber, "customer.upsert", |customer: CustomerSnapshot| {
        let services = services.clone();
        async move {
            validate_customer(&customer)?;
            services.store.upsert_customer(&customer).await?;
            Ok::<_, DispatchError>(customer)
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Coordinate;
    use uuid::Uuid;

    fn customer(name: &str, coordinate: Option<Coordinate>) -> CustomerSnapshot {
        CustomerSnapshot {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: None,
            address: "Ledra St 12".into(),
            coordinate,
        }
    }

    #[test]
    fn test_blank_name_is_rejected() {
        let err = validate_customer(&customer("  ", None)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_missing_coordinate_is_allowed() {
        assert!(validate_customer(&customer("Eleni", None)).is_ok());
    }

    #[test]
    fn test_out_of_range_coordinate_is_rejected() {
        let bad = Coordinate { lat: 91.0, lng: 33.0 };
        let err = validate_customer(&customer("Eleni", Some(bad))).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCoordinate { .. }));
    }
}
