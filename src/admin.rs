//! One-shot depot administration for the command line.

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::services::depots::DepotRegistry;
use crate::types::{CreateDepotRequest, Depot};

fn describe(depot: &Depot) -> String {
    let marker = if depot.is_default { " [default]" } else { "" };
    format!(
        "{} {} ({:.5}, {:.5}){}",
        depot.id, depot.name, depot.lat, depot.lng, marker
    )
}

/// Create a depot, optionally making it the default.
pub async fn add_depot(
    depots: &DepotRegistry,
    name: String,
    lat: f64,
    lng: f64,
    make_default: bool,
) -> Result<Depot> {
    let depot = depots
        .create(CreateDepotRequest {
            name,
            lat,
            lng,
            is_default: Some(make_default),
        })
        .await
        .context("Failed to create depot")?;

    println!("Depot created: {}", describe(&depot));
    Ok(depot)
}

/// Point the default depot at `id`.
pub async fn set_default_depot(depots: &DepotRegistry, id: Uuid) -> Result<Depot> {
    let depot = depots
        .set_default(id)
        .await
        .with_context(|| format!("Failed to set default depot {id}"))?;

    println!("Default depot: {}", describe(&depot));
    Ok(depot)
}

/// Print every depot, default first.
pub async fn list_depots(depots: &DepotRegistry) -> Result<Vec<Depot>> {
    let mut all = depots.list().await.context("Failed to list depots")?;
    all.sort_by_key(|d| !d.is_default);

    if all.is_empty() {
        println!("No depots configured");
    }
    for depot in &all {
        println!("{}", describe(depot));
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::MemoryStore;

    fn registry() -> DepotRegistry {
        DepotRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_add_then_switch_default() {
        let depots = registry();
        let first = add_depot(&depots, "Nicosia".into(), 35.1856, 33.3823, true)
            .await
            .unwrap();
        let second = add_depot(&depots, "Limassol".into(), 34.6786, 33.0413, false)
            .await
            .unwrap();
        assert!(first.is_default);

        set_default_depot(&depots, second.id).await.unwrap();
        let listed = list_depots(&depots).await.unwrap();
        assert_eq!(listed[0].id, second.id);
        assert!(!listed[1].is_default);
    }

    #[tokio::test]
    async fn test_set_default_unknown_depot_fails() {
        let depots = registry();
        assert!(set_default_depot(&depots, Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_add_depot_rejects_bad_coordinate() {
        let depots = registry();
        assert!(add_depot(&depots, "Nowhere".into(), 123.0, 0.0, false).await.is_err());
    }

    #[test]
    fn test_describe_marks_default() {
        let depot = Depot {
            id: Uuid::nil(),
            name: "Main".into(),
            lat: 35.1856,
            lng: 33.3823,
            is_default: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        assert!(describe(&depot).ends_with("[default]"));
    }
}
