//! Depot registry: route origins and the default depot

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::db::DispatchStore;
use crate::error::{DispatchError, Result};
use crate::types::{Coordinate, CreateDepotRequest, Depot, UpdateDepotRequest};

pub struct DepotRegistry {
    store: Arc<dyn DispatchStore>,
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DispatchError::Validation("depot name is required".into()));
    }
    Ok(name.to_string())
}

impl DepotRegistry {
    pub fn new(store: Arc<dyn DispatchStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, req: CreateDepotRequest) -> Result<Depot> {
        let name = normalize_name(&req.name)?;
        Coordinate::new(req.lat, req.lng)?;

        let depot = self
            .store
            .create_depot(&CreateDepotRequest { name, ..req })
            .await?;
        info!("Created depot {} ({}), default: {}", depot.name, depot.id, depot.is_default);
        Ok(depot)
    }

    pub async fn update(&self, req: UpdateDepotRequest) -> Result<Depot> {
        let id = req.id;
        let name = req.name.as_deref().map(normalize_name).transpose()?;

        let current = self.get(id).await?;
        Coordinate::new(req.lat.unwrap_or(current.lat), req.lng.unwrap_or(current.lng))?;
        if req.is_default == Some(false) && current.is_default {
            return Err(DispatchError::Validation(
                "set another depot as default instead of clearing the flag".into(),
            ));
        }

        self.store
            .update_depot(&UpdateDepotRequest { name, ..req })
            .await?
            .ok_or_else(|| DispatchError::not_found("depot", id))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete_depot(id).await? {
            return Err(DispatchError::not_found("depot", id));
        }
        info!("Deleted depot {}", id);
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Depot> {
        self.store
            .get_depot(id)
            .await?
            .ok_or_else(|| DispatchError::not_found("depot", id))
    }

    pub async fn list(&self) -> Result<Vec<Depot>> {
        self.store.list_depots().await
    }

    pub async fn default_depot(&self) -> Result<Option<Depot>> {
        self.store.get_default_depot().await
    }

    /// Make `id` the only default depot.
    pub async fn set_default(&self, id: Uuid) -> Result<Depot> {
        let depot = self
            .store
            .set_default_depot(id)
            .await?
            .ok_or_else(|| DispatchError::not_found("depot", id))?;
        info!("Default depot is now {} ({})", depot.name, depot.id);
        Ok(depot)
    }

    /// The explicit depot if given, else the default one.
    pub async fn resolve(&self, id: Option<Uuid>) -> Result<Depot> {
        match id {
            Some(id) => self.get(id).await,
            None => self
                .default_depot()
                .await?
                .ok_or_else(|| DispatchError::not_found("depot", "default")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn registry() -> DepotRegistry {
        DepotRegistry::new(Arc::new(MemoryStore::new()))
    }

    fn req(name: &str, is_default: bool) -> CreateDepotRequest {
        CreateDepotRequest {
            name: name.into(),
            lat: 35.1856,
            lng: 33.3823,
            is_default: Some(is_default),
        }
    }

    #[tokio::test]
    async fn test_create_validates_name_and_coordinate() {
        let registry = registry();
        assert!(matches!(
            registry.create(req("   ", false)).await,
            Err(DispatchError::Validation(_))
        ));
        let mut bad = req("North", false);
        bad.lat = 91.0;
        assert!(matches!(
            registry.create(bad).await,
            Err(DispatchError::InvalidCoordinate { .. })
        ));
        let created = registry.create(req("  North ", false)).await.unwrap();
        assert_eq!(created.name, "North");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_default() {
        let registry = registry();
        assert!(matches!(
            registry.resolve(None).await,
            Err(DispatchError::NotFound { .. })
        ));

        let main = registry.create(req("Main", true)).await.unwrap();
        let other = registry.create(req("Other", false)).await.unwrap();

        assert_eq!(registry.resolve(None).await.unwrap().id, main.id);
        assert_eq!(registry.resolve(Some(other.id)).await.unwrap().id, other.id);
        assert!(registry.resolve(Some(Uuid::new_v4())).await.is_err());
    }

    #[tokio::test]
    async fn test_set_default_moves_flag() {
        let registry = registry();
        let main = registry.create(req("Main", true)).await.unwrap();
        let other = registry.create(req("Other", false)).await.unwrap();

        registry.set_default(other.id).await.unwrap();

        assert!(!registry.get(main.id).await.unwrap().is_default);
        assert_eq!(registry.default_depot().await.unwrap().unwrap().id, other.id);
        assert!(registry.set_default(Uuid::new_v4()).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let registry = registry();
        let depot = registry.create(req("Main", true)).await.unwrap();

        let updated = registry
            .update(UpdateDepotRequest {
                id: depot.id,
                name: Some("Central".into()),
                lat: Some(35.2),
                lng: None,
                is_default: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.name, "Central");
        assert_eq!(updated.lat, 35.2);
        assert_eq!(updated.lng, depot.lng);

        assert!(registry
            .update(UpdateDepotRequest {
                id: depot.id,
                name: None,
                lat: None,
                lng: None,
                is_default: Some(false),
            })
            .await
            .is_err());

        registry.delete(depot.id).await.unwrap();
        assert!(matches!(
            registry.delete(depot.id).await,
            Err(DispatchError::NotFound { .. })
        ));
    }
}
