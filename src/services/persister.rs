//! Batch persistence
//!
//! Turns an optimized route into a committed batch. The store claims every
//! task atomically; this layer owns id generation and collision retries.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::DispatchStore;
use crate::defaults::BATCH_ID_ATTEMPTS;
use crate::error::{DispatchError, Result};
use crate::services::batch_id::{BatchIdGenerator, Clock};
use crate::services::optimizer::{Algorithm, OptimizedRoute};
use crate::types::{ReleaseBatchResponse, RouteBatch};

pub struct BatchPersister {
    store: Arc<dyn DispatchStore>,
    ids: Arc<dyn BatchIdGenerator>,
    clock: Arc<dyn Clock>,
}

impl BatchPersister {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        ids: Arc<dyn BatchIdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, ids, clock }
    }

    /// Commit `route` as a new batch for `depot_id` on `date`.
    ///
    /// Either every task is claimed or nothing is written. A colliding batch
    /// id is retried with a fresh one.
    pub async fn commit(
        &self,
        depot_id: Uuid,
        date: NaiveDate,
        algorithm: Algorithm,
        route: OptimizedRoute,
    ) -> Result<RouteBatch> {
        let mut batch = RouteBatch {
            id: String::new(),
            depot_id,
            date,
            algorithm: algorithm.as_str().to_string(),
            stops: route.stops,
            total_distance_km: route.total_distance_km,
            created_at: self.clock.now(),
            released_at: None,
        };

        for attempt in 1..=BATCH_ID_ATTEMPTS {
            batch.id = self.ids.next_id();
            match self.store.commit_batch(&batch).await {
                Ok(()) => {
                    info!(
                        "Committed batch {} ({} stops, {:.2} km)",
                        batch.id,
                        batch.stops.len(),
                        batch.total_distance_km
                    );
                    return Ok(batch);
                }
                Err(DispatchError::BatchIdCollision(id)) => {
                    warn!("Batch id {} already exists (attempt {}/{})", id, attempt, BATCH_ID_ATTEMPTS);
                }
                Err(e) => return Err(e),
            }
        }

        Err(DispatchError::BatchIdCollision(batch.id))
    }

    pub async fn get(&self, batch_id: &str) -> Result<RouteBatch> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| DispatchError::not_found("route batch", batch_id))
    }

    /// Close an open batch so its WAITING tasks can be routed again.
    pub async fn release(&self, batch_id: &str) -> Result<ReleaseBatchResponse> {
        let released_task_ids = self.store.release_batch(batch_id, self.clock.now()).await?;
        info!("Released batch {} ({} tasks freed)", batch_id, released_task_ids.len());
        Ok(ReleaseBatchResponse {
            batch_id: batch_id.to_string(),
            released_task_ids,
        })
    }
}
