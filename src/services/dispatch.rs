//! Route dispatch: select a day's tasks, order them, estimate arrivals and
//! commit the result as one batch.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::db::DispatchStore;
use crate::error::{DispatchError, Result};
use crate::services::depots::DepotRegistry;
use crate::services::eta::{self, EtaParams};
use crate::services::optimizer::{Algorithm, OptimizedRoute, RouteCandidate, RouteOptimizer};
use crate::services::persister::BatchPersister;
use crate::types::{
    ArrivalEstimate, EstimateArrivalsRequest, OptimizeRouteRequest, OptimizeRouteResponse,
    ReleaseBatchResponse, RouteBatch,
};

pub struct Dispatcher {
    store: Arc<dyn DispatchStore>,
    depots: Arc<DepotRegistry>,
    persister: BatchPersister,
    eta: EtaParams,
    offload_threshold: usize,
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DispatchError::Validation("date is required".into()))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| DispatchError::Validation(format!("date must be YYYY-MM-DD, got '{raw}'")))
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        depots: Arc<DepotRegistry>,
        persister: BatchPersister,
        eta: EtaParams,
        offload_threshold: usize,
    ) -> Self {
        Self {
            store,
            depots,
            persister,
            eta,
            offload_threshold,
        }
    }

    /// Optimize the selected deliveries for one date into a committed batch.
    pub async fn optimize(&self, req: OptimizeRouteRequest) -> Result<OptimizeRouteResponse> {
        let date = parse_date(req.date.as_deref())?;
        let algorithm = Algorithm::resolve(req.algorithm.as_deref())?;
        let eta_params = self
            .eta
            .with_overrides(req.avg_speed_kmh, req.service_time_minutes);
        if req.start_time.is_some() {
            eta_params.validate()?;
        }

        let depot = self.depots.resolve(req.depot_id).await?;
        let optimizer = RouteOptimizer::new(depot.coordinate(), algorithm)?;

        let tasks = self
            .store
            .select_tasks_for_route(date, req.delivery_ids.as_deref())
            .await?;
        if tasks.is_empty() {
            return Err(DispatchError::Validation(format!(
                "no waiting deliveries scheduled for {date}"
            )));
        }
        debug!("Selected {} tasks for {} from depot {}", tasks.len(), date, depot.name);

        let candidates: Vec<RouteCandidate> = tasks.iter().map(RouteCandidate::from).collect();
        let mut route = self.run_optimizer(optimizer, candidates).await?;

        if let Some(start) = req.start_time {
            eta::annotate(start, &mut route.stops, eta_params)?;
        }

        let batch = self.persister.commit(depot.id, date, algorithm, route).await?;
        info!(
            "Optimized {} stops for {} into {} ({:.2} km)",
            batch.stops.len(),
            date,
            batch.id,
            batch.total_distance_km
        );

        Ok(OptimizeRouteResponse {
            batch_id: batch.id,
            total_distance_km: batch.total_distance_km,
            algorithm: batch.algorithm,
            depot: depot.summary(),
            stop_count: batch.stops.len(),
            stops: batch.stops,
        })
    }

    /// Large inputs run on the blocking pool so the scan does not stall the runtime.
    async fn run_optimizer(
        &self,
        optimizer: RouteOptimizer,
        candidates: Vec<RouteCandidate>,
    ) -> Result<OptimizedRoute> {
        if candidates.len() <= self.offload_threshold {
            return optimizer.optimize(&candidates);
        }

        debug!("Offloading optimization of {} candidates", candidates.len());
        tokio::task::spawn_blocking(move || optimizer.optimize(&candidates))
            .await
            .map_err(|e| DispatchError::Internal(format!("optimizer task failed: {e}")))?
    }

    /// Arrival times along a committed batch. Nothing is written.
    pub async fn estimate_arrivals(&self, req: EstimateArrivalsRequest) -> Result<Vec<ArrivalEstimate>> {
        let batch = self.persister.get(&req.batch_id).await?;
        let params = self
            .eta
            .with_overrides(req.avg_speed_kmh, req.service_time_minutes);

        let legs: Vec<f64> = batch.stops.iter().map(|s| s.distance_from_previous_km).collect();
        let arrivals = eta::estimate(req.start_time, &legs, params)?;

        Ok(batch
            .stops
            .iter()
            .zip(arrivals)
            .map(|(stop, estimated_arrival)| ArrivalEstimate {
                task_id: stop.task_id,
                order: stop.order,
                estimated_arrival,
            })
            .collect())
    }

    pub async fn get_batch(&self, batch_id: &str) -> Result<RouteBatch> {
        self.persister.get(batch_id).await
    }

    pub async fn release_batch(&self, batch_id: &str) -> Result<ReleaseBatchResponse> {
        self.persister.release(batch_id).await
    }
}
