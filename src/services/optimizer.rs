//! Greedy nearest-neighbor route ordering
//!
//! Starting at the depot, repeatedly travels to the closest unvisited stop.
//! Candidates live in a fixed arena with a `claimed` bitset, so the scan
//! order (and therefore tie-breaking) always follows the caller's input order.

use std::str::FromStr;

use tracing::debug;
use uuid::Uuid;

use crate::error::{DispatchError, Result};
use crate::services::geo;
use crate::types::{Coordinate, DeliveryTask, RouteStop};

/// Route ordering algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    NearestNeighbor,
}

impl Algorithm {
    pub const fn as_str(self) -> &'static str {
        match self {
            Algorithm::NearestNeighbor => "nearest_neighbor",
        }
    }

    /// Resolve an optional request value, defaulting to nearest neighbor.
    pub fn resolve(selector: Option<&str>) -> Result<Self> {
        selector.map_or(Ok(Self::default()), str::parse)
    }
}

impl FromStr for Algorithm {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nearest_neighbor" => Ok(Algorithm::NearestNeighbor),
            other => Err(DispatchError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// A task as seen by the optimizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteCandidate {
    pub task_id: Uuid,
    pub coordinate: Option<Coordinate>,
}

impl From<&DeliveryTask> for RouteCandidate {
    fn from(task: &DeliveryTask) -> Self {
        Self {
            task_id: task.id,
            coordinate: task.coordinate,
        }
    }
}

/// Ordered stops plus the summed leg distance
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedRoute {
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
}

/// Route optimizer anchored at a depot
#[derive(Debug, Clone)]
pub struct RouteOptimizer {
    depot: Coordinate,
    algorithm: Algorithm,
}

impl RouteOptimizer {
    pub fn new(depot: Coordinate, algorithm: Algorithm) -> Result<Self> {
        depot.validate()?;
        Ok(Self { depot, algorithm })
    }

    /// Order the candidates. Fails with `Data` listing every candidate that
    /// has no coordinate; nothing is ordered in that case.
    pub fn optimize(&self, candidates: &[RouteCandidate]) -> Result<OptimizedRoute> {
        let missing: Vec<Uuid> = candidates
            .iter()
            .filter(|c| c.coordinate.is_none())
            .map(|c| c.task_id)
            .collect();
        if !missing.is_empty() {
            return Err(DispatchError::Data { task_ids: missing });
        }

        let points: Vec<(Uuid, Coordinate)> = candidates
            .iter()
            .filter_map(|c| c.coordinate.map(|coord| (c.task_id, coord)))
            .collect();
        for (_, coordinate) in &points {
            coordinate.validate()?;
        }

        match self.algorithm {
            Algorithm::NearestNeighbor => nearest_neighbor(self.depot, &points),
        }
    }
}

fn nearest_neighbor(depot: Coordinate, points: &[(Uuid, Coordinate)]) -> Result<OptimizedRoute> {
    let mut claimed = vec![false; points.len()];
    let mut stops = Vec::with_capacity(points.len());
    let mut current = depot;
    let mut total = 0.0;

    while stops.len() < points.len() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, (_, coordinate)) in points.iter().enumerate() {
            if claimed[idx] {
                continue;
            }
            let d = geo::distance(&current, coordinate)?;
            // Strict less keeps the earliest candidate on ties.
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((idx, d));
            }
        }

        let Some((idx, leg)) = best else { break };
        claimed[idx] = true;
        let (task_id, coordinate) = points[idx];
        stops.push(RouteStop {
            task_id,
            order: stops.len() as i32 + 1,
            distance_from_previous_km: leg,
            estimated_arrival: None,
        });
        total += leg;
        current = coordinate;
    }

    let total_distance_km = geo::round2(total);
    debug!(
        "Nearest-neighbor ordered {} stops, total {:.2} km",
        stops.len(),
        total_distance_km
    );

    Ok(OptimizedRoute {
        stops,
        total_distance_km,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn depot() -> Coordinate {
        Coordinate { lat: 35.1856, lng: 33.3823 }
    }

    fn candidate(lat: f64, lng: f64) -> RouteCandidate {
        RouteCandidate {
            task_id: Uuid::new_v4(),
            coordinate: Some(Coordinate { lat, lng }),
        }
    }

    fn optimizer() -> RouteOptimizer {
        RouteOptimizer::new(depot(), Algorithm::NearestNeighbor).unwrap()
    }

    fn random_candidates(rng: &mut StdRng, n: usize) -> Vec<RouteCandidate> {
        (0..n)
            .map(|_| candidate(rng.gen_range(35.0..35.4), rng.gen_range(33.0..33.8)))
            .collect()
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let route = optimizer().optimize(&[]).unwrap();
        assert!(route.stops.is_empty());
        assert_eq!(route.total_distance_km, 0.0);
    }

    #[test]
    fn test_nicosia_scenario() {
        let a = candidate(35.1900, 33.3850);
        let b = candidate(35.1800, 33.3800);
        let c = candidate(35.2000, 33.4000);

        let route = optimizer().optimize(&[c, b, a]).unwrap();

        let order: Vec<Uuid> = route.stops.iter().map(|s| s.task_id).collect();
        assert_eq!(order, vec![a.task_id, b.task_id, c.task_id]);

        let depot = depot();
        let coord = |c: &RouteCandidate| c.coordinate.unwrap();
        let leg1 = geo::distance(&depot, &coord(&a)).unwrap();
        let leg2 = geo::distance(&coord(&a), &coord(&b)).unwrap();
        let leg3 = geo::distance(&coord(&b), &coord(&c)).unwrap();
        assert_eq!(leg1, 0.55);
        assert_eq!(leg2, 1.20);
        assert_eq!(leg3, 2.87);

        let legs: Vec<f64> = route.stops.iter().map(|s| s.distance_from_previous_km).collect();
        assert_eq!(legs, vec![leg1, leg2, leg3]);
        assert!((route.total_distance_km - 4.62).abs() < 1e-9);
    }

    #[test]
    fn test_orders_form_permutation_and_total_matches_legs() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in [1, 2, 5, 17, 40] {
            let candidates = random_candidates(&mut rng, n);
            let route = optimizer().optimize(&candidates).unwrap();

            assert_eq!(route.stops.len(), n);
            let mut orders: Vec<i32> = route.stops.iter().map(|s| s.order).collect();
            orders.sort_unstable();
            assert_eq!(orders, (1..=n as i32).collect::<Vec<_>>());

            let mut ids: Vec<Uuid> = route.stops.iter().map(|s| s.task_id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), n);

            let sum: f64 = route.stops.iter().map(|s| s.distance_from_previous_km).sum();
            assert!((route.total_distance_km - sum).abs() <= 0.01);
        }
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let mut rng = StdRng::seed_from_u64(42);
        let candidates = random_candidates(&mut rng, 30);
        let first = optimizer().optimize(&candidates).unwrap();
        let second = optimizer().optimize(&candidates).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_each_step_picks_nearest_remaining() {
        let mut rng = StdRng::seed_from_u64(1234);
        for _ in 0..20 {
            let candidates = random_candidates(&mut rng, 8);
            let route = optimizer().optimize(&candidates).unwrap();

            let mut remaining: Vec<RouteCandidate> = candidates.clone();
            let mut current = depot();
            for stop in &route.stops {
                let min = remaining
                    .iter()
                    .map(|c| geo::distance(&current, &c.coordinate.unwrap()).unwrap())
                    .fold(f64::INFINITY, f64::min);
                assert_eq!(stop.distance_from_previous_km, min);

                let pos = remaining.iter().position(|c| c.task_id == stop.task_id).unwrap();
                let chosen = remaining.remove(pos);
                current = chosen.coordinate.unwrap();
            }
            assert!(remaining.is_empty());
        }
    }

    #[test]
    fn test_ties_resolve_to_earliest_input() {
        let depot = Coordinate { lat: 0.0, lng: 0.0 };
        let east = candidate(0.0, 0.01);
        let west = candidate(0.0, -0.01);
        let optimizer = RouteOptimizer::new(depot, Algorithm::NearestNeighbor).unwrap();

        let route = optimizer.optimize(&[west, east]).unwrap();
        assert_eq!(route.stops[0].task_id, west.task_id);

        let route = optimizer.optimize(&[east, west]).unwrap();
        assert_eq!(route.stops[0].task_id, east.task_id);
    }

    #[test]
    fn test_duplicate_coordinates_keep_input_order() {
        let first = candidate(35.19, 33.385);
        let second = candidate(35.19, 33.385);
        let route = optimizer().optimize(&[first, second]).unwrap();
        assert_eq!(route.stops[0].task_id, first.task_id);
        assert_eq!(route.stops[1].task_id, second.task_id);
        assert_eq!(route.stops[1].distance_from_previous_km, 0.0);
    }

    #[test]
    fn test_missing_coordinates_reports_every_offender() {
        let ok = candidate(35.19, 33.385);
        let missing_a = RouteCandidate { task_id: Uuid::new_v4(), coordinate: None };
        let missing_b = RouteCandidate { task_id: Uuid::new_v4(), coordinate: None };

        let err = optimizer().optimize(&[missing_a, ok, missing_b]).unwrap_err();
        match err {
            DispatchError::Data { task_ids } => {
                assert_eq!(task_ids, vec![missing_a.task_id, missing_b.task_id]);
            }
            other => panic!("expected Data error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_candidate_coordinate_rejected() {
        let bad = candidate(120.0, 33.0);
        assert!(matches!(
            optimizer().optimize(&[bad]),
            Err(DispatchError::InvalidCoordinate { .. })
        ));
    }

    #[test]
    fn test_invalid_depot_rejected() {
        let depot = Coordinate { lat: 0.0, lng: 200.0 };
        assert!(RouteOptimizer::new(depot, Algorithm::NearestNeighbor).is_err());
    }

    #[test]
    fn test_algorithm_resolution() {
        assert_eq!(Algorithm::resolve(None).unwrap(), Algorithm::NearestNeighbor);
        assert_eq!(
            Algorithm::resolve(Some("nearest_neighbor")).unwrap(),
            Algorithm::NearestNeighbor
        );
        assert!(matches!(
            Algorithm::resolve(Some("genetic")),
            Err(DispatchError::UnsupportedAlgorithm(name)) if name == "genetic"
        ));
    }
}
