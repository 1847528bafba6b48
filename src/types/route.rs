//! Route batch types

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DepotSummary;

/// An immutable, uniquely identified set of ordered stops produced by one
/// optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteBatch {
    pub id: String,
    pub depot_id: Uuid,
    pub date: NaiveDate,
    pub algorithm: String,
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    pub created_at: DateTime<Utc>,
    /// Set once the batch is released; a released batch no longer claims tasks
    pub released_at: Option<DateTime<Utc>>,
}

impl RouteBatch {
    pub fn is_open(&self) -> bool {
        self.released_at.is_none()
    }

    pub fn task_ids(&self) -> Vec<Uuid> {
        self.stops.iter().map(|s| s.task_id).collect()
    }

    /// Task ids listed by more than one stop, in first-repeat order.
    pub fn duplicate_task_ids(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        let mut repeated = Vec::new();
        for stop in &self.stops {
            if !seen.insert(stop.task_id) && !repeated.contains(&stop.task_id) {
                repeated.push(stop.task_id);
            }
        }
        repeated
    }
}

/// A stop on a route batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStop {
    pub task_id: Uuid,
    /// 1-based position in the route
    pub order: i32,
    /// From the previous stop; the first stop is measured from the depot
    pub distance_from_previous_km: f64,
    #[serde(default)]
    pub estimated_arrival: Option<DateTime<Utc>>,
}

/// Request to optimize a day's deliveries into a batch
///
/// `date` stays a raw string so a missing or malformed value can be reported
/// as a validation error instead of a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub depot_id: Option<Uuid>,
    #[serde(default)]
    pub delivery_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub algorithm: Option<String>,
    /// When present, arrival times are estimated and stored with the batch
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
    #[serde(default)]
    pub service_time_minutes: Option<f64>,
}

/// Result of route optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteResponse {
    pub batch_id: String,
    pub total_distance_km: f64,
    pub algorithm: String,
    pub depot: DepotSummary,
    pub stops: Vec<RouteStop>,
    pub stop_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchIdRequest {
    pub batch_id: String,
}

/// Request to estimate arrivals along a committed batch (not persisted)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateArrivalsRequest {
    pub batch_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
    #[serde(default)]
    pub service_time_minutes: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEstimate {
    pub task_id: Uuid,
    pub order: i32,
    pub estimated_arrival: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBatchResponse {
    pub batch_id: String,
    /// WAITING tasks whose batch fields were cleared
    pub released_task_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimize_request_all_optional() {
        let req: OptimizeRouteRequest = serde_json::from_str("{}").unwrap();
        assert!(req.date.is_none());
        assert!(req.delivery_ids.is_none());
        assert!(req.algorithm.is_none());
    }

    #[test]
    fn test_optimize_request_camel_case() {
        let json = r#"{
            "date": "2026-01-07",
            "depotId": "00000000-0000-0000-0000-000000000001",
            "deliveryIds": ["00000000-0000-0000-0000-000000000002"],
            "algorithm": "nearest_neighbor",
            "startTime": "2026-01-07T08:00:00Z"
        }"#;
        let req: OptimizeRouteRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.date.as_deref(), Some("2026-01-07"));
        assert_eq!(req.delivery_ids.map(|ids| ids.len()), Some(1));
        assert!(req.start_time.is_some());
    }

    #[test]
    fn test_route_stop_serializes_distance_field() {
        let stop = RouteStop {
            task_id: Uuid::nil(),
            order: 1,
            distance_from_previous_km: 0.52,
            estimated_arrival: None,
        };
        let json = serde_json::to_string(&stop).unwrap();
        assert!(json.contains("\"distanceFromPreviousKm\":0.52"));
        assert!(json.contains("\"order\":1"));
    }

    #[test]
    fn test_duplicate_task_ids_reports_each_repeat_once() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let stop = |task_id, order| RouteStop {
            task_id,
            order,
            distance_from_previous_km: 0.0,
            estimated_arrival: None,
        };
        let batch = RouteBatch {
            id: "ROUTE-1".into(),
            depot_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            algorithm: "nearest_neighbor".into(),
            stops: vec![stop(a, 1), stop(b, 2), stop(a, 3), stop(a, 4)],
            total_distance_km: 0.0,
            created_at: Utc::now(),
            released_at: None,
        };
        assert_eq!(batch.duplicate_task_ids(), vec![a]);
    }
}
