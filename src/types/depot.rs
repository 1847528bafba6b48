//! Depot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Coordinate;

/// Depot entity (route origin)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Depot {
    pub id: Uuid,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Depot {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }

    pub fn summary(&self) -> DepotSummary {
        DepotSummary {
            id: self.id,
            name: self.name.clone(),
            coordinate: self.coordinate(),
        }
    }
}

/// Depot reference returned with an optimized batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotSummary {
    pub id: Uuid,
    pub name: String,
    pub coordinate: Coordinate,
}

/// Create depot request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepotRequest {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub is_default: Option<bool>,
}

/// Update depot request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepotRequest {
    pub id: Uuid,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotIdRequest {
    pub id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_depot_request_deserializes_camel_case() {
        let json = r#"{"name":"Lefkoşa","lat":35.1856,"lng":33.3823,"isDefault":true}"#;
        let req: CreateDepotRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "Lefkoşa");
        assert_eq!(req.is_default, Some(true));
    }

    #[test]
    fn test_summary_carries_coordinate() {
        let depot = Depot {
            id: Uuid::nil(),
            name: "Main".into(),
            lat: 35.1856,
            lng: 33.3823,
            is_default: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let summary = depot.summary();
        assert_eq!(summary.coordinate, Coordinate { lat: 35.1856, lng: 33.3823 });
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["coordinate"]["lat"], 35.1856);
    }
}
