//! Assignment (sale) types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::DeliveryTask;

/// Assignment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "assignment_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Planned,
    Scheduled,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl AssignmentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Planned => "PLANNED",
            AssignmentStatus::Scheduled => "SCHEDULED",
            AssignmentStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            AssignmentStatus::Delivered => "DELIVERED",
            AssignmentStatus::Cancelled => "CANCELLED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, AssignmentStatus::Delivered | AssignmentStatus::Cancelled)
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment entity: a product sale that one delivery task fulfils
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product: String,
    pub quantity: i32,
    pub status: AssignmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create an assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub customer_id: Uuid,
    pub product: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_quantity() -> i32 { 1 }

/// Request to schedule an assignment for a delivery date
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleAssignmentRequest {
    pub assignment_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentIdRequest {
    pub assignment_id: Uuid,
}

/// Assignment together with its current delivery task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentWithDelivery {
    pub assignment: Assignment,
    pub delivery: Option<DeliveryTask>,
}

/// Assignment counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentStatsResponse {
    pub planned: i64,
    pub scheduled: i64,
    pub out_for_delivery: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

impl AssignmentStatsResponse {
    pub fn add(&mut self, status: AssignmentStatus, count: i64) {
        match status {
            AssignmentStatus::Planned => self.planned += count,
            AssignmentStatus::Scheduled => self.scheduled += count,
            AssignmentStatus::OutForDelivery => self.out_for_delivery += count,
            AssignmentStatus::Delivered => self.delivered += count,
            AssignmentStatus::Cancelled => self.cancelled += count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&AssignmentStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"OUT_FOR_DELIVERY\"");
        assert_eq!(AssignmentStatus::OutForDelivery.as_str(), "OUT_FOR_DELIVERY");
    }

    #[test]
    fn test_create_request_defaults_quantity() {
        let json = r#"{"customerId":"00000000-0000-0000-0000-000000000001","product":"Fridge"}"#;
        let req: CreateAssignmentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.quantity, 1);
        assert!(req.notes.is_none());
    }

    #[test]
    fn test_stats_add() {
        let mut stats = AssignmentStatsResponse::default();
        stats.add(AssignmentStatus::Planned, 3);
        stats.add(AssignmentStatus::Delivered, 2);
        assert_eq!(stats.planned, 3);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.scheduled, 0);
    }
}
