//! Delivery task types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Coordinate;

/// Delivery task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "delivery_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Waiting,
    OutForDelivery,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Waiting => "WAITING",
            DeliveryStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Failed)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The schedulable unit for one customer delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTask {
    pub id: Uuid,
    pub assignment_id: Uuid,
    /// None until the customer address is geocoded
    pub coordinate: Option<Coordinate>,
    pub status: DeliveryStatus,
    pub route_batch_id: Option<String>,
    pub delivery_order: Option<i32>,
    pub distance_km: Option<f64>,
    pub estimated_arrival: Option<DateTime<Utc>>,
    pub scheduled_date: Option<NaiveDate>,
    pub depot_id: Option<Uuid>,
    pub address_snapshot: String,
    pub phone_snapshot: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub delivered_by: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeliveryTask {
    /// Task is part of a batch that still has work outstanding.
    pub fn in_open_batch(&self) -> bool {
        self.route_batch_id.is_some() && !self.status.is_terminal()
    }

    /// Task may be written into a new batch.
    pub fn is_claimable(&self) -> bool {
        self.status == DeliveryStatus::Waiting && self.route_batch_id.is_none()
    }

    /// Drop order/distance/batch fields after the owning batch is released.
    pub fn clear_batch(&mut self) {
        self.route_batch_id = None;
        self.delivery_order = None;
        self.distance_km = None;
        self.estimated_arrival = None;
    }
}

/// Filter for listing delivery tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub status: Option<DeliveryStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdRequest {
    pub task_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteDeliveryRequest {
    pub task_id: Uuid,
    pub completed_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailDeliveryRequest {
    pub task_id: Uuid,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Outcome of deleting a delivery task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelDeliveryResponse {
    pub task_id: Uuid,
    pub assignment_id: Uuid,
    /// False when the owning assignment no longer existed
    pub assignment_reverted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatsRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub depot_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatsResponse {
    /// WAITING + OUT_FOR_DELIVERY
    pub waiting_count: i64,
    pub delivered_last_10_days_count: i64,
    pub scheduled_for_selected_date_count: i64,
}
