//! NATS message envelopes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;

/// Generic request wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

/// Generic success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(request_id: Uuid, payload: T) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(request_id: Uuid, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn from_error(request_id: Uuid, err: &DispatchError) -> Self {
        Self {
            id: request_id,
            timestamp: Utc::now(),
            error: ErrorDetail {
                code: err.code().to_string(),
                message: err.to_string(),
                details: err.details(),
            },
        }
    }
}

/// Payload of requests that carry no data; take it as `Option<EmptyPayload>`
/// to accept both `null` and `{}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

/// List response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            total: items.len(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_from_data_error_carries_ids() {
        let task_id = Uuid::new_v4();
        let err = DispatchError::Data { task_ids: vec![task_id] };
        let response = ErrorResponse::from_error(Uuid::nil(), &err);
        assert_eq!(response.error.code, "DATA_ERROR");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json["error"]["details"]["missingCoordinates"][0],
            serde_json::json!(task_id)
        );
    }

    #[test]
    fn test_error_response_omits_empty_details() {
        let response = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", "bad json");
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_request_envelope_parses_null_payload() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000000","timestamp":"2026-01-07T08:00:00Z","payload":null}"#;
        let req: Request<Option<EmptyPayload>> = serde_json::from_str(json).unwrap();
        assert!(req.payload.is_none());
    }

    #[test]
    fn test_list_response_counts_items() {
        let list: ListResponse<i32> = vec![1, 2, 3].into();
        assert_eq!(list.total, 3);
    }
}
