//! Dispatch error taxonomy
//!
//! Every failure surfaced to a caller carries a stable machine-readable code
//! plus the ids needed to retry deterministically.

use serde_json::json;
use uuid::Uuid;

/// Result alias used across the dispatch core.
pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed or missing required input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced depot, assignment, task or batch does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Task already claimed by an open batch, or a transition not permitted
    /// from the current state.
    #[error("conflict: {message}")]
    Conflict { message: String, task_ids: Vec<Uuid> },

    /// One or more tasks have no geocoded coordinate.
    #[error("{} task(s) missing coordinates", .task_ids.len())]
    Data { task_ids: Vec<Uuid> },

    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("invalid parameter {name}: {message}")]
    InvalidParameter { name: &'static str, message: String },

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Generated batch id already exists; the persister retries with a new id.
    #[error("batch id collision: {0}")]
    BatchIdCollision(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            task_ids: Vec::new(),
        }
    }

    pub fn conflict_on(message: impl Into<String>, task_ids: Vec<Uuid>) -> Self {
        Self::Conflict {
            message: message.into(),
            task_ids,
        }
    }

    pub fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    /// Machine-readable code used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::Data { .. } => "DATA_ERROR",
            Self::InvalidCoordinate { .. } => "INVALID_COORDINATE",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
            Self::UnsupportedAlgorithm(_) => "UNSUPPORTED_ALGORITHM",
            Self::BatchIdCollision(_) | Self::Storage(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Structured context for the error envelope, if any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Self::Conflict { task_ids, .. } if !task_ids.is_empty() => {
                Some(json!({ "taskIds": task_ids }))
            }
            Self::Data { task_ids } => Some(json!({ "missingCoordinates": task_ids })),
            Self::InvalidCoordinate { lat, lng } => Some(json!({ "lat": lat, "lng": lng })),
            Self::InvalidParameter { name, .. } => Some(json!({ "parameter": name })),
            _ => None,
        }
    }
}
