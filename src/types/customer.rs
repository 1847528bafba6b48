//! Customer directory snapshot

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Coordinate;

/// What the customer directory supplies when an assignment is created.
/// Copied onto the delivery task so later profile edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_defaults_optional_fields() {
        let json = r#"{"id":"00000000-0000-0000-0000-000000000001","name":"Ayşe"}"#;
        let customer: CustomerSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(customer.address, "");
        assert!(customer.phone.is_none());
        assert!(customer.coordinate.is_none());
    }
}
