use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Inbound body of `POST /analytics`. Every field is optional at the wire
/// level, presence of `eventType` is enforced by the normalizer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub installation_id: Option<String>,
    pub event_type: Option<String>,
    pub meta: Option<Map<String, Value>>,
    pub created_at: Option<i64>,
}

/// A normalized event. Serializes to the persisted document layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub installation_id: String,
    pub event_type: String,
    pub meta: Option<Map<String, Value>>,
    pub created_at: Option<i64>,
    pub stored_at: i64,
}

/// Write acknowledgment from the store gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub id: Uuid,
    pub installation_id: String,
}

#[derive(Serialize)]
pub struct CaptureResponse {
    pub message: &'static str,
    #[serde(rename = "InstallationID")]
    pub installation_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
}
