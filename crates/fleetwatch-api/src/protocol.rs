//! `graphql-ws` sub-protocol messages.
//!
//! Text-JSON frames exchanged over the subscription socket:
//!
//! ```text
//! client → {"type":"connection_init","payload":{...}}
//! server ← {"type":"connection_ack"}
//! client → {"id":"1","type":"start","payload":{"query":"...","variables":{"tripId":"..."}}}
//! server ← {"type":"data","id":"1","payload":{"data":{"tripSnapshot":{...}}}}
//! server ← {"type":"error","id":"1","payload":{"message":"..."}}
//! ```
//!
//! Decoding is lenient: unrecognised `type` values decode to
//! [`ServerMessage::Unrecognized`] instead of failing, so newer servers can
//! add message kinds without breaking older clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::TripSnapshot;

/// Sub-protocol name offered in `Sec-WebSocket-Protocol`.
pub const SUBPROTOCOL: &str = "graphql-ws";

/// Operation id used for the single subscription on a socket.
pub const OPERATION_ID: &str = "1";

// ── Client → server ──────────────────────────────────────────────────

/// Variables for trip-scoped operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripVariables {
    pub trip_id: String,
}

/// A GraphQL operation: query text plus variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationPayload {
    pub query: String,
    pub variables: TripVariables,
}

/// Frames sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    Start {
        id: String,
        payload: OperationPayload,
    },
    Stop {
        id: String,
    },
    ConnectionTerminate,
}

impl ClientMessage {
    /// `connection_init`, optionally carrying the bearer token as
    /// `{"authorization": "Bearer <token>"}`.
    pub fn init(authorization: Option<&str>) -> Self {
        Self::ConnectionInit {
            payload: authorization.map(|auth| serde_json::json!({ "authorization": auth })),
        }
    }

    /// `start` for the trip-snapshot subscription.
    pub fn start_trip_snapshot(query: &str, trip_id: &str) -> Self {
        Self::Start {
            id: OPERATION_ID.into(),
            payload: OperationPayload {
                query: query.into(),
                variables: TripVariables {
                    trip_id: trip_id.into(),
                },
            },
        }
    }

    /// Serialize to the text frame body.
    pub fn to_text(&self) -> String {
        // Serializing these shapes cannot fail: every field is a string,
        // a struct of strings, or an already-valid `Value`.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ── Server → client ──────────────────────────────────────────────────

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorItem {
    pub message: String,
}

/// `data` field of a subscription `data` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshotData {
    pub trip_snapshot: Option<TripSnapshot>,
}

/// Payload of a `data` frame: a GraphQL execution result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataPayload {
    #[serde(default)]
    pub data: Option<TripSnapshotData>,
    #[serde(default)]
    pub errors: Vec<GraphqlErrorItem>,
}

impl DataPayload {
    /// The snapshot carried by this frame, if the server sent one.
    pub fn into_snapshot(self) -> Option<TripSnapshot> {
        self.data.and_then(|d| d.trip_snapshot)
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionAck,
    ConnectionError {
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename = "ka")]
    KeepAlive,
    Data {
        #[serde(default)]
        id: Option<String>,
        payload: DataPayload,
    },
    Error {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        payload: Value,
    },
    Complete {
        #[serde(default)]
        id: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

impl ServerMessage {
    /// Decode a text frame. Fails only on malformed JSON or a known
    /// message type whose payload has the wrong shape.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Human-readable message from an `error` / `connection_error` payload.
///
/// Servers send either `{"message": "..."}`, an array of such objects,
/// or a bare string.
pub fn error_message(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| payload.to_string(), String::from),
        Value::Array(items) => {
            let messages: Vec<String> = items.iter().map(error_message).collect();
            if messages.is_empty() {
                "unknown subscription error".into()
            } else {
                messages.join("; ")
            }
        }
        Value::Null => "unknown subscription error".into(),
        other => other.to_string(),
    }
}
