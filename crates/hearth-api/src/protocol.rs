//! Frame types for the registry socket protocol.
//!
//! Every inbound message carries a `type` discriminator. Results and
//! events echo the numeric id of the request (or subscription) that
//! produced them; auth frames carry no id. The server may coalesce
//! several messages into a single JSON array frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

// ── Inbound ──────────────────────────────────────────────────────────

/// A single message received from the remote.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Challenge sent right after the transport opens.
    AuthRequired {
        #[serde(default, rename = "ha_version")]
        server_version: Option<String>,
    },
    AuthOk {
        #[serde(default, rename = "ha_version")]
        server_version: Option<String>,
    },
    AuthInvalid {
        #[serde(default)]
        message: Option<String>,
    },
    /// Response to a command.
    Result {
        id: u64,
        success: bool,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<RemoteError>,
    },
    /// Push event for a subscription.
    Event { id: u64, event: EventPayload },
    Pong { id: u64 },
    #[serde(other)]
    Unknown,
}

/// Error body attached to a failed `result` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub code: String,
    pub message: String,
}

impl From<RemoteError> for Error {
    fn from(err: RemoteError) -> Self {
        Self::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

/// Body of an `event` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub time_fired: Option<String>,
}

/// A push event as broadcast to subscribers.
#[derive(Debug, Clone)]
pub struct EventFrame {
    /// Id of the `subscribe_events` request that produced this event.
    pub subscription_id: u64,
    pub event: EventPayload,
}

/// Parse a text frame into zero or more messages.
///
/// Accepts both a single JSON object and a coalesced JSON array.
/// Malformed entries are logged and skipped.
pub fn parse_frame(text: &str) -> Vec<InboundMessage> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to parse socket frame");
            return Vec::new();
        }
    };

    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<InboundMessage>(item) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unrecognised message");
                None
            }
        })
        .collect()
}

// ── Outbound ─────────────────────────────────────────────────────────

/// Credential reply to the `auth_required` challenge.
pub fn auth_frame(access_token: &str) -> String {
    serde_json::json!({ "type": "auth", "access_token": access_token }).to_string()
}

/// Build a command frame: the command's own fields plus `id` and `type`.
pub fn command_frame<T: Serialize>(id: u64, kind: &str, body: &T) -> Result<String, Error> {
    let mut map = match serde_json::to_value(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })? {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(Error::Deserialization {
                message: "command body must serialize to an object".into(),
                body: other.to_string(),
            });
        }
    };
    map.insert("id".into(), Value::from(id));
    map.insert("type".into(), Value::from(kind));
    Ok(Value::Object(map).to_string())
}
