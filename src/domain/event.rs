//! Events fanned out to connected clients and their wire frames.
//!
//! An [`Event`] is an immutable tagged value. On the wire every event is a
//! flat JSON object whose `type` field carries the kind, framed as a single
//! server-sent-events `data:` line (see [`Frame`]).

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::Identity;
use crate::error::GatewayError;

/// Kind tag of the event a session sends itself once its channel is live.
pub const CONNECTED: &str = "connected";

/// Kind tag of online/offline transitions.
pub const PRESENCE_CHANGED: &str = "presence-changed";

/// Online/offline status carried by [`Event::PresenceChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    /// Identity has an open channel.
    Online,
    /// Identity's last channel closed.
    Offline,
}

impl PresenceStatus {
    /// Maps a boolean online flag to a status.
    #[must_use]
    pub const fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// Immutable event broadcast by value to registered channels.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// First frame on every channel: confirms the channel is live.
    Connected {
        /// Identity that owns the channel.
        identity: Identity,
    },

    /// An identity came online or went offline.
    PresenceChanged {
        /// Identity whose presence changed.
        identity: Identity,
        /// New status.
        status: PresenceStatus,
    },

    /// Application event such as a new chat message or a maintenance
    /// request update.
    Custom {
        /// Event kind, emitted as the `type` field.
        kind: String,
        /// Remaining top-level fields.
        fields: Map<String, Value>,
    },
}

/// Serde view of the built-in event kinds.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum BuiltinEvent<'a> {
    Connected {
        identity: &'a Identity,
    },
    PresenceChanged {
        identity: &'a Identity,
        status: PresenceStatus,
    },
}

impl Event {
    /// Builds a `connected` event.
    #[must_use]
    pub fn connected(identity: Identity) -> Self {
        Self::Connected { identity }
    }

    /// Builds a `presence-changed` event.
    #[must_use]
    pub fn presence_changed(identity: Identity, online: bool) -> Self {
        Self::PresenceChanged {
            identity,
            status: PresenceStatus::from_online(online),
        }
    }

    /// Builds an application event of the given kind.
    ///
    /// A `type` key inside `fields` is dropped; `kind` always wins.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `kind` is blank or names
    /// one of the built-in kinds, which only the gateway itself may emit.
    pub fn custom(
        kind: impl Into<String>,
        mut fields: Map<String, Value>,
    ) -> Result<Self, GatewayError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "event type must not be empty".to_string(),
            ));
        }
        if kind == CONNECTED || kind == PRESENCE_CHANGED {
            return Err(GatewayError::InvalidRequest(format!(
                "event type {kind} is reserved"
            )));
        }
        fields.remove("type");
        Ok(Self::Custom { kind, fields })
    }

    /// Parses a client-supplied `{ "type": ..., ...fields }` object into an
    /// application event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the value is not an object,
    /// has no string `type`, or uses a reserved kind.
    pub fn from_json(value: Value) -> Result<Self, GatewayError> {
        let Value::Object(mut fields) = value else {
            return Err(GatewayError::InvalidRequest(
                "event must be a JSON object".to_string(),
            ));
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => {
                return Err(GatewayError::InvalidRequest(
                    "event requires a string `type` field".to_string(),
                ));
            }
        };
        Self::custom(kind, fields)
    }

    /// Returns the event kind as emitted in the `type` field.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Connected { .. } => CONNECTED,
            Self::PresenceChanged { .. } => PRESENCE_CHANGED,
            Self::Custom { kind, .. } => kind,
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Connected { identity } => {
                BuiltinEvent::Connected { identity }.serialize(serializer)
            }
            Self::PresenceChanged { identity, status } => BuiltinEvent::PresenceChanged {
                identity,
                status: *status,
            }
            .serialize(serializer),
            Self::Custom { kind, fields } => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("type", kind)?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// One encoded event, shared by every channel it is written to.
///
/// Holds the compact JSON text of the event. The SSE layer writes it as
/// exactly `data: <JSON>\n\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Arc<str>);

impl Frame {
    /// Encodes an event once so it can be cloned cheaply per channel.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if the event cannot be
    /// serialized.
    pub fn from_event(event: &Event) -> Result<Self, serde_json::Error> {
        serde_json::to_string(event).map(|json| Self(Arc::from(json)))
    }

    /// Returns the JSON payload of the frame.
    #[must_use]
    pub fn json(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(raw: &str) -> Identity {
        let Ok(id) = Identity::new(raw) else {
            panic!("valid identity");
        };
        id
    }

    #[test]
    fn connected_shape() {
        let value = serde_json::to_value(Event::connected(identity("42"))).unwrap_or_default();
        assert_eq!(value, json!({ "type": "connected", "identity": "42" }));
    }

    #[test]
    fn presence_changed_shape() {
        let online = serde_json::to_value(Event::presence_changed(identity("1"), true))
            .unwrap_or_default();
        assert_eq!(
            online,
            json!({ "type": "presence-changed", "identity": "1", "status": "online" })
        );

        let offline = serde_json::to_value(Event::presence_changed(identity("1"), false))
            .unwrap_or_default();
        assert_eq!(offline["status"], "offline");
    }

    #[test]
    fn custom_event_is_flat() {
        let payload = json!({ "type": "new-message", "batch": "b-7", "count": 3 });
        let Ok(event) = Event::from_json(payload) else {
            panic!("valid event");
        };
        assert_eq!(event.kind(), "new-message");
        let value = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(value, json!({ "type": "new-message", "batch": "b-7", "count": 3 }));
    }

    #[test]
    fn custom_event_rejects_reserved_and_missing_kinds() {
        assert!(Event::from_json(json!({ "type": "connected" })).is_err());
        assert!(Event::from_json(json!({ "type": "presence-changed" })).is_err());
        assert!(Event::from_json(json!({ "type": "" })).is_err());
        assert!(Event::from_json(json!({ "kind": "ping" })).is_err());
        assert!(Event::from_json(json!(["ping"])).is_err());
    }

    #[test]
    fn frame_holds_compact_json() {
        let Ok(event) = Event::custom("ping", Map::new()) else {
            panic!("valid event");
        };
        let Ok(frame) = Frame::from_event(&event) else {
            panic!("encodable event");
        };
        assert_eq!(frame.json(), r#"{"type":"ping"}"#);
    }
}
