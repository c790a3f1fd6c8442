use serde::Serialize;
use utoipa::ToSchema;

/// SSE event name carrying a full [`SessionSnapshot`](crate::dto::session::SessionSnapshot).
pub const SESSION_EVENT: &str = "session";
/// SSE event name of the first message on every stream.
pub const HANDSHAKE_EVENT: &str = "handshake";
/// SSE event name announcing degraded mode changes.
pub const SYSTEM_STATUS_EVENT: &str = "system_status";
/// SSE event name sent when the host deletes the room.
pub const ROOM_CLOSED_EVENT: &str = "room_closed";

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
    /// Session version of snapshot events; hubs and streams drop older ones.
    pub version: Option<u64>,
}

impl ServerEvent {
    /// Build an event from an already serialised payload.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self {
            event,
            data,
            version: None,
        }
    }

    /// Tag the event with the session version it describes.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Serialise `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self::new(event.into(), serde_json::to_string(payload)?))
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room the stream is bound to.
    pub room_code: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Last message of a stream whose room was deleted.
pub struct RoomClosed {
    pub room_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_events_keep_their_name() {
        let event = ServerEvent::json(
            Some(SYSTEM_STATUS_EVENT.to_string()),
            &SystemStatus { degraded: true },
        )
        .unwrap();
        assert_eq!(event.event.as_deref(), Some("system_status"));
        assert_eq!(event.data, r#"{"degraded":true}"#);
    }
}
