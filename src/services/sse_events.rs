use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        session::SessionSnapshot,
        sse::{
            HANDSHAKE_EVENT, Handshake, ROOM_CLOSED_EVENT, RoomClosed, SESSION_EVENT, SYSTEM_STATUS_EVENT,
            ServerEvent, SystemStatus,
        },
    },
    state::{SharedState, session::Session},
};

/// Build the `session` event carrying the public snapshot of `session`.
pub fn session_event(session: &Session) -> Option<ServerEvent> {
    make_event(SESSION_EVENT, &SessionSnapshot::from(session))
        .map(|event| event.with_version(session.version))
}

/// Build the first event of a room stream.
pub fn handshake_event(room_code: &str, degraded: bool) -> Option<ServerEvent> {
    make_event(
        HANDSHAKE_EVENT,
        &Handshake {
            room_code: room_code.to_string(),
            degraded,
        },
    )
}

/// Broadcast the latest snapshot to the room's subscribers.
pub fn broadcast_session(state: &SharedState, session: &Session) {
    if let Some(event) = session_event(session) {
        state.rooms().publish(&session.room_code, event);
    }
}

/// Tell every open stream that degraded mode changed.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    if let Some(event) = make_event(SYSTEM_STATUS_EVENT, &SystemStatus { degraded }) {
        state.rooms().publish_all(event);
    }
}

/// Send the closing notice to a deleted room and drop its hub.
pub fn broadcast_room_closed(state: &SharedState, room_code: &str) {
    let payload = RoomClosed {
        room_code: room_code.to_string(),
    };
    if let Some(event) = make_event(ROOM_CLOSED_EVENT, &payload) {
        state.rooms().publish(room_code, event);
    }
    state.rooms().close(room_code);
}

fn make_event<T: Serialize>(event: &str, payload: &T) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE event");
            None
        }
    }
}
