use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{PresenceAck, PresenceInbound, TurnNotice},
    error::ServiceError,
    services::protocol::apply_transition,
    state::{
        PresenceConnection, SharedState,
        session::{PlayerId, RoomCode, Session},
        state_machine::SessionStatus,
        transitions,
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// The socket's writer task has stopped.
#[derive(Debug)]
struct WriterClosed;

/// Handle the full lifecycle of a player's presence socket.
///
/// The first frame must identify a known player of `room_code`. Heartbeats then
/// refresh `last_seen`; closing the socket deactivates the player unless a
/// newer socket for the same player has taken over.
pub async fn handle_socket(state: SharedState, room_code: RoomCode, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(room = %room_code, error = %err, "presence receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!(room = %room_code, "presence identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = match serde_json::from_str::<PresenceInbound>(initial_message.as_str()) {
        Ok(PresenceInbound::Identification { player_id }) => player_id,
        Ok(_) => {
            warn!(room = %room_code, "first presence message was not identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(room = %room_code, error = %err, "failed to parse presence message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let (connection_id, session) = match identify(&state, &room_code, &player_id, &outbound_tx).await {
        Ok(identified) => identified,
        Err(err) => {
            warn!(room = %room_code, %player_id, error = %err, "rejecting presence identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ack = PresenceAck {
        player_id: player_id.clone(),
        status: "identified".into(),
        heartbeat_interval_secs: state.config().heartbeat_interval().as_secs(),
    };
    if send_json(&outbound_tx, &ack).is_err() {
        release(&state, &room_code, &player_id, connection_id).await;
        finalize(writer_task, outbound_tx).await;
        return;
    }
    if session.current_player_id.as_deref() == Some(player_id.as_str()) {
        if let Some(notice) = turn_notice(&session) {
            let _ = send_json(&outbound_tx, &notice);
        }
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<PresenceInbound>(text.as_str()) {
                Ok(PresenceInbound::Heartbeat) => {
                    if let Err(err) = touch(&state, &room_code, &player_id).await {
                        warn!(room = %room_code, %player_id, error = %err, "heartbeat failed");
                        if matches!(err, ServiceError::NotFound(_)) {
                            break;
                        }
                    }
                }
                Ok(PresenceInbound::Identification { .. }) => {
                    warn!(room = %room_code, %player_id, "ignoring duplicate identification message");
                }
                Ok(PresenceInbound::Unknown) => {
                    debug!(room = %room_code, %player_id, "ignoring unknown presence message");
                }
                Err(err) => {
                    warn!(room = %room_code, %player_id, error = %err, "failed to parse presence message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(room = %room_code, %player_id, "presence closed by client");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room = %room_code, %player_id, error = %err, "presence socket error");
                break;
            }
        }
    }

    release(&state, &room_code, &player_id, connection_id).await;
    finalize(writer_task, outbound_tx).await;
}

/// Push a [`TurnNotice`] to the player who just received the turn.
pub fn notify_turn_change(state: &SharedState, before: &Session, after: &Session) {
    let Some(player_id) = after.current_player_id.as_ref() else {
        return;
    };
    let same_turn = before.current_player_id == after.current_player_id
        && before.turn.map(|clock| clock.started_at) == after.turn.map(|clock| clock.started_at);
    if same_turn {
        return;
    }
    let Some(notice) = turn_notice(after) else {
        return;
    };

    let key = (after.room_code.clone(), player_id.clone());
    let Some(connection) = state.presence().get(&key).map(|entry| entry.clone()) else {
        return;
    };
    if send_json(&connection.tx, &notice).is_err() {
        warn!(room = %after.room_code, %player_id, "presence writer closed; dropping connection");
        state
            .presence()
            .remove_if(&key, |_, current| current.connection_id == connection.connection_id);
    }
}

/// Close every presence socket of a deleted room.
pub fn close_room(state: &SharedState, room_code: &str) {
    state.presence().retain(|(code, _), connection| {
        if code != room_code {
            return true;
        }
        let _ = connection.tx.send(Message::Close(None));
        false
    });
}

fn turn_notice(session: &Session) -> Option<TurnNotice> {
    if session.status != SessionStatus::Playing {
        return None;
    }
    let clock = session.turn?;
    Some(TurnNotice {
        room_code: session.room_code.clone(),
        timer_started_at: clock.started_at,
        time_limit: clock.time_limit,
        word_limit: clock.word_limit,
    })
}

/// Check that `player_id` belongs to the room and register `tx` as their socket.
///
/// A newer registration replaces an older one; the returned id lets
/// [`release`] tell them apart.
async fn identify(
    state: &SharedState,
    room_code: &str,
    player_id: &PlayerId,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<(Uuid, Session), ServiceError> {
    let session = touch(state, room_code, player_id).await?;
    let connection_id = Uuid::new_v4();
    state.presence().insert(
        (room_code.to_string(), player_id.clone()),
        PresenceConnection {
            connection_id,
            tx: tx.clone(),
        },
    );
    info!(room = %room_code, %player_id, "presence connected");
    Ok((connection_id, session))
}

async fn touch(state: &SharedState, room_code: &str, player_id: &str) -> Result<Session, ServiceError> {
    let applied = apply_transition(state, room_code, "heartbeat", |session, ctx| {
        transitions::heartbeat(session, ctx, player_id)
    })
    .await?;
    Ok(applied.session)
}

/// Unregister the socket and, if it was still the player's latest, deactivate them.
async fn release(state: &SharedState, room_code: &str, player_id: &PlayerId, connection_id: Uuid) {
    let key = (room_code.to_string(), player_id.clone());
    let removed = state
        .presence()
        .remove_if(&key, |_, current| current.connection_id == connection_id)
        .is_some();
    if !removed {
        debug!(room = %room_code, %player_id, "presence superseded by a newer socket");
        return;
    }

    match apply_transition(state, room_code, "disconnect", |session, ctx| {
        transitions::leave(session, ctx, player_id)
    })
    .await
    {
        Ok(_) => info!(room = %room_code, %player_id, "presence disconnected"),
        Err(err) => warn!(room = %room_code, %player_id, error = %err, "disconnect hook failed"),
    }
}

fn send_json<T: Serialize>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), WriterClosed> {
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize presence message");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| WriterClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::MemorySessionStore,
        dto::session::JoinRoomRequest,
        services::session_service,
        state::{AppState, session::TurnClock},
    };

    async fn room(names: &[&str], start: bool) -> (SharedState, RoomCode, Vec<PlayerId>) {
        let state = AppState::new(AppConfig::default());
        state
            .install_session_store(Arc::new(MemorySessionStore::new()))
            .await;
        let created = session_service::create_session(&state, None).await.unwrap();
        let mut players = Vec::new();
        for name in names {
            let request = JoinRoomRequest {
                name: name.to_string(),
                player_id: Some(name.to_lowercase()),
            };
            let joined = session_service::join_session(&state, &created.room_code, request)
                .await
                .unwrap();
            players.push(joined.player_id);
        }
        if start {
            session_service::start_session(&state, &created.room_code, &created.host_token)
                .await
                .unwrap();
        }
        (state, created.room_code, players)
    }

    async fn is_active(state: &SharedState, code: &str, player_id: &str) -> bool {
        session_service::load_session(state, code).await.unwrap().players[player_id].is_active
    }

    #[tokio::test]
    async fn superseded_socket_does_not_deactivate_the_player() {
        let (state, code, players) = room(&["Alice", "Bob", "Carol"], false).await;
        let alice = &players[0];
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();

        let (old_id, _) = identify(&state, &code, alice, &old_tx).await.unwrap();
        let (new_id, _) = identify(&state, &code, alice, &new_tx).await.unwrap();
        assert_ne!(old_id, new_id);

        release(&state, &code, alice, old_id).await;
        assert!(is_active(&state, &code, alice).await);
        let key = (code.clone(), alice.clone());
        assert_eq!(state.presence().get(&key).unwrap().connection_id, new_id);

        release(&state, &code, alice, new_id).await;
        assert!(!is_active(&state, &code, alice).await);
        assert!(state.presence().get(&key).is_none());
    }

    #[tokio::test]
    async fn disconnect_below_quorum_pauses_the_session() {
        let (state, code, players) = room(&["Alice", "Bob"], true).await;
        let (tx, _rx) = mpsc::unbounded_channel();
        let (connection_id, session) = identify(&state, &code, &players[1], &tx).await.unwrap();
        assert_eq!(session.status, SessionStatus::Playing);

        release(&state, &code, &players[1], connection_id).await;

        let session = session_service::load_session(&state, &code).await.unwrap();
        assert_eq!(session.status, SessionStatus::Paused);
        assert_eq!(session.current_player_id, None);
        assert!(session.players[&players[0]].is_active);
    }

    #[tokio::test]
    async fn unknown_players_cannot_identify() {
        let (state, code, _) = room(&["Alice"], false).await;
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = identify(&state, &code, &"mallory".to_string(), &tx).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(state.presence().is_empty());

        let err = identify(&state, "ZZZ222", &"alice".to_string(), &tx).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn turn_notices_follow_a_new_turn_only() {
        let mut before = Session::new("ABC234".into(), "t".into(), Default::default(), 0);
        before.status = SessionStatus::Playing;
        before.current_player_id = Some("alice".into());
        before.turn = Some(TurnClock::start(1_000, &before.settings));
        assert!(turn_notice(&before).is_some());

        before.status = SessionStatus::Paused;
        assert!(turn_notice(&before).is_none());
    }
}
