use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    services::{session_service, sse_events},
    state::{SharedState, session::RoomCode},
};

/// Subscribe to `code` and collect the events every new stream starts with.
///
/// The subscription is taken before the document is read so no commit can
/// fall between the initial snapshot and the live updates.
pub async fn subscribe_room(
    state: &SharedState,
    code: &str,
) -> Result<(broadcast::Receiver<ServerEvent>, Vec<ServerEvent>), ServiceError> {
    let receiver = state.rooms().subscribe(code);
    let session = match session_service::load_session(state, code).await {
        Ok(session) => session,
        Err(err) => {
            drop(receiver);
            state.rooms().release(code);
            return Err(err);
        }
    };

    let initial = [
        sse_events::handshake_event(code, state.is_degraded().await),
        sse_events::session_event(&session),
    ]
    .into_iter()
    .flatten()
    .collect();
    Ok((receiver, initial))
}

/// Convert a room subscription into an SSE response, forwarding events and
/// releasing the room hub once the client disconnects.
pub fn to_sse_stream(
    state: SharedState,
    code: RoomCode,
    initial: Vec<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut delivered = None;
        for payload in initial {
            advance(&mut delivered, &payload);
            if tx.send(Ok(to_event(payload))).await.is_err() {
                break;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if !advance(&mut delivered, &payload) {
                                continue;
                            }
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // Every session event is a full snapshot, the next one catches up.
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(room = %code, skipped, "SSE subscriber lagging; skipping events");
                            continue;
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.rooms().release(&code);
        info!(room = %code, "room SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Record the version of `payload`; `false` when the stream already sent a newer snapshot.
fn advance(delivered: &mut Option<u64>, payload: &ServerEvent) -> bool {
    let Some(version) = payload.version else {
        return true;
    };
    if delivered.is_some_and(|last| last >= version) {
        return false;
    }
    *delivered = Some(version);
    true
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}
