//! Operation surface of a story room.
//!
//! Reads go straight to the store; every write is a pure transition driven by
//! [`apply_transition`], with host-only operations checking the host token
//! against the same document the transition runs on.

use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::storage::StorageError,
    dto::{
        session::{
            ActionResponse, JoinRoomRequest, JoinRoomResponse, LeaderboardEntry, RoomCreatedResponse,
            RoomListResponse, SegmentDto, SessionSnapshot, SkipTurnRequest, SkipTurnResponse, StoryTextResponse,
            SubmitTurnRequest, SubmitTurnResponse,
        },
        validation::{normalize_room_code, validate_room_code},
    },
    error::ServiceError,
    services::{
        presence,
        protocol::{Applied, apply_transition},
        sse_events,
    },
    state::{
        SharedState, ledger,
        normalizer::count_words,
        session::{
            ROOM_CODE_ALPHABET, ROOM_CODE_LEN, RoomCode, Session, Settings, now_ms,
        },
        transitions::{
            self, JoinRequest, Outcome, SkipExpectation, TransitionContext, TransitionError,
            ensure_host,
        },
    },
};

/// Fresh codes drawn before giving up on room creation.
const MAX_ROOM_CODE_ATTEMPTS: u32 = 16;

/// Draw a room code from the unambiguous alphabet.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> RoomCode {
    (0..ROOM_CODE_LEN)
        .map(|_| char::from(ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())]))
        .collect()
}

/// Validate and uppercase a room code taken from a path.
pub fn parse_room_code(raw: &str) -> Result<RoomCode, ServiceError> {
    let code = normalize_room_code(raw);
    validate_room_code(&code).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.to_string())
                .unwrap_or_else(|| format!("invalid room code `{raw}`")),
        )
    })?;
    Ok(code)
}

/// Open a new room in the lobby and hand the host token back once.
pub async fn create_session(
    state: &SharedState,
    settings: Option<Settings>,
) -> Result<RoomCreatedResponse, ServiceError> {
    let settings = settings.unwrap_or_default();
    settings.check().map_err(ServiceError::InvalidInput)?;
    let store = state.require_session_store().await?;
    let host_token = Uuid::new_v4().simple().to_string();

    for attempt in 1..=MAX_ROOM_CODE_ATTEMPTS {
        let code = generate_room_code(&mut rand::rng());
        let session = Session::new(code.clone(), host_token.clone(), settings, now_ms());
        match store.create(session.clone()).await {
            Ok(_) => {
                info!(room = %code, "room created");
                return Ok(RoomCreatedResponse {
                    room_code: code,
                    host_token,
                    session: SessionSnapshot::from(&session),
                });
            }
            Err(StorageError::AlreadyExists { .. }) => {
                debug!(room = %code, attempt, "room code already taken; drawing another");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(attempts = MAX_ROOM_CODE_ATTEMPTS, "no free room code found");
    Err(ServiceError::Capacity("no free room code available".into()))
}

/// Current document of a room.
pub async fn load_session(state: &SharedState, code: &str) -> Result<Session, ServiceError> {
    let store = state.require_session_store().await?;
    let versioned = store
        .load(code.to_string())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))?;
    Ok(versioned.document)
}

/// Public snapshot of a room.
pub async fn get_session(state: &SharedState, code: &str) -> Result<SessionSnapshot, ServiceError> {
    let session = load_session(state, code).await?;
    Ok(SessionSnapshot::from(&session))
}

/// Codes of every stored room.
pub async fn list_rooms(state: &SharedState) -> Result<RoomListResponse, ServiceError> {
    let store = state.require_session_store().await?;
    Ok(RoomListResponse {
        rooms: store.list().await?,
    })
}

/// Delete a room, closing its streams and presence sockets.
pub async fn close_room(state: &SharedState, code: &str, host_token: &str) -> Result<(), ServiceError> {
    let session = load_session(state, code).await?;
    ensure_host(&session, host_token)?;

    let store = state.require_session_store().await?;
    if !store.delete(code.to_string()).await? {
        return Err(ServiceError::NotFound(format!("room `{code}` not found")));
    }
    sse_events::broadcast_room_closed(state, code);
    presence::close_room(state, code);
    info!(room = %code, "room closed");
    Ok(())
}

/// Add or reactivate a player.
pub async fn join_session(
    state: &SharedState,
    code: &str,
    request: JoinRoomRequest,
) -> Result<JoinRoomResponse, ServiceError> {
    let request = JoinRequest {
        name: request.name,
        player_id: request.player_id,
    };
    let applied = apply_transition(state, code, "join", |session, ctx| {
        transitions::join(session, ctx, &request)
    })
    .await?;

    let joined = applied.value;
    info!(room = %code, player_id = %joined.player_id, rejoined = joined.rejoined, "player joined");
    Ok(JoinRoomResponse {
        player_id: joined.player_id,
        color: joined.color,
        rejoined: joined.rejoined,
        heartbeat_interval_secs: state.config().heartbeat_interval().as_secs(),
    })
}

/// Deactivate a player.
pub async fn leave_session(
    state: &SharedState,
    code: &str,
    player_id: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = apply_transition(state, code, "leave", |session, ctx| {
        transitions::leave(session, ctx, player_id)
    })
    .await?;
    if applied.committed {
        info!(room = %code, %player_id, "player left");
    }
    Ok(action(applied))
}

/// Refresh a player's `last_seen`.
pub async fn heartbeat(
    state: &SharedState,
    code: &str,
    player_id: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = apply_transition(state, code, "heartbeat", |session, ctx| {
        transitions::heartbeat(session, ctx, player_id)
    })
    .await?;
    Ok(action(applied))
}

/// Deactivate every player of the room.
pub async fn clear_players(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "clear_players", transitions::clear_players).await?;
    info!(room = %code, cleared = applied.value, "players cleared");
    Ok(action(applied))
}

/// Leave the lobby and start the first turn.
pub async fn start_session(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "start", transitions::start).await?;
    info!(room = %code, "session started");
    Ok(action(applied))
}

/// Pause the running session.
pub async fn pause_session(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "pause", transitions::pause).await?;
    Ok(action(applied))
}

/// Resume a paused session with a fresh turn.
pub async fn resume_session(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "resume", transitions::resume).await?;
    Ok(action(applied))
}

/// End the session for good.
pub async fn end_session(
    state: &SharedState,
    code: &str,
    host_token: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "end", transitions::end).await?;
    if applied.committed {
        info!(room = %code, segments = applied.session.story.len(), "session ended");
    }
    Ok(action(applied))
}

/// Append the current player's words to the story.
pub async fn submit_turn(
    state: &SharedState,
    code: &str,
    request: SubmitTurnRequest,
) -> Result<SubmitTurnResponse, ServiceError> {
    let applied = apply_transition(state, code, "submit", |session, ctx| {
        transitions::submit(session, ctx, &request.player_id, &request.text)
    })
    .await?;
    if applied.value.is_none() {
        debug!(room = %code, player_id = %request.player_id, "stale submission ignored");
    }

    Ok(SubmitTurnResponse {
        accepted: applied.value.is_some(),
        segment: applied.value.as_ref().map(SegmentDto::from),
        session: SessionSnapshot::from(&applied.session),
    })
}

/// Skip the running turn, charging the full countdown.
pub async fn skip_turn(
    state: &SharedState,
    code: &str,
    request: SkipTurnRequest,
) -> Result<SkipTurnResponse, ServiceError> {
    let expected = SkipExpectation {
        player_id: request.expected_player_id,
        started_at: request.expected_started_at,
    };
    let applied = apply_transition(state, code, "skip", |session, ctx| {
        transitions::skip(session, ctx, &expected)
    })
    .await?;
    match &applied.value {
        Some(player_id) => info!(room = %code, %player_id, "turn skipped"),
        None => debug!(room = %code, "redundant skip ignored"),
    }

    Ok(SkipTurnResponse {
        skipped_player_id: applied.value,
        session: SessionSnapshot::from(&applied.session),
    })
}

/// Replace the text of a story segment.
pub async fn edit_segment(
    state: &SharedState,
    code: &str,
    host_token: &str,
    segment_id: &str,
    text: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "edit_segment", |session, ctx| {
        transitions::edit_segment(session, ctx, segment_id, text)
    })
    .await?;
    Ok(action(applied))
}

/// Remove a story segment.
pub async fn delete_segment(
    state: &SharedState,
    code: &str,
    host_token: &str,
    segment_id: &str,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "delete_segment", |session, ctx| {
        transitions::delete_segment(session, ctx, segment_id)
    })
    .await?;
    if !applied.value {
        return Err(ServiceError::NotFound(format!(
            "story segment `{segment_id}` not found"
        )));
    }
    Ok(action(applied))
}

/// Replace the room settings; the running turn keeps its limits.
pub async fn update_settings(
    state: &SharedState,
    code: &str,
    host_token: &str,
    settings: Settings,
) -> Result<ActionResponse, ServiceError> {
    let applied = host_transition(state, code, host_token, "update_settings", |session, ctx| {
        transitions::update_settings(session, ctx, settings)
    })
    .await?;
    Ok(action(applied))
}

/// Active players ranked by total response time; players who left are not listed.
pub async fn leaderboard(state: &SharedState, code: &str) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let session = load_session(state, code).await?;
    Ok(ledger::leaderboard(&session)
        .into_iter()
        .enumerate()
        .map(|(index, player)| LeaderboardEntry::new(index + 1, player))
        .collect())
}

/// Plain-text export of the story.
pub async fn story_text(state: &SharedState, code: &str) -> Result<StoryTextResponse, ServiceError> {
    let session = load_session(state, code).await?;
    let text = session.story_text();
    Ok(StoryTextResponse {
        room_code: session.room_code.clone(),
        words: count_words(&text),
        segments: session.story.len(),
        text,
    })
}

async fn host_transition<T, F>(
    state: &SharedState,
    code: &str,
    host_token: &str,
    operation: &'static str,
    mut transition: F,
) -> Result<Applied<T>, ServiceError>
where
    F: FnMut(&Session, &mut TransitionContext<'_>) -> Result<Outcome<T>, TransitionError>,
{
    apply_transition(state, code, operation, |session, ctx| {
        ensure_host(session, host_token)?;
        transition(session, ctx)
    })
    .await
}

fn action<T>(applied: Applied<T>) -> ActionResponse {
    ActionResponse {
        changed: applied.committed,
        session: SessionSnapshot::from(&applied.session),
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn generated_codes_use_the_room_alphabet() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code.bytes().all(|c| ROOM_CODE_ALPHABET.contains(&c)));
        }
    }

    #[test]
    fn path_codes_are_normalized() {
        assert_eq!(parse_room_code(" abc234 ").unwrap(), "ABC234");
        assert!(matches!(
            parse_room_code("ABC10"),
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
