use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, request::Parts},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::session::{
        ActionResponse, CreateRoomRequest, EditSegmentRequest, JoinRoomRequest, JoinRoomResponse,
        LeaderboardEntry, RoomCreatedResponse, RoomListResponse, SessionSnapshot, SettingsDto,
        SkipTurnRequest, SkipTurnResponse, StoryTextResponse, SubmitTurnRequest, SubmitTurnResponse,
    },
    error::AppError,
    services::session_service::{self, parse_room_code},
    state::SharedState,
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Host token taken from the `X-Host-Token` header.
pub struct HostToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for HostToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(HOST_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| HostToken(value.to_owned()))
            .ok_or_else(|| AppError::Unauthorized("missing host token header `X-Host-Token`".into()))
    }
}

/// Room lifecycle, players, turns and story endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{code}", get(get_room).delete(close_room))
        .route("/rooms/{code}/players", post(join_room))
        .route("/rooms/{code}/players/clear", post(clear_players))
        .route("/rooms/{code}/players/{player_id}/leave", post(leave_room))
        .route("/rooms/{code}/players/{player_id}/heartbeat", post(heartbeat))
        .route("/rooms/{code}/start", post(start_session))
        .route("/rooms/{code}/pause", post(pause_session))
        .route("/rooms/{code}/resume", post(resume_session))
        .route("/rooms/{code}/end", post(end_session))
        .route("/rooms/{code}/turns", post(submit_turn))
        .route("/rooms/{code}/turns/skip", post(skip_turn))
        .route("/rooms/{code}/settings", put(update_settings))
        .route("/rooms/{code}/story", get(story_text))
        .route(
            "/rooms/{code}/story/{segment_id}",
            put(edit_segment).delete(delete_segment),
        )
        .route("/rooms/{code}/leaderboard", get(leaderboard))
}

/// Open a new room.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created; the host token is only returned here", body = RoomCreatedResponse),
        (status = 400, description = "Invalid settings"),
        (status = 503, description = "No storage backend")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomCreatedResponse>), AppError> {
    let created =
        session_service::create_session(&state, payload.settings.map(Into::into)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List the codes of every stored room.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Stored rooms", body = RoomListResponse))
)]
pub async fn list_rooms(State(state): State<SharedState>) -> Result<Json<RoomListResponse>, AppError> {
    Ok(Json(session_service::list_rooms(&state).await?))
}

/// Fetch the public snapshot of a room.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Current snapshot", body = SessionSnapshot),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::get_session(&state, &code).await?))
}

/// Delete a room and close its streams.
#[utoipa::path(
    delete,
    path = "/rooms/{code}",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses(
        (status = 204, description = "Room deleted"),
        (status = 401, description = "Missing or invalid host token"),
        (status = 404, description = "Unknown room")
    )
)]
pub async fn close_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
) -> Result<StatusCode, AppError> {
    let code = parse_room_code(&code)?;
    session_service::close_room(&state, &code, &token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Join or rejoin a room.
#[utoipa::path(
    post,
    path = "/rooms/{code}/players",
    tag = "players",
    params(("code" = String, Path, description = "Room code")),
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Player identity", body = JoinRoomResponse),
        (status = 409, description = "Room full or session ended")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<JoinRoomResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::join_session(&state, &code, payload).await?))
}

/// Leave a room.
#[utoipa::path(
    post,
    path = "/rooms/{code}/players/{player_id}/leave",
    tag = "players",
    params(
        ("code" = String, Path, description = "Room code"),
        ("player_id" = String, Path, description = "Player identifier")
    ),
    responses((status = 200, description = "Player deactivated", body = ActionResponse))
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::leave_session(&state, &code, &player_id).await?))
}

/// Refresh a player's presence over HTTP.
#[utoipa::path(
    post,
    path = "/rooms/{code}/players/{player_id}/heartbeat",
    tag = "players",
    params(
        ("code" = String, Path, description = "Room code"),
        ("player_id" = String, Path, description = "Player identifier")
    ),
    responses((status = 200, description = "Presence refreshed", body = ActionResponse))
)]
pub async fn heartbeat(
    State(state): State<SharedState>,
    Path((code, player_id)): Path<(String, String)>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::heartbeat(&state, &code, &player_id).await?))
}

/// Deactivate every player.
#[utoipa::path(
    post,
    path = "/rooms/{code}/players/clear",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Players cleared", body = ActionResponse))
)]
pub async fn clear_players(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::clear_players(&state, &code, &token).await?))
}

/// Start the first turn.
#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses(
        (status = 200, description = "Session started", body = ActionResponse),
        (status = 409, description = "Not in the lobby or fewer than two active players")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::start_session(&state, &code, &token).await?))
}

/// Pause the running session.
#[utoipa::path(
    post,
    path = "/rooms/{code}/pause",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Session paused", body = ActionResponse))
)]
pub async fn pause_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::pause_session(&state, &code, &token).await?))
}

/// Resume a paused session.
#[utoipa::path(
    post,
    path = "/rooms/{code}/resume",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Session resumed", body = ActionResponse))
)]
pub async fn resume_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::resume_session(&state, &code, &token).await?))
}

/// End the session.
#[utoipa::path(
    post,
    path = "/rooms/{code}/end",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Session ended", body = ActionResponse))
)]
pub async fn end_session(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::end_session(&state, &code, &token).await?))
}

/// Submit words for the current turn.
#[utoipa::path(
    post,
    path = "/rooms/{code}/turns",
    tag = "turns",
    params(("code" = String, Path, description = "Room code")),
    request_body = SubmitTurnRequest,
    responses(
        (status = 200, description = "Submission processed; `accepted` is false for stale turns", body = SubmitTurnResponse),
        (status = 400, description = "Empty text or too many words")
    )
)]
pub async fn submit_turn(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitTurnRequest>>,
) -> Result<Json<SubmitTurnResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::submit_turn(&state, &code, payload).await?))
}

/// Skip the running turn.
#[utoipa::path(
    post,
    path = "/rooms/{code}/turns/skip",
    tag = "turns",
    params(("code" = String, Path, description = "Room code")),
    request_body = SkipTurnRequest,
    responses((status = 200, description = "Skip processed", body = SkipTurnResponse))
)]
pub async fn skip_turn(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SkipTurnRequest>>,
) -> Result<Json<SkipTurnResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::skip_turn(&state, &code, payload).await?))
}

/// Replace the room settings.
#[utoipa::path(
    put,
    path = "/rooms/{code}/settings",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    request_body = SettingsDto,
    responses((status = 200, description = "Settings stored", body = ActionResponse))
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    HostToken(token): HostToken,
    Valid(Json(payload)): Valid<Json<SettingsDto>>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(
        session_service::update_settings(&state, &code, &token, payload.into()).await?,
    ))
}

/// Rewrite a story segment.
#[utoipa::path(
    put,
    path = "/rooms/{code}/story/{segment_id}",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("segment_id" = String, Path, description = "Segment identifier"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    request_body = EditSegmentRequest,
    responses((status = 200, description = "Segment updated", body = ActionResponse))
)]
pub async fn edit_segment(
    State(state): State<SharedState>,
    Path((code, segment_id)): Path<(String, String)>,
    HostToken(token): HostToken,
    Valid(Json(payload)): Valid<Json<EditSegmentRequest>>,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(
        session_service::edit_segment(&state, &code, &token, &segment_id, &payload.text).await?,
    ))
}

/// Remove a story segment.
#[utoipa::path(
    delete,
    path = "/rooms/{code}/story/{segment_id}",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("segment_id" = String, Path, description = "Segment identifier"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses(
        (status = 200, description = "Segment removed", body = ActionResponse),
        (status = 404, description = "Unknown segment")
    )
)]
pub async fn delete_segment(
    State(state): State<SharedState>,
    Path((code, segment_id)): Path<(String, String)>,
    HostToken(token): HostToken,
) -> Result<Json<ActionResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(
        session_service::delete_segment(&state, &code, &token, &segment_id).await?,
    ))
}

/// Export the story as plain text.
#[utoipa::path(
    get,
    path = "/rooms/{code}/story",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses((status = 200, description = "Story text", body = StoryTextResponse))
)]
pub async fn story_text(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<StoryTextResponse>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::story_text(&state, &code).await?))
}

/// Rank players by total response time.
#[utoipa::path(
    get,
    path = "/rooms/{code}/leaderboard",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code")),
    responses((status = 200, description = "Leaderboard", body = [LeaderboardEntry]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let code = parse_room_code(&code)?;
    Ok(Json(session_service::leaderboard(&state, &code).await?))
}
