use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Story Relay Back.
#[openapi(
    info(
        title = "Story Relay Back",
        description = "Turn-based collaborative story rooms"
    ),
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::get_room,
        crate::routes::rooms::close_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::heartbeat,
        crate::routes::rooms::clear_players,
        crate::routes::rooms::start_session,
        crate::routes::rooms::pause_session,
        crate::routes::rooms::resume_session,
        crate::routes::rooms::end_session,
        crate::routes::rooms::submit_turn,
        crate::routes::rooms::skip_turn,
        crate::routes::rooms::update_settings,
        crate::routes::rooms::edit_segment,
        crate::routes::rooms::delete_segment,
        crate::routes::rooms::story_text,
        crate::routes::rooms::leaderboard,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::SessionSnapshot,
            crate::dto::ws::PresenceInbound,
            crate::dto::ws::PresenceAck,
            crate::dto::ws::TurnNotice,
            crate::dto::sse::Handshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::RoomClosed,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room creation and read models"),
        (name = "players", description = "Joining, leaving and presence over HTTP"),
        (name = "turns", description = "Submitting and skipping turns"),
        (name = "host", description = "Operations requiring the X-Host-Token header"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "presence", description = "WebSocket presence for players"),
    )
)]
pub struct ApiDoc;
