use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{
    error::AppError,
    services::{presence, session_service::parse_room_code},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{code}/presence",
    tag = "presence",
    params(("code" = String, Path, description = "Room code")),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a player presence socket.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let code = parse_room_code(&code)?;
    Ok(ws.on_upgrade(move |socket| presence::handle_socket(state, code, socket)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/presence", get(ws_handler))
}
