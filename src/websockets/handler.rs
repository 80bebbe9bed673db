use axum::{
    extract::{Path, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::RoomEvent;
use crate::shared::{AppError, AppState};

use super::socket::Connection;

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Live event channel for a room. Browsers cannot set request headers on a
/// WebSocket handshake, so the token travels in Sec-WebSocket-Protocol.
///
/// GET /rooms/{room_id}/events
pub async fn room_events_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<Uuid>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let token = headers
        .get("sec-websocket-protocol")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            warn!("missing Sec-WebSocket-Protocol header");
            AppError::Unauthorized("missing authentication token".to_string())
        })?;

    let claims = state.token_config.validate_token(token)?;
    let user_id = claims.sub;

    // NotFound if the room is gone; only current participants may subscribe
    if !state.rooms.is_participant(user_id, room_id).await? {
        warn!(%room_id, %user_id, "non-participant tried to open the event channel");
        return Err(AppError::Forbidden(
            "you must join the room before subscribing to its events".to_string(),
        ));
    }

    // Subscribe before the upgrade completes so nothing published during the
    // handshake is dropped
    let receiver = state.rooms.event_bus().subscribe(room_id).await;
    info!(%room_id, %user_id, "event channel accepted");

    Ok(ws.on_upgrade(move |socket| async move {
        run_subscription(socket, room_id, user_id, state, receiver).await;
    }))
}

async fn run_subscription(
    mut socket: axum::extract::ws::WebSocket,
    room_id: Uuid,
    user_id: Uuid,
    state: AppState,
    receiver: tokio::sync::broadcast::Receiver<RoomEvent>,
) {
    // Synthetic hello so the client knows the stream is live before any
    // real event lands
    let connected = RoomEvent::Connected { room_id };
    if let Ok(frame) = serde_json::to_string(&connected) {
        if socket
            .send(axum::extract::ws::Message::Text(frame))
            .await
            .is_err()
        {
            warn!(%room_id, %user_id, "client vanished before the hello frame");
            return;
        }
    }

    if let Err(e) = state.rooms.touch_presence(user_id, room_id).await {
        warn!(error = %e, "failed to refresh presence on connect");
    }

    let connection = Connection::new(
        user_id,
        room_id,
        Box::new(socket),
        receiver,
        Arc::clone(&state.rooms),
        KEEPALIVE_INTERVAL,
    );

    match connection.run().await {
        Ok(()) => info!(%room_id, %user_id, "event channel closed cleanly"),
        Err(e) => warn!(%room_id, %user_id, error = ?e, "event channel error"),
    }
}
