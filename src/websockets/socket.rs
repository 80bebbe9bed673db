use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::event::RoomEvent;
use crate::room::service::RoomSessionService;

/// Simple WebSocket abstraction - all the connection loop cares about is
/// frames out, liveness signals in
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a serialized event frame to the client
    async fn send_frame(&mut self, frame: String) -> Result<(), SocketError>;

    /// Send a keepalive ping
    async fn send_ping(&mut self) -> Result<(), SocketError>;

    /// Wait for the next inbound signal from the client
    async fn next_inbound(&mut self) -> Result<Inbound, SocketError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SocketError>;
}

/// What a client can send us. Text and pongs both count as liveness.
#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Heartbeat,
    Closed,
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_frame(&mut self, frame: String) -> Result<(), SocketError> {
        self.send(Message::Text(frame))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn send_ping(&mut self) -> Result<(), SocketError> {
        self.send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn next_inbound(&mut self) -> Result<Inbound, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Inbound::Text(text)),
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {
                    return Ok(Inbound::Heartbeat)
                }
                Some(Ok(Message::Binary(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(Inbound::Closed),
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// One subscriber's live event channel. Forwards every room event the
/// broadcast delivers, refreshes the user's presence on anything the client
/// sends, and closes after room_deleted goes out.
pub struct Connection {
    user_id: Uuid,
    room_id: Uuid,
    socket: Box<dyn SocketWrapper>,
    events: broadcast::Receiver<RoomEvent>,
    rooms: Arc<RoomSessionService>,
    keepalive: Duration,
}

impl Connection {
    pub fn new(
        user_id: Uuid,
        room_id: Uuid,
        socket: Box<dyn SocketWrapper>,
        events: broadcast::Receiver<RoomEvent>,
        rooms: Arc<RoomSessionService>,
        keepalive: Duration,
    ) -> Self {
        Self {
            user_id,
            room_id,
            socket,
            events,
            rooms,
            keepalive,
        }
    }

    /// Run the connection until the client disconnects or the room is torn
    /// down
    pub async fn run(mut self) -> Result<(), SocketError> {
        let mut keepalive = tokio::time::interval(self.keepalive);
        // The first tick fires immediately; burn it
        keepalive.tick().await;

        loop {
            tokio::select! {
                event = self.events.recv() => {
                    match event {
                        Ok(event) => {
                            let room_gone = matches!(event, RoomEvent::RoomDeleted { .. });
                            match serde_json::to_string(&event) {
                                Ok(frame) => self.socket.send_frame(frame).await?,
                                Err(e) => {
                                    warn!(error = %e, "failed to serialize event frame");
                                }
                            }
                            if room_gone {
                                break;
                            }
                        }
                        // Slow consumer: skip ahead, the client resyncs over
                        // HTTP if it cares
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(
                                user_id = %self.user_id,
                                room_id = %self.room_id,
                                missed,
                                "subscriber lagged behind the event stream"
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }

                inbound = self.socket.next_inbound() => {
                    match inbound? {
                        Inbound::Closed => return Ok(()),
                        Inbound::Text(_) | Inbound::Heartbeat => {
                            debug!(user_id = %self.user_id, "presence refreshed");
                            if let Err(e) = self
                                .rooms
                                .touch_presence(self.user_id, self.room_id)
                                .await
                            {
                                warn!(error = %e, "failed to refresh presence");
                            }
                        }
                    }
                }

                _ = keepalive.tick() => {
                    self.socket.send_ping().await?;
                }
            }
        }

        let _ = self.socket.close().await;
        Ok(())
    }
}
