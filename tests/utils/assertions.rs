use std::time::Duration;

use tokio::sync::broadcast;

use praiseroom::event::RoomEvent;

const RECV_TIMEOUT: Duration = Duration::from_millis(500);
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

// ============================================================================
// Event Stream Assertions
// ============================================================================

/// Wraps a live-channel subscription and asserts on what arrives
pub struct EventAssertion {
    receiver: broadcast::Receiver<RoomEvent>,
}

impl EventAssertion {
    pub fn new(receiver: broadcast::Receiver<RoomEvent>) -> Self {
        Self { receiver }
    }

    /// Next event must arrive promptly and carry the expected discriminator
    pub async fn expect_next(&mut self, event_type: &str) -> RoomEvent {
        let event = tokio::time::timeout(RECV_TIMEOUT, self.receiver.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
            .unwrap_or_else(|e| panic!("event stream ended waiting for {event_type}: {e}"));
        assert_eq!(
            event.event_type(),
            event_type,
            "expected {event_type}, got {event:?}"
        );
        event
    }

    /// Asserts an exact sequence of discriminators
    pub async fn expect_sequence(&mut self, event_types: &[&str]) -> Vec<RoomEvent> {
        let mut received = Vec::new();
        for event_type in event_types {
            received.push(self.expect_next(event_type).await);
        }
        received
    }

    /// Asserts nothing arrives within a short window
    pub async fn expect_silence(&mut self) {
        match tokio::time::timeout(SILENCE_WINDOW, self.receiver.recv()).await {
            Ok(Ok(event)) => panic!("expected no events, got {event:?}"),
            // A closed stream is silent too
            Ok(Err(_)) | Err(_) => {}
        }
    }

    /// Asserts the underlying channel has been torn down
    pub async fn expect_closed(&mut self) {
        loop {
            match tokio::time::timeout(RECV_TIMEOUT, self.receiver.recv())
                .await
                .expect("timed out waiting for the stream to close")
            {
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}
