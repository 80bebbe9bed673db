use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::events::RoomEvent;

/// Per-subscriber buffer depth; a subscriber that falls further behind than
/// this skips ahead (delivery is best-effort, never replayed)
const CHANNEL_CAPACITY: usize = 256;

/// Per-room publish/subscribe fan-out of domain events.
///
/// One broadcast channel per room, created on demand. Publishes for one room
/// go through a single sender, so subscribers observe commit order; delivery
/// across distinct subscribers proceeds in parallel as each drains its own
/// receiver.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<RoomEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event to every currently-subscribed channel for the room.
    /// Best-effort: with no subscribers the event is dropped.
    pub async fn publish(&self, event: RoomEvent) {
        let room_id = event.room_id();
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(&room_id) {
            match sender.send(event) {
                Ok(receivers) => {
                    debug!(room_id = %room_id, receivers, "room event published");
                }
                Err(_) => {
                    debug!(room_id = %room_id, "room event published with no receivers");
                }
            }
        } else {
            debug!(room_id = %room_id, "no channel for room, event dropped");
        }
    }

    /// Subscribes a connection to a room's events, creating the channel if
    /// this is the room's first subscriber
    pub async fn subscribe(&self, room_id: Uuid) -> broadcast::Receiver<RoomEvent> {
        {
            let channels = self.channels.read().await;
            if let Some(sender) = channels.get(&room_id) {
                return sender.subscribe();
            }
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(room_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Drops the room's channel; pending receivers observe Closed and the
    /// gateways shut their connections down
    pub async fn remove_room(&self, room_id: Uuid) {
        let mut channels = self.channels.write().await;
        if channels.remove(&room_id).is_some() {
            debug!(room_id = %room_id, "room channel removed");
        }
    }

    /// Subscriber count for one room, used by tests and diagnostics
    pub async fn subscriber_count(&self, room_id: Uuid) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(&room_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
