use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::room::models::SetlistEntry;

/// Domain events for room collaboration.
///
/// Events are facts about things that have already happened. Each one
/// serializes to a single self-contained wire frame with a `type`
/// discriminator, so clients never need to correlate frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Synthetic first frame on a freshly opened live channel
    Connected { room_id: Uuid },

    /// A song was appended to the setlist
    ItemAdded {
        room_id: Uuid,
        song_id: Uuid,
        order: usize,
    },

    /// A song was removed and the remaining orders compacted
    ItemRemoved { room_id: Uuid, song_id: Uuid },

    /// The setlist was reordered. Carries the complete new ordering so
    /// clients resynchronize wholesale instead of diffing; the protocol
    /// therefore tolerates lost events.
    ItemsReordered {
        room_id: Uuid,
        entries: Vec<SetlistEntry>,
    },

    /// A chat message was stored and broadcast
    MessageSent {
        room_id: Uuid,
        message_id: Uuid,
        user_id: Uuid,
        display_name: String,
        body: String,
        created_at: DateTime<Utc>,
    },

    /// A user became a participant (join or approved request)
    UserJoined {
        room_id: Uuid,
        user_id: Uuid,
        display_name: String,
    },

    /// A user left or was expired by the presence sweeper
    UserLeft {
        room_id: Uuid,
        user_id: Uuid,
        display_name: String,
    },

    /// The creator changed room settings
    RoomUpdated {
        room_id: Uuid,
        name: String,
        description: Option<String>,
        access_mode: crate::room::models::AccessMode,
    },

    /// The room was torn down; the channel closes after this frame
    RoomDeleted { room_id: Uuid },

    /// Songs from an external list were appended to the setlist
    ListImported {
        room_id: Uuid,
        list_id: Uuid,
        added: Vec<Uuid>,
    },

    /// A membership application arrived (approval-mode rooms)
    JoinRequestReceived {
        room_id: Uuid,
        request_id: Uuid,
        user_id: Uuid,
        display_name: String,
    },
}

impl RoomEvent {
    /// The room this event belongs to; all events are room-scoped
    pub fn room_id(&self) -> Uuid {
        match self {
            RoomEvent::Connected { room_id }
            | RoomEvent::ItemAdded { room_id, .. }
            | RoomEvent::ItemRemoved { room_id, .. }
            | RoomEvent::ItemsReordered { room_id, .. }
            | RoomEvent::MessageSent { room_id, .. }
            | RoomEvent::UserJoined { room_id, .. }
            | RoomEvent::UserLeft { room_id, .. }
            | RoomEvent::RoomUpdated { room_id, .. }
            | RoomEvent::RoomDeleted { room_id }
            | RoomEvent::ListImported { room_id, .. }
            | RoomEvent::JoinRequestReceived { room_id, .. } => *room_id,
        }
    }

    /// Wire discriminator, as serialized into the frame's `type` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::Connected { .. } => "connected",
            RoomEvent::ItemAdded { .. } => "item_added",
            RoomEvent::ItemRemoved { .. } => "item_removed",
            RoomEvent::ItemsReordered { .. } => "items_reordered",
            RoomEvent::MessageSent { .. } => "message_sent",
            RoomEvent::UserJoined { .. } => "user_joined",
            RoomEvent::UserLeft { .. } => "user_left",
            RoomEvent::RoomUpdated { .. } => "room_updated",
            RoomEvent::RoomDeleted { .. } => "room_deleted",
            RoomEvent::ListImported { .. } => "list_imported",
            RoomEvent::JoinRequestReceived { .. } => "join_request_received",
        }
    }
}
