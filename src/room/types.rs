use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::{AccessMode, JoinRequestStatus, Participant, SetlistEntry};
use super::repository::RoomState;

fn default_true() -> bool {
    true
}

fn default_access_mode() -> AccessMode {
    AccessMode::Public
}

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct RoomCreateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_access_mode")]
    pub access_mode: AccessMode,
    /// Required iff access_mode is password
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub open_for_requests: bool,
    #[serde(default = "default_true")]
    pub auto_destroy_on_empty: bool,
}

/// Request payload for updating room settings; absent fields are unchanged
#[derive(Debug, Default, Deserialize)]
pub struct RoomUpdateRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub access_mode: Option<AccessMode>,
    pub password: Option<String>,
    pub open_for_requests: Option<bool>,
    pub auto_destroy_on_empty: Option<bool>,
}

/// Request payload for joining a room
#[derive(Debug, Default, Deserialize)]
pub struct JoinRoomRequest {
    pub password: Option<String>,
}

/// One song -> order assignment in a reorder call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAssignment {
    pub song_id: Uuid,
    pub order: usize,
}

/// Request payload for reordering the setlist; may cover all songs or a subset
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub orders: Vec<OrderAssignment>,
}

/// Request payload for sending a chat message
#[derive(Debug, Deserialize)]
pub struct MessageCreateRequest {
    pub body: String,
}

/// Paging for public room listing
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page_limit")]
    pub limit: usize,
}

fn default_page_limit() -> usize {
    100
}

/// Paging for message history
#[derive(Debug, Deserialize)]
pub struct MessagePageQuery {
    #[serde(default = "default_page_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

/// Optional status filter for join request listing
#[derive(Debug, Deserialize)]
pub struct RequestFilterQuery {
    pub status: Option<JoinRequestStatus>,
}

/// Room listing entry
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub access_mode: AccessMode,
    pub open_for_requests: bool,
    pub auto_destroy_on_empty: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub participants_count: usize,
    pub songs_count: usize,
}

impl RoomSummary {
    pub fn from_state(state: &RoomState) -> Self {
        let room = &state.room;
        Self {
            id: room.id,
            code: room.code.clone(),
            name: room.name.clone(),
            description: room.description.clone(),
            creator_id: room.creator_id,
            access_mode: room.access_mode,
            open_for_requests: room.open_for_requests,
            auto_destroy_on_empty: room.auto_destroy_on_empty,
            created_at: room.created_at,
            updated_at: room.updated_at,
            last_activity_at: room.last_activity_at,
            participants_count: state.roster.len(),
            songs_count: state.setlist.len(),
        }
    }
}

/// Full room view for a specific viewer
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub summary: RoomSummary,
    pub is_creator: bool,
    pub is_participant: bool,
    pub songs: Vec<SetlistEntry>,
    pub participants: Vec<Participant>,
}

impl RoomDetail {
    pub fn from_state(state: &RoomState, viewer: Uuid) -> Self {
        Self {
            summary: RoomSummary::from_state(state),
            is_creator: state.room.is_creator(viewer),
            is_participant: state.roster.contains(viewer),
            songs: state.setlist.entries().to_vec(),
            participants: state.roster.participants().to_vec(),
        }
    }
}
