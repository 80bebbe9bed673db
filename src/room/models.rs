use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access control mode for a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Public,
    Password,
    Approval,
}

/// Room record. `password_hash` is present iff `access_mode` is Password;
/// `open_for_requests` is meaningful iff `access_mode` is Approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomModel {
    pub id: Uuid,
    /// Short join code, 8 uppercase alphanumeric characters, unique
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub creator_id: Uuid,
    pub access_mode: AccessMode,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub open_for_requests: bool,
    pub auto_destroy_on_empty: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a candidate join code. Uniqueness is enforced at insert time.
pub fn generate_room_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

impl RoomModel {
    pub fn new(creator_id: Uuid, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code: generate_room_code(),
            name,
            description,
            creator_id,
            access_mode: AccessMode::Public,
            password_hash: None,
            open_for_requests: true,
            auto_destroy_on_empty: true,
            created_at: now,
            updated_at: now,
            last_activity_at: now,
        }
    }

    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = now;
    }
}

/// A user currently counted as present in a room. Unique per (room, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Status of a membership application. Pending is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinRequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A membership application under approval-mode access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub status: JoinRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// One song slot in a room's setlist. Orders within a room always form a
/// contiguous permutation of [0..n).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetlistEntry {
    pub song_id: Uuid,
    pub order: usize,
    pub added_at: DateTime<Utc>,
}

/// Maximum chat message length, counted in Unicode code points
pub const MESSAGE_MAX_CODE_POINTS: usize = 140;

/// An immutable chat message, ordered by created_at then id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
