use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::models::{Message, RoomModel};
use super::presence::Roster;
use super::requests::RequestBook;
use super::setlist::Setlist;
use crate::shared::AppError;

/// Everything owned by one room: the record itself plus roster, setlist,
/// join requests and chat history. Loaded and stored as a unit; the service
/// serializes writers per room, so load-modify-store is race-free.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: RoomModel,
    pub roster: Roster,
    pub setlist: Setlist,
    pub requests: RequestBook,
    pub messages: Vec<Message>,
}

impl RoomState {
    pub fn new(room: RoomModel) -> Self {
        Self {
            room,
            roster: Roster::new(),
            setlist: Setlist::new(),
            requests: RequestBook::new(),
            messages: Vec::new(),
        }
    }
}

/// Storage collaborator for room aggregates. The durable engine behind this
/// trait is provided externally; the in-memory implementation below is the
/// development and test backend.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Inserts a new room. Conflict if the id or join code is taken.
    async fn insert(&self, state: RoomState) -> Result<(), AppError>;

    /// Snapshot of one room's full state
    async fn load(&self, room_id: Uuid) -> Result<Option<RoomState>, AppError>;

    /// Resolves a join code to a room id
    async fn resolve_code(&self, code: &str) -> Result<Option<Uuid>, AppError>;

    /// Replaces a room's state. NotFound if the room no longer exists.
    async fn store(&self, state: RoomState) -> Result<(), AppError>;

    /// Removes a room and everything it owns. Returns whether it existed.
    async fn remove(&self, room_id: Uuid) -> Result<bool, AppError>;

    /// Rooms where the user is creator or participant, most recently active
    /// first
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<RoomState>, AppError>;

    /// Public rooms, most recently active first, with paging
    async fn list_public(&self, skip: usize, limit: usize) -> Result<Vec<RoomState>, AppError>;

    /// All room ids, for the presence sweeper
    async fn all_ids(&self) -> Result<Vec<Uuid>, AppError>;

    /// Ids of rooms whose last activity is older than the cutoff
    async fn idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, AppError>;
}

/// In-memory implementation of RoomRepository for development and testing
#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<Uuid, RoomState>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn insert(&self, state: RoomState) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&state.room.id) {
            return Err(AppError::Conflict("room id already exists".to_string()));
        }
        if rooms.values().any(|s| s.room.code == state.room.code) {
            return Err(AppError::Conflict(format!(
                "room code {} is already in use",
                state.room.code
            )));
        }
        debug!(room_id = %state.room.id, code = %state.room.code, "room inserted");
        rooms.insert(state.room.id, state);
        Ok(())
    }

    async fn load(&self, room_id: Uuid) -> Result<Option<RoomState>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(&room_id).cloned())
    }

    async fn resolve_code(&self, code: &str) -> Result<Option<Uuid>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .find(|s| s.room.code == code)
            .map(|s| s.room.id))
    }

    async fn store(&self, state: RoomState) -> Result<(), AppError> {
        let mut rooms = self.rooms.write().await;
        if !rooms.contains_key(&state.room.id) {
            return Err(AppError::NotFound(format!(
                "room {} not found",
                state.room.id
            )));
        }
        rooms.insert(state.room.id, state);
        Ok(())
    }

    async fn remove(&self, room_id: Uuid) -> Result<bool, AppError> {
        let mut rooms = self.rooms.write().await;
        let existed = rooms.remove(&room_id).is_some();
        if existed {
            debug!(room_id = %room_id, "room removed");
        }
        Ok(existed)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<RoomState>, AppError> {
        let rooms = self.rooms.read().await;
        let mut out: Vec<RoomState> = rooms
            .values()
            .filter(|s| s.room.creator_id == user_id || s.roster.contains(user_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.room.last_activity_at.cmp(&a.room.last_activity_at));
        Ok(out)
    }

    async fn list_public(&self, skip: usize, limit: usize) -> Result<Vec<RoomState>, AppError> {
        let rooms = self.rooms.read().await;
        let mut out: Vec<RoomState> = rooms
            .values()
            .filter(|s| s.room.access_mode == super::models::AccessMode::Public)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.room.last_activity_at.cmp(&a.room.last_activity_at));
        Ok(out.into_iter().skip(skip).take(limit).collect())
    }

    async fn all_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.keys().copied().collect())
    }

    async fn idle_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .values()
            .filter(|s| s.room.last_activity_at < cutoff)
            .map(|s| s.room.id)
            .collect())
    }
}
