use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::event::{EventBus, RoomEvent};
use crate::shared::AppError;

use super::access::{evaluate_join, hash_password, DenyReason, JoinDecision};
use super::models::{
    generate_room_code, AccessMode, JoinRequest, JoinRequestStatus, Message, Participant,
    RoomModel, MESSAGE_MAX_CODE_POINTS,
};
use super::presence::PresenceChange;
use super::repository::{RoomRepository, RoomState};
use super::types::{RoomCreateRequest, RoomDetail, RoomSummary, RoomUpdateRequest};

const CODE_GENERATION_ATTEMPTS: usize = 16;

/// The command surface for everything that happens inside a room. Every
/// mutation runs under that room's writer lock, so load-modify-store on the
/// repository is race free and events are published in commit order.
pub struct RoomSessionService {
    repository: Arc<dyn RoomRepository>,
    catalog: Arc<dyn CatalogService>,
    event_bus: EventBus,
    locks: tokio::sync::Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl RoomSessionService {
    pub fn new(
        repository: Arc<dyn RoomRepository>,
        catalog: Arc<dyn CatalogService>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            repository,
            catalog,
            event_bus,
            locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    async fn writer_lock(&self, room_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(room_id).or_default().clone()
    }

    /// NotFound instead of None. Callers that mutate hold the room's writer
    /// lock around this; snapshot reads call it bare.
    async fn load_or_not_found(&self, room_id: Uuid) -> Result<RoomState, AppError> {
        self.repository
            .load(room_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("room {room_id} not found")))
    }

    /// Destroys a room while its writer lock is held: announce, then drop the
    /// channel so every live subscriber sees room_deleted before the close.
    async fn teardown_locked(&self, room_id: Uuid) -> Result<(), AppError> {
        self.repository.remove(room_id).await?;
        self.event_bus
            .publish(RoomEvent::RoomDeleted { room_id })
            .await;
        self.event_bus.remove_room(room_id).await;
        self.locks.lock().await.remove(&room_id);
        info!(%room_id, "room destroyed");
        Ok(())
    }

    #[instrument(skip(self, request), fields(creator = %creator_id))]
    pub async fn create_room(
        &self,
        creator_id: Uuid,
        display_name: &str,
        request: RoomCreateRequest,
    ) -> Result<RoomDetail, AppError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("room name must not be empty".to_string()));
        }

        let password_hash = match request.access_mode {
            AccessMode::Password => match request.password.as_deref() {
                Some(secret) if !secret.is_empty() => Some(hash_password(secret)?),
                _ => {
                    return Err(AppError::Validation(
                        "password-protected rooms require a password".to_string(),
                    ))
                }
            },
            _ => None,
        };

        let mut room = RoomModel::new(creator_id, name.to_string(), request.description);
        room.access_mode = request.access_mode;
        room.password_hash = password_hash;
        room.open_for_requests = request.open_for_requests;
        room.auto_destroy_on_empty = request.auto_destroy_on_empty;

        let mut state = RoomState::new(room);
        state.roster.add(creator_id, display_name, Utc::now());

        // Codes collide rarely. Insert enforces uniqueness, so rather than a
        // racy check-then-insert, draw a fresh code whenever the insert
        // reports a collision.
        let mut attempts = 0;
        loop {
            state.room.code = generate_room_code();
            match self.repository.insert(state.clone()).await {
                Ok(()) => break,
                Err(AppError::Conflict(_)) => {
                    attempts += 1;
                    if attempts >= CODE_GENERATION_ATTEMPTS {
                        return Err(AppError::Internal(
                            "could not allocate a unique room code".to_string(),
                        ));
                    }
                }
                Err(e) => return Err(e),
            }
        }

        info!(room_id = %state.room.id, code = %state.room.code, "room created");
        Ok(RoomDetail::from_state(&state, creator_id))
    }

    pub async fn room_detail(&self, viewer: Uuid, room_id: Uuid) -> Result<RoomDetail, AppError> {
        let state = self.load_or_not_found(room_id).await?;
        Ok(RoomDetail::from_state(&state, viewer))
    }

    pub async fn room_detail_by_code(
        &self,
        viewer: Uuid,
        code: &str,
    ) -> Result<RoomDetail, AppError> {
        let room_id = self.resolve_code(code).await?;
        self.room_detail(viewer, room_id).await
    }

    async fn resolve_code(&self, code: &str) -> Result<Uuid, AppError> {
        self.repository
            .resolve_code(&code.trim().to_uppercase())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("no room with code {code}")))
    }

    pub async fn list_user_rooms(&self, user_id: Uuid) -> Result<Vec<RoomSummary>, AppError> {
        let states = self.repository.list_for_user(user_id).await?;
        Ok(states.iter().map(RoomSummary::from_state).collect())
    }

    pub async fn list_public_rooms(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<RoomSummary>, AppError> {
        let states = self.repository.list_public(skip, limit).await?;
        Ok(states.iter().map(RoomSummary::from_state).collect())
    }

    #[instrument(skip(self, update), fields(actor = %actor_id))]
    pub async fn update_room(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        update: RoomUpdateRequest,
    ) -> Result<RoomDetail, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        if !state.room.is_creator(actor_id) {
            return Err(AppError::Forbidden(
                "only the room creator can change its settings".to_string(),
            ));
        }

        if let Some(name) = update.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(AppError::Validation("room name must not be empty".to_string()));
            }
            state.room.name = name;
        }
        if let Some(description) = update.description {
            state.room.description = Some(description);
        }
        if let Some(mode) = update.access_mode {
            state.room.access_mode = mode;
            if mode != AccessMode::Password {
                state.room.password_hash = None;
            }
        }
        if let Some(secret) = update.password {
            if state.room.access_mode != AccessMode::Password {
                return Err(AppError::Validation(
                    "a password can only be set on password-protected rooms".to_string(),
                ));
            }
            if secret.is_empty() {
                return Err(AppError::Validation(
                    "password must not be empty".to_string(),
                ));
            }
            state.room.password_hash = Some(hash_password(&secret)?);
        }
        if state.room.access_mode == AccessMode::Password && state.room.password_hash.is_none() {
            return Err(AppError::Validation(
                "password-protected rooms require a password".to_string(),
            ));
        }
        if let Some(open) = update.open_for_requests {
            if state.room.access_mode != AccessMode::Approval {
                return Err(AppError::Validation(
                    "open_for_requests only applies to approval rooms".to_string(),
                ));
            }
            state.room.open_for_requests = open;
        }
        if let Some(auto) = update.auto_destroy_on_empty {
            state.room.auto_destroy_on_empty = auto;
        }

        let now = Utc::now();
        state.room.updated_at = now;
        state.room.record_activity(now);

        let event = RoomEvent::RoomUpdated {
            room_id,
            name: state.room.name.clone(),
            description: state.room.description.clone(),
            access_mode: state.room.access_mode,
        };
        let detail = RoomDetail::from_state(&state, actor_id);
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(detail)
    }

    #[instrument(skip(self), fields(actor = %actor_id))]
    pub async fn delete_room(&self, actor_id: Uuid, room_id: Uuid) -> Result<(), AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let state = self.load_or_not_found(room_id).await?;
        if !state.room.is_creator(actor_id) {
            return Err(AppError::Forbidden(
                "only the room creator can delete it".to_string(),
            ));
        }
        self.teardown_locked(room_id).await
    }

    #[instrument(skip(self, password), fields(user = %user_id))]
    pub async fn join_room(
        &self,
        user_id: Uuid,
        display_name: &str,
        room_id: Uuid,
        password: Option<&str>,
    ) -> Result<RoomDetail, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        let decision = evaluate_join(
            &state.room,
            user_id,
            password,
            state.requests.has_approved(user_id),
        );
        match decision {
            JoinDecision::Allow => {}
            JoinDecision::RequireApproval => {
                return Err(AppError::Denied(
                    "this room requires approval: request to join first".to_string(),
                ))
            }
            JoinDecision::Deny(DenyReason::InvalidCredentials) => {
                return Err(AppError::InvalidCredentials)
            }
            JoinDecision::Deny(DenyReason::RequestsClosed) => {
                return Err(AppError::RequestsClosed)
            }
        }

        let now = Utc::now();
        let change = state.roster.add(user_id, display_name, now);
        state.room.record_activity(now);

        let event = match change {
            PresenceChange::Joined(ref participant) => Some(RoomEvent::UserJoined {
                room_id,
                user_id,
                display_name: participant.display_name.clone(),
            }),
            PresenceChange::Refreshed => None,
        };
        let detail = RoomDetail::from_state(&state, user_id);
        self.repository.store(state).await?;
        if let Some(event) = event {
            debug!(%room_id, %user_id, "user joined");
            self.event_bus.publish(event).await;
        }
        Ok(detail)
    }

    pub async fn join_room_by_code(
        &self,
        user_id: Uuid,
        display_name: &str,
        code: &str,
        password: Option<&str>,
    ) -> Result<RoomDetail, AppError> {
        let room_id = self.resolve_code(code).await?;
        self.join_room(user_id, display_name, room_id, password).await
    }

    #[instrument(skip(self), fields(user = %user_id))]
    pub async fn request_join(
        &self,
        user_id: Uuid,
        display_name: &str,
        code: &str,
    ) -> Result<JoinRequest, AppError> {
        let room_id = self.resolve_code(code).await?;
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        if state.room.access_mode != AccessMode::Approval {
            return Err(AppError::Validation(
                "this room does not use join approval".to_string(),
            ));
        }
        if state.room.is_creator(user_id) || state.roster.contains(user_id) {
            return Err(AppError::Conflict(
                "you are already a participant in this room".to_string(),
            ));
        }
        if !state.room.open_for_requests {
            return Err(AppError::RequestsClosed);
        }

        let request = state.requests.file(room_id, user_id, display_name)?;
        state.room.record_activity(Utc::now());

        let event = RoomEvent::JoinRequestReceived {
            room_id,
            request_id: request.id,
            user_id,
            display_name: request.display_name.clone(),
        };
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(request)
    }

    #[instrument(skip(self), fields(actor = %actor_id))]
    pub async fn approve_request(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        request_id: Uuid,
    ) -> Result<JoinRequest, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        if !state.room.is_creator(actor_id) {
            return Err(AppError::Forbidden(
                "only the room creator can approve join requests".to_string(),
            ));
        }

        let request = state
            .requests
            .resolve(request_id, JoinRequestStatus::Approved)?;
        let now = Utc::now();
        let change = state
            .roster
            .add(request.user_id, &request.display_name, now);
        state.room.record_activity(now);

        let event = match change {
            PresenceChange::Joined(_) => Some(RoomEvent::UserJoined {
                room_id,
                user_id: request.user_id,
                display_name: request.display_name.clone(),
            }),
            PresenceChange::Refreshed => None,
        };
        self.repository.store(state).await?;
        if let Some(event) = event {
            self.event_bus.publish(event).await;
        }
        Ok(request)
    }

    #[instrument(skip(self), fields(actor = %actor_id))]
    pub async fn reject_request(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        request_id: Uuid,
    ) -> Result<JoinRequest, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        if !state.room.is_creator(actor_id) {
            return Err(AppError::Forbidden(
                "only the room creator can reject join requests".to_string(),
            ));
        }

        // Rejection is silent on the live channel; the requester may file
        // again later.
        let request = state
            .requests
            .resolve(request_id, JoinRequestStatus::Rejected)?;
        state.room.record_activity(Utc::now());
        self.repository.store(state).await?;
        Ok(request)
    }

    #[instrument(skip(self), fields(user = %user_id))]
    pub async fn leave_room(&self, user_id: Uuid, room_id: Uuid) -> Result<(), AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        if !state.roster.contains(user_id) {
            return Err(AppError::Validation(
                "you are not a participant in this room".to_string(),
            ));
        }
        if state.room.is_creator(user_id) && state.roster.len() > 1 {
            return Err(AppError::Validation(
                "the creator cannot leave while other participants remain".to_string(),
            ));
        }

        let removed = state.roster.remove(user_id);
        state.room.record_activity(Utc::now());

        let empty = state.roster.is_empty();
        let auto_destroy = state.room.auto_destroy_on_empty;

        if empty && auto_destroy {
            // user_left still goes out before the room is torn down
            if let Some(participant) = removed {
                self.event_bus
                    .publish(RoomEvent::UserLeft {
                        room_id,
                        user_id,
                        display_name: participant.display_name,
                    })
                    .await;
            }
            return self.teardown_locked(room_id).await;
        }

        self.repository.store(state).await?;
        if let Some(participant) = removed {
            self.event_bus
                .publish(RoomEvent::UserLeft {
                    room_id,
                    user_id,
                    display_name: participant.display_name,
                })
                .await;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(actor = %actor_id))]
    pub async fn add_song(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        song_id: Uuid,
    ) -> Result<RoomDetail, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        self.require_creator(&state, actor_id)?;
        if !self.catalog.song_exists(song_id).await? {
            return Err(AppError::NotFound(format!(
                "song {song_id} not found in the catalog"
            )));
        }

        let entry = state.setlist.add(song_id)?;
        let now = Utc::now();
        state.roster.touch(actor_id, now);
        state.room.record_activity(now);

        let event = RoomEvent::ItemAdded {
            room_id,
            song_id,
            order: entry.order,
        };
        let detail = RoomDetail::from_state(&state, actor_id);
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(detail)
    }

    #[instrument(skip(self), fields(actor = %actor_id))]
    pub async fn remove_song(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        song_id: Uuid,
    ) -> Result<RoomDetail, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        self.require_creator(&state, actor_id)?;

        state.setlist.remove(song_id)?;
        let now = Utc::now();
        state.roster.touch(actor_id, now);
        state.room.record_activity(now);

        let event = RoomEvent::ItemRemoved { room_id, song_id };
        let detail = RoomDetail::from_state(&state, actor_id);
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(detail)
    }

    #[instrument(skip(self, assignments), fields(actor = %actor_id))]
    pub async fn reorder_songs(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        assignments: HashMap<Uuid, usize>,
    ) -> Result<RoomDetail, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        self.require_creator(&state, actor_id)?;

        let entries = state.setlist.reorder(&assignments)?;
        let now = Utc::now();
        state.roster.touch(actor_id, now);
        state.room.record_activity(now);

        let event = RoomEvent::ItemsReordered { room_id, entries };
        let detail = RoomDetail::from_state(&state, actor_id);
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(detail)
    }

    #[instrument(skip(self), fields(actor = %actor_id))]
    pub async fn import_list(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        list_id: Uuid,
    ) -> Result<RoomDetail, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        self.require_creator(&state, actor_id)?;

        let songs = self
            .catalog
            .list_songs(list_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("list {list_id} not found")))?;

        let appended = state.setlist.import_from(&songs);
        let added: Vec<Uuid> = appended.iter().map(|e| e.song_id).collect();
        let now = Utc::now();
        state.roster.touch(actor_id, now);
        state.room.record_activity(now);
        info!(%room_id, %list_id, added = added.len(), "list imported");

        let event = RoomEvent::ListImported {
            room_id,
            list_id,
            added,
        };
        let detail = RoomDetail::from_state(&state, actor_id);
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(detail)
    }

    #[instrument(skip(self, body), fields(user = %user_id))]
    pub async fn send_message(
        &self,
        user_id: Uuid,
        display_name: &str,
        room_id: Uuid,
        body: String,
    ) -> Result<Message, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let mut state = self.load_or_not_found(room_id).await?;
        self.require_participant(&state, user_id)?;

        if body.trim().is_empty() {
            return Err(AppError::Validation(
                "message body must not be empty".to_string(),
            ));
        }
        if body.chars().count() > MESSAGE_MAX_CODE_POINTS {
            return Err(AppError::Validation(format!(
                "message body must be at most {MESSAGE_MAX_CODE_POINTS} code points"
            )));
        }

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            room_id,
            user_id,
            display_name: display_name.to_string(),
            body,
            created_at: now,
        };
        state.messages.push(message.clone());
        state.roster.touch(user_id, now);
        state.room.record_activity(now);

        let event = RoomEvent::MessageSent {
            room_id,
            message_id: message.id,
            user_id,
            display_name: message.display_name.clone(),
            body: message.body.clone(),
            created_at: message.created_at,
        };
        self.repository.store(state).await?;
        self.event_bus.publish(event).await;
        Ok(message)
    }

    /// Most recent window of the message history, oldest first within the
    /// window. Participants only.
    pub async fn get_messages(
        &self,
        user_id: Uuid,
        room_id: Uuid,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>, AppError> {
        let state = self.load_or_not_found(room_id).await?;
        self.require_participant(&state, user_id)?;

        let total = state.messages.len();
        let end = total.saturating_sub(offset);
        let start = end.saturating_sub(limit);
        Ok(state.messages[start..end].to_vec())
    }

    pub async fn list_participants(
        &self,
        user_id: Uuid,
        room_id: Uuid,
    ) -> Result<Vec<Participant>, AppError> {
        let state = self.load_or_not_found(room_id).await?;
        self.require_participant(&state, user_id)?;
        Ok(state.roster.participants().to_vec())
    }

    pub async fn list_join_requests(
        &self,
        actor_id: Uuid,
        room_id: Uuid,
        status: Option<JoinRequestStatus>,
    ) -> Result<Vec<JoinRequest>, AppError> {
        let state = self.load_or_not_found(room_id).await?;
        if !state.room.is_creator(actor_id) {
            return Err(AppError::Forbidden(
                "only the room creator can view join requests".to_string(),
            ));
        }
        Ok(state.requests.list(status))
    }

    /// Whether the user currently counts as a participant. Gate for the live
    /// event channel.
    pub async fn is_participant(&self, user_id: Uuid, room_id: Uuid) -> Result<bool, AppError> {
        let state = self.load_or_not_found(room_id).await?;
        Ok(state.roster.contains(user_id))
    }

    /// Refreshes a participant's last_seen. Heartbeats from the live channel
    /// land here.
    pub async fn touch_presence(&self, user_id: Uuid, room_id: Uuid) -> Result<bool, AppError> {
        let lock = self.writer_lock(room_id).await;
        let _guard = lock.lock().await;

        let Some(mut state) = self.repository.load(room_id).await? else {
            return Ok(false);
        };
        let touched = state.roster.touch(user_id, Utc::now());
        if touched {
            self.repository.store(state).await?;
        }
        Ok(touched)
    }

    /// Removes participants not seen within `timeout` from every room,
    /// destroying rooms that empty out with auto destroy on. Returns
    /// (participants expired, rooms destroyed).
    pub async fn expire_stale(&self, timeout: Duration) -> Result<(usize, usize), AppError> {
        let cutoff = Utc::now() - timeout;
        let mut expired = 0;
        let mut destroyed = 0;

        for room_id in self.repository.all_ids().await? {
            let lock = self.writer_lock(room_id).await;
            let _guard = lock.lock().await;

            // May have been torn down since we listed ids
            let Some(mut state) = self.repository.load(room_id).await? else {
                continue;
            };
            let stale = state.roster.stale(cutoff);
            if stale.is_empty() {
                continue;
            }

            for user_id in stale {
                if let Some(participant) = state.roster.remove(user_id) {
                    expired += 1;
                    warn!(%room_id, %user_id, "participant presence expired");
                    self.event_bus
                        .publish(RoomEvent::UserLeft {
                            room_id,
                            user_id,
                            display_name: participant.display_name,
                        })
                        .await;
                }
            }

            if state.roster.is_empty() && state.room.auto_destroy_on_empty {
                self.teardown_locked(room_id).await?;
                destroyed += 1;
            } else {
                self.repository.store(state).await?;
            }
        }

        Ok((expired, destroyed))
    }

    /// Destroys rooms whose last activity is older than `threshold`.
    pub async fn reap_idle(&self, threshold: Duration) -> Result<usize, AppError> {
        let cutoff = Utc::now() - threshold;
        let mut reaped = 0;

        for room_id in self.repository.idle_since(cutoff).await? {
            let lock = self.writer_lock(room_id).await;
            let _guard = lock.lock().await;

            let Some(state) = self.repository.load(room_id).await? else {
                continue;
            };
            // Re-check under the lock; activity may have landed meanwhile
            if state.room.last_activity_at >= cutoff {
                continue;
            }
            self.teardown_locked(room_id).await?;
            reaped += 1;
        }

        Ok(reaped)
    }

    fn require_creator(&self, state: &RoomState, user_id: Uuid) -> Result<(), AppError> {
        if state.room.is_creator(user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "only the room creator can modify the setlist".to_string(),
            ))
        }
    }

    fn require_participant(&self, state: &RoomState, user_id: Uuid) -> Result<(), AppError> {
        if state.roster.contains(user_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "you must be a participant in this room".to_string(),
            ))
        }
    }
}
