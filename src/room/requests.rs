use chrono::Utc;
use uuid::Uuid;

use super::models::{JoinRequest, JoinRequestStatus};
use crate::shared::AppError;

/// Per-room join request log. State machine per request:
/// Pending -> {Approved, Rejected}, both terminal. At most one Pending
/// request may exist per user. A rejected user may file again; only
/// Pending uniqueness is enforced.
#[derive(Debug, Clone, Default)]
pub struct RequestBook {
    requests: Vec<JoinRequest>,
}

impl RequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self, user_id: Uuid) -> bool {
        self.requests
            .iter()
            .any(|r| r.user_id == user_id && r.status == JoinRequestStatus::Pending)
    }

    pub fn has_approved(&self, user_id: Uuid) -> bool {
        self.requests
            .iter()
            .any(|r| r.user_id == user_id && r.status == JoinRequestStatus::Approved)
    }

    /// Files a new Pending request. Conflict if one is already pending.
    pub fn file(
        &mut self,
        room_id: Uuid,
        user_id: Uuid,
        display_name: &str,
    ) -> Result<JoinRequest, AppError> {
        if self.has_pending(user_id) {
            return Err(AppError::Conflict(
                "a pending join request already exists for this user".to_string(),
            ));
        }
        let request = JoinRequest {
            id: Uuid::new_v4(),
            room_id,
            user_id,
            display_name: display_name.to_string(),
            status: JoinRequestStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
        };
        self.requests.push(request.clone());
        Ok(request)
    }

    /// Moves a Pending request to a terminal status exactly once.
    pub fn resolve(
        &mut self,
        request_id: Uuid,
        status: JoinRequestStatus,
    ) -> Result<JoinRequest, AppError> {
        debug_assert!(status != JoinRequestStatus::Pending);
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| AppError::NotFound(format!("join request {request_id} not found")))?;
        if request.status != JoinRequestStatus::Pending {
            return Err(AppError::InvalidState(
                "join request is not pending: terminal states are immutable".to_string(),
            ));
        }
        request.status = status;
        request.responded_at = Some(Utc::now());
        Ok(request.clone())
    }

    /// Requests, newest first, optionally filtered by status
    pub fn list(&self, status: Option<JoinRequestStatus>) -> Vec<JoinRequest> {
        let mut out: Vec<JoinRequest> = self
            .requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        out
    }
}
