use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::Participant;

/// Result of a presence upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    /// First insertion for this user; the caller should emit `user_joined`
    Joined(Participant),
    /// Already present; only last_seen was refreshed
    Refreshed,
}

/// Current participants of one room, keyed by user. Insertion order is
/// preserved for listing.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn contains(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Idempotent upsert. Repeated calls for the same user refresh
    /// last_seen_at and leave everything else unchanged.
    pub fn add(&mut self, user_id: Uuid, display_name: &str, now: DateTime<Utc>) -> PresenceChange {
        if let Some(existing) = self.participants.iter_mut().find(|p| p.user_id == user_id) {
            existing.last_seen_at = now;
            return PresenceChange::Refreshed;
        }
        let participant = Participant {
            user_id,
            display_name: display_name.to_string(),
            joined_at: now,
            last_seen_at: now,
        };
        self.participants.push(participant.clone());
        PresenceChange::Joined(participant)
    }

    /// Heartbeat refresh. Returns false if the user is not present.
    pub fn touch(&mut self, user_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.participants.iter_mut().find(|p| p.user_id == user_id) {
            Some(p) => {
                p.last_seen_at = now;
                true
            }
            None => false,
        }
    }

    /// Explicit leave or detected disconnect
    pub fn remove(&mut self, user_id: Uuid) -> Option<Participant> {
        let idx = self.participants.iter().position(|p| p.user_id == user_id)?;
        Some(self.participants.remove(idx))
    }

    /// Users whose last heartbeat is older than the cutoff
    pub fn stale(&self, cutoff: DateTime<Utc>) -> Vec<Uuid> {
        self.participants
            .iter()
            .filter(|p| p.last_seen_at < cutoff)
            .map(|p| p.user_id)
            .collect()
    }
}
