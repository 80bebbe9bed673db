use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

use super::models::{AccessMode, RoomModel};
use crate::shared::AppError;

/// Outcome of evaluating a join attempt against a room's access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDecision {
    Allow,
    RequireApproval,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    InvalidCredentials,
    RequestsClosed,
}

/// Decides whether a join attempt is allowed. Pure: no side effects, no
/// state mutation. `has_approval` is whether the caller holds an Approved
/// join request for this room.
pub fn evaluate_join(
    room: &RoomModel,
    caller_id: Uuid,
    password: Option<&str>,
    has_approval: bool,
) -> JoinDecision {
    match room.access_mode {
        AccessMode::Public => JoinDecision::Allow,
        AccessMode::Password => {
            let matches = match (password, room.password_hash.as_deref()) {
                (Some(secret), Some(hash)) => verify_password(secret, hash),
                _ => false,
            };
            if matches {
                JoinDecision::Allow
            } else {
                JoinDecision::Deny(DenyReason::InvalidCredentials)
            }
        }
        AccessMode::Approval => {
            if room.is_creator(caller_id) || has_approval {
                JoinDecision::Allow
            } else if room.open_for_requests {
                JoinDecision::RequireApproval
            } else {
                JoinDecision::Deny(DenyReason::RequestsClosed)
            }
        }
    }
}

/// Hashes a room password with argon2id and a fresh salt
pub fn hash_password(secret: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

/// Constant-time verification of a password against a stored argon2 hash.
/// Malformed stored hashes verify as false rather than erroring.
pub fn verify_password(secret: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
