use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims identifying the calling user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    /// Display name shown to other room participants
    pub name: String,
    pub exp: usize,
    pub iat: usize,
}

/// Response structure for the token minting endpoint
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub token: String,
    pub user_id: Uuid,
    pub display_name: String,
}

/// Request payload for minting a token
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub display_name: Option<String>,
}
