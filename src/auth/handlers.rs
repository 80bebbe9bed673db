use axum::{extract::State, Json};
use tracing::{info, instrument};
use uuid::Uuid;

use super::types::{TokenRequest, TokenResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for minting an access token
///
/// POST /auth/token
/// Assigns a fresh user id; the display name defaults to a short
/// id-derived label when none is supplied.
#[instrument(name = "create_token", skip(state, request))]
pub async fn create_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user_id = Uuid::new_v4();
    let display_name = match request.display_name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => format!("guest-{}", &user_id.simple().to_string()[..8]),
    };

    let token = state
        .token_config
        .create_token(user_id, display_name.clone())?;
    info!(%user_id, %display_name, "token issued");

    Ok(Json(TokenResponse {
        token,
        user_id,
        display_name,
    }))
}
