use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::shared::{AppError, AppState};

/// JWT authentication middleware. Validates the Authorization Bearer header
/// and inserts `Claims` into request extensions.
/// Usage: .layer(middleware::from_fn_with_state(app_state.clone(), auth::bearer_auth))
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| {
            warn!(uri = %req.uri(), "missing Authorization header");
            AppError::Unauthorized("missing authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        warn!("Authorization header is not a Bearer token");
        AppError::Unauthorized("invalid authorization header format".to_string())
    })?;

    let claims = state.token_config.validate_token(token)?;
    debug!(user_id = %claims.sub, "request authenticated");

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
