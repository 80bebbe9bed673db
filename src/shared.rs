use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::TokenConfig;
use crate::room::service::RoomSessionService;

/// Shared application state containing all dependencies
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomSessionService>,
    pub token_config: TokenConfig,
}

impl AppState {
    pub fn new(rooms: Arc<RoomSessionService>, token_config: TokenConfig) -> Self {
        Self {
            rooms,
            token_config,
        }
    }
}

/// Application error taxonomy. Sub-components return these typed failures and
/// the room service surfaces them unchanged; every message names the violated
/// invariant so clients can decide whether to resynchronize.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("invalid credentials: password does not match")]
    InvalidCredentials,

    #[error("room is not accepting new join requests")]
    RequestsClosed,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Denied(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_)
            | AppError::InvalidCredentials
            | AppError::RequestsClosed
            | AppError::Denied(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal detail stays in the log, not the response body
        if let AppError::Internal(detail) = &self {
            tracing::error!(detail = %detail, "internal error");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
