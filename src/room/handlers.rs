use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

use super::models::{JoinRequest, Message, Participant};
use super::types::{
    JoinRoomRequest, MessageCreateRequest, MessagePageQuery, PageQuery, ReorderRequest,
    RequestFilterQuery, RoomCreateRequest, RoomDetail, RoomSummary, RoomUpdateRequest,
};
use crate::auth::Claims;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /rooms
#[instrument(name = "create_room", skip(state, claims, request))]
pub async fn create_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<RoomCreateRequest>,
) -> Result<(StatusCode, Json<RoomDetail>), AppError> {
    let detail = state
        .rooms
        .create_room(claims.sub, &claims.name, request)
        .await?;
    info!(room_id = %detail.summary.id, code = %detail.summary.code, "room created");
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /rooms - rooms the caller belongs to
#[instrument(name = "list_my_rooms", skip(state, claims))]
pub async fn list_my_rooms(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    Ok(Json(state.rooms.list_user_rooms(claims.sub).await?))
}

/// GET /rooms/public - browsable public rooms
#[instrument(name = "list_public_rooms", skip(state))]
pub async fn list_public_rooms(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<RoomSummary>>, AppError> {
    Ok(Json(
        state.rooms.list_public_rooms(page.skip, page.limit).await?,
    ))
}

/// GET /rooms/:room_id
#[instrument(name = "get_room", skip(state, claims))]
pub async fn get_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(state.rooms.room_detail(claims.sub, room_id).await?))
}

/// GET /rooms/code/:code
#[instrument(name = "get_room_by_code", skip(state, claims))]
pub async fn get_room_by_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(
        state.rooms.room_detail_by_code(claims.sub, &code).await?,
    ))
}

/// PATCH /rooms/:room_id - creator only
#[instrument(name = "update_room", skip(state, claims, update))]
pub async fn update_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Json(update): Json<RoomUpdateRequest>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(
        state.rooms.update_room(claims.sub, room_id, update).await?,
    ))
}

/// DELETE /rooms/:room_id - creator only
#[instrument(name = "delete_room", skip(state, claims))]
pub async fn delete_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.rooms.delete_room(claims.sub, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /rooms/:room_id/join
#[instrument(name = "join_room", skip(state, claims, body))]
pub async fn join_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Json(body): Json<JoinRoomRequest>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(
        state
            .rooms
            .join_room(claims.sub, &claims.name, room_id, body.password.as_deref())
            .await?,
    ))
}

/// POST /rooms/code/:code/join
#[instrument(name = "join_room_by_code", skip(state, claims, body))]
pub async fn join_room_by_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
    Json(body): Json<JoinRoomRequest>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(
        state
            .rooms
            .join_room_by_code(claims.sub, &claims.name, &code, body.password.as_deref())
            .await?,
    ))
}

/// POST /rooms/code/:code/request-join - approval rooms only
#[instrument(name = "request_join", skip(state, claims))]
pub async fn request_join(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(code): Path<String>,
) -> Result<(StatusCode, Json<JoinRequest>), AppError> {
    let request = state
        .rooms
        .request_join(claims.sub, &claims.name, &code)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /rooms/:room_id/join-requests - creator only
#[instrument(name = "list_join_requests", skip(state, claims))]
pub async fn list_join_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Query(filter): Query<RequestFilterQuery>,
) -> Result<Json<Vec<JoinRequest>>, AppError> {
    Ok(Json(
        state
            .rooms
            .list_join_requests(claims.sub, room_id, filter.status)
            .await?,
    ))
}

/// POST /rooms/:room_id/join-requests/:request_id/approve - creator only
#[instrument(name = "approve_request", skip(state, claims))]
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((room_id, request_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<JoinRequest>, AppError> {
    Ok(Json(
        state
            .rooms
            .approve_request(claims.sub, room_id, request_id)
            .await?,
    ))
}

/// POST /rooms/:room_id/join-requests/:request_id/reject - creator only
#[instrument(name = "reject_request", skip(state, claims))]
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((room_id, request_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<JoinRequest>, AppError> {
    Ok(Json(
        state
            .rooms
            .reject_request(claims.sub, room_id, request_id)
            .await?,
    ))
}

/// POST /rooms/:room_id/leave
#[instrument(name = "leave_room", skip(state, claims))]
pub async fn leave_room(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.rooms.leave_room(claims.sub, room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /rooms/:room_id/participants - participants only
#[instrument(name = "list_participants", skip(state, claims))]
pub async fn list_participants(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>, AppError> {
    Ok(Json(
        state.rooms.list_participants(claims.sub, room_id).await?,
    ))
}

/// POST /rooms/:room_id/songs/:song_id - creator only
#[instrument(name = "add_song", skip(state, claims))]
pub async fn add_song(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((room_id, song_id)): Path<(Uuid, Uuid)>,
) -> Result<(StatusCode, Json<RoomDetail>), AppError> {
    let detail = state.rooms.add_song(claims.sub, room_id, song_id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// DELETE /rooms/:room_id/songs/:song_id - creator only
#[instrument(name = "remove_song", skip(state, claims))]
pub async fn remove_song(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((room_id, song_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(
        state.rooms.remove_song(claims.sub, room_id, song_id).await?,
    ))
}

/// PUT /rooms/:room_id/songs/order - creator only, full or partial assignment
#[instrument(name = "reorder_songs", skip(state, claims, request))]
pub async fn reorder_songs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<RoomDetail>, AppError> {
    let assignments: HashMap<Uuid, usize> = request
        .orders
        .into_iter()
        .map(|a| (a.song_id, a.order))
        .collect();
    Ok(Json(
        state
            .rooms
            .reorder_songs(claims.sub, room_id, assignments)
            .await?,
    ))
}

/// POST /rooms/:room_id/import-list/:list_id - creator only
#[instrument(name = "import_list", skip(state, claims))]
pub async fn import_list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((room_id, list_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomDetail>, AppError> {
    Ok(Json(
        state.rooms.import_list(claims.sub, room_id, list_id).await?,
    ))
}

/// POST /rooms/:room_id/messages - participants only
#[instrument(name = "send_message", skip(state, claims, request))]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Json(request): Json<MessageCreateRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let message = state
        .rooms
        .send_message(claims.sub, &claims.name, room_id, request.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /rooms/:room_id/messages - participants only, most recent window
#[instrument(name = "get_messages", skip(state, claims))]
pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(room_id): Path<Uuid>,
    Query(page): Query<MessagePageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    Ok(Json(
        state
            .rooms
            .get_messages(claims.sub, room_id, page.limit, page.offset)
            .await?,
    ))
}
