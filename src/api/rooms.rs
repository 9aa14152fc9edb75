//! Room API handlers.
//!
//! # Purpose
//! Implements room creation, listing, lookup, and the availability search
//! over a candidate time window.
use crate::api::error::{api_internal, api_not_found, api_validation_error, ApiError};
use crate::api::types::{AvailableRoomsQuery, RoomCreateRequest, RoomListResponse};
use crate::app::AppState;
use crate::model::{Room, TimeRange};
use crate::store::StoreError;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "List rooms", body = RoomListResponse)
    )
)]
pub(crate) async fn list_rooms(
    State(state): State<AppState>,
) -> Result<Json<RoomListResponse>, ApiError> {
    let items = state
        .store
        .list_rooms()
        .await
        .map_err(|err| api_internal("failed to list rooms", &err))?;
    Ok(Json(RoomListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = RoomCreateRequest,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 400, description = "Invalid room payload", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<RoomCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(api_validation_error("room name must not be empty"));
    }
    if body.capacity < 1 {
        return Err(api_validation_error("room capacity must be at least 1"));
    }
    let room = Room {
        id: Uuid::new_v4(),
        name: body.name,
        capacity: body.capacity,
        description: body.description,
        floor: body.floor,
        building: body.building,
        equipment: body.equipment,
        created_at: Utc::now(),
    };
    let created = state
        .store
        .create_room(room)
        .await
        .map_err(|err| api_internal("failed to create room", &err))?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/available",
    tag = "rooms",
    params(
        ("startTime" = String, Query, description = "Window start (RFC 3339)"),
        ("endTime" = String, Query, description = "Window end (RFC 3339)")
    ),
    responses(
        (status = 200, description = "Rooms free for the whole window", body = RoomListResponse),
        (status = 400, description = "Invalid window", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn available_rooms(
    Query(query): Query<AvailableRoomsQuery>,
    State(state): State<AppState>,
) -> Result<Json<RoomListResponse>, ApiError> {
    let window = TimeRange::new(query.start_time, query.end_time)
        .map_err(|err| api_validation_error(&err.to_string()))?;
    let items = state
        .store
        .available_rooms(&window)
        .await
        .map_err(|err| api_internal("failed to search available rooms", &err))?;
    Ok(Json(RoomListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(
        ("id" = Uuid, Path, description = "Room identifier")
    ),
    responses(
        (status = 200, description = "Fetch room", body = Room),
        (status = 404, description = "Room not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_room(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Room>, ApiError> {
    match state.store.get_room(id).await {
        Ok(room) => Ok(Json(room)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("room not found")),
        Err(err) => Err(api_internal("failed to fetch room", &err)),
    }
}
