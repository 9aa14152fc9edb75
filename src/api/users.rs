//! User API handlers.
//!
//! # Purpose
//! Implements user CRUD plus the per-user booking and room listings.
use crate::api::error::{
    api_conflict, api_internal, api_not_found, api_validation_error, ApiError,
};
use crate::api::types::{
    RoomListResponse, UserBookingsResponse, UserCreateRequest, UserListResponse,
};
use crate::api::ensure_user_exists;
use crate::app::AppState;
use crate::model::{User, UserPatch};
use crate::store::StoreError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/v1/users",
    tag = "users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid user payload", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<UserCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.name.trim().is_empty() {
        return Err(api_validation_error("user name must not be empty"));
    }
    if !body.email.contains('@') {
        return Err(api_validation_error("email is malformed"));
    }
    if body.password.is_empty() {
        return Err(api_validation_error("password must not be empty"));
    }
    let user = User {
        id: Uuid::new_v4(),
        name: body.name,
        email: body.email,
        password: body.password,
        phone: body.phone,
        created_at: Utc::now(),
    };
    match state.store.create_user(user).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(StoreError::Conflict(_)) => {
            Err(api_conflict("email_taken", "email already registered"))
        }
        Err(err) => Err(api_internal("failed to create user", &err)),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "List users", body = UserListResponse)
    )
)]
pub(crate) async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    let items = state
        .store
        .list_users()
        .await
        .map_err(|err| api_internal("failed to list users", &err))?;
    Ok(Json(UserListResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Fetch user", body = User),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    match state.store.get_user(id).await {
        Ok(user) => Ok(Json(user)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("user not found")),
        Err(err) => Err(api_internal("failed to fetch user", &err)),
    }
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    if let Some(email) = &body.email {
        if !email.contains('@') {
            return Err(api_validation_error("email is malformed"));
        }
    }
    match state.store.update_user(id, body).await {
        Ok(updated) => Ok(Json(updated)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("user not found")),
        Err(StoreError::Conflict(_)) => {
            Err(api_conflict("email_taken", "email already registered"))
        }
        Err(err) => Err(api_internal("failed to update user", &err)),
    }
}

#[utoipa::path(
    delete,
    path = "/v1/users/{id}",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "User deleted", body = User),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn delete_user(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    match state.store.delete_user(id).await {
        Ok(deleted) => Ok(Json(deleted)),
        Err(StoreError::NotFound(_)) => Err(api_not_found("user not found")),
        Err(err) => Err(api_internal("failed to delete user", &err)),
    }
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/bookings",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Future bookings with rooms, ascending by start", body = UserBookingsResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn user_bookings(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<UserBookingsResponse>, ApiError> {
    ensure_user_exists(&state, id).await?;
    let items = state
        .store
        .bookings_for_user(id, Utc::now())
        .await
        .map_err(|err| api_internal("failed to list user bookings", &err))?;
    Ok(Json(UserBookingsResponse { items }))
}

#[utoipa::path(
    get,
    path = "/v1/users/{id}/rooms",
    tag = "users",
    params(("id" = Uuid, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Deduplicated rooms the user has booked", body = RoomListResponse),
        (status = 404, description = "User not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn user_rooms(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<RoomListResponse>, ApiError> {
    match state.store.rooms_for_user(id).await {
        Ok(items) => Ok(Json(RoomListResponse { items })),
        Err(StoreError::NotFound(_)) => Err(api_not_found("user not found")),
        Err(err) => Err(api_internal("failed to list user rooms", &err)),
    }
}
