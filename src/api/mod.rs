//! Booking HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and shared helpers for validating that
//! referenced rooms and users exist before touching bookings.
pub mod bookings;
pub mod error;
pub mod openapi;
pub mod rooms;
pub mod system;
pub mod types;
pub mod users;

use crate::api::error::{api_internal, api_not_found, ApiError};
use crate::app::AppState;
use uuid::Uuid;

pub(crate) async fn ensure_room_exists(state: &AppState, room_id: Uuid) -> Result<(), ApiError> {
    let exists = state
        .store
        .room_exists(room_id)
        .await
        .map_err(|err| api_internal("failed to check room existence", &err))?;
    if !exists {
        return Err(api_not_found("room not found"));
    }
    Ok(())
}

pub(crate) async fn ensure_user_exists(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let exists = state
        .store
        .user_exists(user_id)
        .await
        .map_err(|err| api_internal("failed to check user existence", &err))?;
    if !exists {
        return Err(api_not_found("user not found"));
    }
    Ok(())
}
