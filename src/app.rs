//! HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and testable.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::notify::Mailer;
use crate::observability;
use crate::store::BookingStore;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub mailer: Arc<dyn Mailer>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/v1/health", axum::routing::get(api::system::health))
        .route(
            "/v1/rooms",
            axum::routing::get(api::rooms::list_rooms).post(api::rooms::create_room),
        )
        .route(
            "/v1/rooms/available",
            axum::routing::get(api::rooms::available_rooms),
        )
        .route("/v1/rooms/:room_id", axum::routing::get(api::rooms::get_room))
        .route(
            "/v1/users",
            axum::routing::get(api::users::list_users).post(api::users::create_user),
        )
        .route(
            "/v1/users/:user_id",
            axum::routing::get(api::users::get_user)
                .put(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route(
            "/v1/users/:user_id/bookings",
            axum::routing::get(api::users::user_bookings),
        )
        .route(
            "/v1/users/:user_id/rooms",
            axum::routing::get(api::users::user_rooms),
        )
        .route(
            "/v1/bookings",
            axum::routing::post(api::bookings::create_booking),
        )
        .route(
            "/v1/bookings/:booking_id",
            axum::routing::get(api::bookings::get_booking)
                .delete(api::bookings::delete_booking),
        )
        .route(
            "/v1/bookings/:booking_id/notifications",
            axum::routing::post(api::bookings::schedule_notification),
        )
        .merge(
            utoipa_swagger_ui::SwaggerUi::new("/docs").url("/v1/openapi.json", ApiDoc::openapi()),
        )
        .layer(trace_layer)
        .with_state(state)
}
