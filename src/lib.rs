//! Room booking service library crate.
//!
//! # Purpose
//! Exposes the booking API surface, configuration, notification scheduler, and
//! storage implementations for use by the binary and tests.
//!
//! # Notes
//! Module boundaries mirror the HTTP API and storage backends for clarity.
pub mod api;
pub mod app;
pub mod config;
pub mod model;
pub mod notify;
pub mod observability;
pub mod scheduler;
pub mod store;
