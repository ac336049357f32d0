//! # areaflow-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Accept **provider webhooks** and hand them to the trigger intake, which
//!   deduplicates them and dispatches executions
//! - Expose **manual triggers**, execution lookups, cancellation and worker
//!   result reporting as a small JSON API
//! - Stream dispatched events live over **Server-Sent Events**
//!
//! ## Dependency rule
//! Depends on `areaflow-app` (for port traits and services) and
//! `areaflow-domain` (for types used in request/response mapping). Never leaks
//! axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
