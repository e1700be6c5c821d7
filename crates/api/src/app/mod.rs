//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: stores, token service, account workflows
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
///
/// Layer order, outermost first: CSRF check, principal extraction, then the
/// per-router policy gates.
pub fn build_app(services: AppServices) -> Router {
    let auth_state = middleware::AuthState {
        tokens: services.tokens.clone(),
    };
    let services = Arc::new(services);

    routes::router(&services).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::csrf_middleware))
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::session_middleware,
            ))
            .layer(Extension(services)),
    )
}

pub use services::{AppServices, Backends, build_services};
