use axum::{Router, routing::get};

use crate::app::services::AppServices;

pub mod account;
pub mod applications;
pub mod events;
pub mod roles;
pub mod session;
pub mod system;

/// Every route of the API.
///
/// Public routes check nothing; resource routes carry a policy gate; role
/// administration runs through the role-required guard inside its handlers.
pub fn router(services: &AppServices) -> Router {
    Router::new()
        .route("/health", get(system::health))
        .merge(session::router())
        .merge(account::router())
        .merge(events::router(services))
        .merge(applications::router(services))
        .merge(roles::router())
}
