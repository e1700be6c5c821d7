//! Route-level authorization.
//!
//! Each resource router is wrapped in a [`PolicyGate`]; the request method
//! picks the read or write side of its [`ResourcePolicy`].

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crm_auth::{AuthzError, RequestSafety, ResourcePolicy, RoleResolver, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct PolicyGate {
    resolver: RoleResolver,
    policy: Arc<ResourcePolicy>,
}

impl PolicyGate {
    pub fn new(resolver: RoleResolver, policy: ResourcePolicy) -> Self {
        Self {
            resolver,
            policy: Arc::new(policy),
        }
    }

    /// Enforce this gate on every route currently in `router`.
    pub fn protect(self, router: Router) -> Router {
        router.route_layer(middleware::from_fn_with_state(self, enforce_policy))
    }
}

async fn enforce_policy(State(gate): State<PolicyGate>, req: Request<Body>, next: Next) -> Response {
    let context = req
        .extensions()
        .get::<PrincipalContext>()
        .cloned()
        .unwrap_or_default();

    let decision = authorize_request(&context, req.method().as_str(), &gate.policy, &gate.resolver);
    match decision {
        Ok(()) => next.run(req).await,
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// Check `policy` for the current request context.
pub fn authorize_request(
    context: &PrincipalContext,
    method: &str,
    policy: &ResourcePolicy,
    resolver: &RoleResolver,
) -> Result<(), AuthzError> {
    authorize(
        context.principal(),
        RequestSafety::from_method(method),
        policy,
        resolver,
    )
}
