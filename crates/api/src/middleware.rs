//! Session boundary: CSRF enforcement and principal extraction.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};

use crm_auth::csrf::{ACCESS_TOKEN_COOKIE, CSRF_COOKIE, CSRF_HEADERS, csrf_required, verify_double_submit};
use crm_auth::{AuthzError, RequestSafety, TokenService};

use crate::app::errors;
use crate::context::{CredentialTransport, PrincipalContext};
use crate::cookies::read_cookie;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenService,
}

/// Double-submit check. Installed outermost so a rejected request never
/// reaches authentication, routing or a handler.
pub async fn csrf_middleware(req: Request<Body>, next: Next) -> Response {
    let safety = RequestSafety::from_method(req.method().as_str());
    let headers = req.headers();

    if csrf_required(safety, read_cookie(headers, ACCESS_TOKEN_COOKIE).is_some()) {
        let cookie = read_cookie(headers, CSRF_COOKIE);
        let echoed = csrf_header(headers);
        if verify_double_submit(cookie, echoed).is_err() {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                cookie_present = cookie.is_some(),
                header_present = echoed.is_some(),
                "CSRF validation failed"
            );
            return errors::csrf_rejection();
        }
    }

    next.run(req).await
}

/// Attach a [`PrincipalContext`] to every request.
///
/// Bad or stale tokens leave the request anonymous; the policy check decides
/// later. Store failures are not a deny and surface as 500.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let context = match authenticate(&state.tokens, req.headers()) {
        Ok(context) => context,
        Err(e) => return errors::authz_error_to_response(e),
    };
    req.extensions_mut().insert(context);
    next.run(req).await
}

fn authenticate(tokens: &TokenService, headers: &HeaderMap) -> Result<PrincipalContext, AuthzError> {
    let (token, transport) = match read_cookie(headers, ACCESS_TOKEN_COOKIE) {
        Some(token) => (token, CredentialTransport::Cookie),
        None => match extract_bearer(headers) {
            Some(token) => (token, CredentialTransport::Bearer),
            None => return Ok(PrincipalContext::anonymous()),
        },
    };

    match tokens.validate_access(token) {
        Ok(principal) => Ok(PrincipalContext::new(principal, transport)),
        Err(e) if e.is_infrastructure() => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, ?transport, "access token rejected; continuing anonymously");
            Ok(PrincipalContext::anonymous())
        }
    }
}

fn csrf_header(headers: &HeaderMap) -> Option<&str> {
    CSRF_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|v| v.to_str().ok())
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();
    (!token.is_empty()).then_some(token)
}
