//! Cookie session endpoints: login, refresh, logout, current user.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crm_auth::csrf::{REFRESH_TOKEN_COOKIE, generate_csrf_token};
use crm_auth::{AuthzError, TokenPair, UserDirectory, UserSummary};

use crate::app::dto::{LoginRequest, MessageResponse, UserEnvelope};
use crate::app::errors::{self, ApiError};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;
use crate::cookies::{append_set_cookies, read_cookie};

pub fn router() -> Router {
    Router::new()
        .route("/login/", post(login))
        .route("/refresh/", post(refresh))
        .route("/logout/", post(logout))
        .route("/user-info/", get(user_info))
}

/// POST /login/ - issue a session pair and a fresh CSRF cookie.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = services.accounts.login(&req.email, &req.password)?;
    let pair = services.tokens.issue_for(&user)?;
    tracing::info!(user_id = %user.id, "login");

    let body = UserEnvelope {
        user: UserSummary::from(&user),
    };
    Ok(with_session(&services, Json(body).into_response(), &pair))
}

/// POST /refresh/ - rotate the refresh cookie.
pub async fn refresh(Extension(services): Extension<Arc<AppServices>>, headers: HeaderMap) -> Response {
    match services.tokens.rotate(read_cookie(&headers, REFRESH_TOKEN_COOKIE)) {
        Ok(pair) => {
            let body = Json(MessageResponse::new("Access token refreshed successfully"));
            with_session(&services, body.into_response(), &pair)
        }
        Err(AuthzError::MissingToken) => refresh_failure("Refresh token not provided"),
        Err(e) if e.is_infrastructure() => errors::authz_error_to_response(e),
        Err(_) => refresh_failure("Invalid token"),
    }
}

/// POST /logout/ - revoke the refresh token if one is present, then clear
/// the session cookies. Succeeds with or without a live access token;
/// revocation problems never fail the logout.
pub async fn logout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    headers: HeaderMap,
) -> Response {
    let user_id = context.principal().user_id();

    if let Some(refresh) = read_cookie(&headers, REFRESH_TOKEN_COOKIE) {
        if let Err(e) = services.tokens.revoke(Some(refresh)) {
            tracing::warn!(user_id = ?user_id, error = %e, "refresh token not revoked at logout");
        }
    }
    tracing::info!(user_id = ?user_id, "logout");

    let mut response = Json(MessageResponse::new("Successfully logged out")).into_response();
    append_set_cookies(response.headers_mut(), services.cookies.cleared_session());
    response
}

/// GET /user-info/
pub async fn user_info(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
) -> Result<Json<UserSummary>, ApiError> {
    let id = context.require_user()?.id;
    let user = services
        .credentials
        .find_user_by_id(id)?
        .ok_or(AuthzError::UserNotFound)?;
    Ok(Json(UserSummary::from(&user)))
}

fn with_session(services: &AppServices, mut response: Response, pair: &TokenPair) -> Response {
    let csrf = generate_csrf_token();
    append_set_cookies(response.headers_mut(), services.cookies.session(pair, &csrf));
    response
}

fn refresh_failure(message: &'static str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
