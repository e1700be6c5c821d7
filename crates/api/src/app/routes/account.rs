use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    routing::{get, post},
};

use crm_auth::{
    AuthzError, PasswordResetConfirm, Profile, ProfileFields, Registration, UserDirectory, UserSummary,
};

use crate::app::dto::{EmailTokenRequest, MessageResponse, PasswordResetRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/register/", post(register))
        .route("/profile/", get(get_profile).put(update_profile))
        .route("/confirm-email/", get(confirm_email_link).post(confirm_email))
        .route("/password-reset/request/", post(request_password_reset))
        .route(
            "/password-reset/confirm/",
            get(check_password_reset).post(confirm_password_reset),
        )
}

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, Json<UserSummary>), ApiError> {
    let user = services.accounts.register(req)?;
    Ok((StatusCode::CREATED, Json(UserSummary::from(&user))))
}

/// GET /profile/ - created from the account on first access.
pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
) -> Result<Json<Profile>, ApiError> {
    let id = context.require_user()?.id;
    let account = services
        .credentials
        .find_user_by_id(id)?
        .ok_or(AuthzError::UserNotFound)?;
    Ok(Json(services.accounts.profile(&account)?))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(context): Extension<PrincipalContext>,
    Json(fields): Json<ProfileFields>,
) -> Result<Json<Profile>, ApiError> {
    let id = context.require_user()?.id;
    Ok(Json(services.accounts.update_profile(id, fields)?))
}

/// GET /confirm-email/?email=..&token=.. (the mailed link)
pub async fn confirm_email_link(
    Extension(services): Extension<Arc<AppServices>>,
    Query(req): Query<EmailTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.accounts.confirm_email(&req.email, &req.token)?;
    Ok(Json(MessageResponse::new("Account confirmed")))
}

pub async fn confirm_email(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<EmailTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.accounts.confirm_email(&req.email, &req.token)?;
    Ok(Json(MessageResponse::new("Account confirmed")))
}

pub async fn request_password_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.accounts.request_password_reset(&req.email)?;
    Ok(Json(MessageResponse::new("Password reset instructions sent")))
}

/// GET /password-reset/confirm/?email=..&token=.. - token check only.
pub async fn check_password_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Query(req): Query<EmailTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.accounts.check_password_reset(&req.email, &req.token)?;
    Ok(Json(MessageResponse::new("Token confirmed")))
}

pub async fn confirm_password_reset(
    Extension(services): Extension<Arc<AppServices>>,
    Json(req): Json<PasswordResetConfirm>,
) -> Result<Json<MessageResponse>, ApiError> {
    services.accounts.confirm_password_reset(req)?;
    Ok(Json(MessageResponse::new("Password updated")))
}
