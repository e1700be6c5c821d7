use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crm_auth::csrf::CSRF_FAILURE_DETAIL;
use crm_auth::{AccountError, AuthzError, StoreError};
use crm_catalog::CatalogStoreError;
use crm_core::DomainError;
use crm_infra::ReconcileError;

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Catalog(#[from] CatalogStoreError),

    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Authz(AuthzError::Store(value))
    }
}

impl From<ReconcileError> for ApiError {
    fn from(value: ReconcileError) -> Self {
        match value {
            ReconcileError::Credentials(e) => e.into(),
            ReconcileError::Catalog(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Authz(e) => authz_error_to_response(e),
            ApiError::Account(e) => account_error_to_response(e),
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Catalog(CatalogStoreError::Conflict(msg)) => {
                json_error(StatusCode::CONFLICT, "conflict", msg)
            }
            ApiError::Catalog(e @ CatalogStoreError::Unavailable(_)) => internal(&e),
            ApiError::NotFound(what) => {
                json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
            }
        }
    }
}

pub fn authz_error_to_response(err: AuthzError) -> Response {
    match err {
        AuthzError::Unauthenticated | AuthzError::UserNotFound => json_error(
            StatusCode::UNAUTHORIZED,
            "unauthenticated",
            "authentication credentials were not provided or are invalid",
        ),
        AuthzError::InvalidToken => json_error(StatusCode::UNAUTHORIZED, "invalid_token", "invalid token"),
        AuthzError::MissingToken => json_error(StatusCode::UNAUTHORIZED, "missing_token", "token not provided"),
        AuthzError::PermissionDenied => json_error(
            StatusCode::FORBIDDEN,
            "permission_denied",
            "you do not have permission to perform this action",
        ),
        AuthzError::ConfigurationError(reason) => {
            tracing::error!(%reason, "authorization misconfigured");
            json_error(
                StatusCode::FORBIDDEN,
                "permission_denied",
                "you do not have permission to perform this action",
            )
        }
        AuthzError::CsrfValidationFailed => csrf_rejection(),
        e @ (AuthzError::Store(_) | AuthzError::Signing(_)) => internal(&e),
    }
}

pub fn account_error_to_response(err: AccountError) -> Response {
    match err {
        AccountError::Validation(fields) => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "validation_error",
                "message": "validation failed",
                "fields": fields,
            })),
        )
            .into_response(),
        AccountError::InvalidCredentials => json_error(
            StatusCode::BAD_REQUEST,
            "invalid_credentials",
            "invalid email or password",
        ),
        e @ (AccountError::Store(_) | AccountError::Hashing(_)) => internal(&e),
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

/// Fixed 403 body for a failed double-submit check.
pub fn csrf_rejection() -> Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({ "detail": CSRF_FAILURE_DETAIL })),
    )
        .into_response()
}

fn internal(err: &dyn std::error::Error) -> Response {
    tracing::error!(error = %err, "request failed on infrastructure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
