use serde::Serialize;
use thiserror::Error;

use crate::policy::{RequestSafety, ResourcePolicy};
use crate::principal::Principal;
use crate::resolver::RoleResolver;
use crate::roles::{self, RoleSet};
use crate::store::StoreError;

/// Identity-core failure taxonomy.
///
/// `InvalidToken` never says which check failed. `Store` and `Signing` are
/// infrastructure failures and must not be read as a deny.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication credentials were not provided or are invalid")]
    Unauthenticated,

    #[error("token is invalid or expired")]
    InvalidToken,

    #[error("token not provided")]
    MissingToken,

    #[error("user not found")]
    UserNotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("authorization misconfigured: {0}")]
    ConfigurationError(String),

    #[error("CSRF validation failed.")]
    CsrfValidationFailed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("token signing failed: {0}")]
    Signing(String),
}

impl AuthzError {
    /// Infrastructure failures, as opposed to authorization outcomes.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, AuthzError::Store(_) | AuthzError::Signing(_))
    }
}

/// Pure decision over already-resolved roles.
///
/// - No IO
/// - No panics
pub fn decide(
    principal: &Principal,
    held: &RoleSet,
    safety: RequestSafety,
    policy: &ResourcePolicy,
) -> Result<(), AuthzError> {
    if !principal.is_authenticated() {
        return Err(AuthzError::Unauthenticated);
    }
    if principal.is_superuser() {
        return Ok(());
    }

    let required = policy.applicable(safety);
    if required.is_empty() {
        return Err(AuthzError::PermissionDenied);
    }

    if roles::intersects(held, required) {
        Ok(())
    } else {
        Err(AuthzError::PermissionDenied)
    }
}

/// Authorize one operation for a principal under a resource policy.
///
/// Anonymous principals are rejected and superusers admitted before any role
/// lookup happens; everyone else costs exactly one role-source read.
pub fn authorize(
    principal: &Principal,
    safety: RequestSafety,
    policy: &ResourcePolicy,
    resolver: &RoleResolver,
) -> Result<(), AuthzError> {
    let Some(identity) = principal.identity() else {
        return Err(AuthzError::Unauthenticated);
    };
    if identity.is_superuser {
        return Ok(());
    }
    if policy.applicable(safety).is_empty() {
        tracing::debug!(policy = policy.name, ?safety, "empty role set on applicable side");
        return Err(AuthzError::PermissionDenied);
    }

    let held = resolver.resolve_roles(identity.id)?;
    let decision = decide(principal, &held, safety, policy);
    if decision.is_err() {
        tracing::debug!(
            user_id = %identity.id,
            policy = policy.name,
            ?safety,
            held = ?held,
            "authorization denied"
        );
    }
    decision
}

/// Why a decision came out the way it did (for audit/debug endpoints).
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub policy: &'static str,
    pub safety: RequestSafety,
    pub granted: bool,
    pub reason: String,
    pub held_roles: Vec<String>,
    pub required_roles: Vec<String>,
}

/// Explain the decision [`authorize`] would make.
pub fn explain_authorization(
    principal: &Principal,
    safety: RequestSafety,
    policy: &ResourcePolicy,
    resolver: &RoleResolver,
) -> Result<AuthorizationExplanation, StoreError> {
    let required_roles: Vec<String> = policy
        .applicable(safety)
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();

    let mut held_roles: Vec<String> = match principal.identity() {
        Some(identity) if !identity.is_superuser => resolver
            .resolve_roles(identity.id)?
            .into_iter()
            .map(|r| r.as_str().to_string())
            .collect(),
        _ => Vec::new(),
    };
    held_roles.sort();

    let (granted, reason) = match principal.identity() {
        None => (false, "request is not authenticated".to_string()),
        Some(identity) if identity.is_superuser => {
            (true, "superuser bypasses every policy".to_string())
        }
        Some(_) if required_roles.is_empty() => (
            false,
            format!("policy '{}' grants no role on this side", policy.name),
        ),
        Some(_) => {
            let matched: Vec<&String> = held_roles
                .iter()
                .filter(|r| required_roles.contains(r))
                .collect();
            if matched.is_empty() {
                (
                    false,
                    format!("none of the held roles is in {:?}", required_roles),
                )
            } else {
                (true, format!("granted by role(s) {:?}", matched))
            }
        }
    };

    Ok(AuthorizationExplanation {
        policy: policy.name,
        safety,
        granted,
        reason,
        held_roles,
        required_roles,
    })
}
