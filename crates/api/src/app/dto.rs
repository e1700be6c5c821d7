use serde::{Deserialize, Serialize};

use crm_auth::{RoleAssignment, RoleGrant, RoleKind, RoleTarget, TargetType, UserSummary};
use crm_core::UserId;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /confirm-email/` and query of `GET /confirm-email/`.
#[derive(Debug, Deserialize)]
pub struct EmailTokenRequest {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct GrantRoleRequest {
    pub user_id: UserId,
    pub role: RoleKind,
    pub target_type: TargetType,
    pub target_id: i64,
}

impl GrantRoleRequest {
    pub fn into_grant(self) -> RoleGrant {
        RoleGrant {
            user_id: self.user_id,
            role: self.role,
            target: RoleTarget::new(self.target_type, self.target_id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub policy: String,
    /// HTTP method to classify; defaults to GET.
    pub method: Option<String>,
    /// Defaults to the caller.
    pub user_id: Option<UserId>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub id: i64,
    pub user_id: i64,
    pub role: String,
    pub target_type: &'static str,
    pub target_id: i64,
}

impl From<RoleAssignment> for RoleAssignmentResponse {
    fn from(a: RoleAssignment) -> Self {
        Self {
            id: a.id.get(),
            user_id: a.user_id.get(),
            role: a.role.as_str().to_string(),
            target_type: a.target.target_type.as_str(),
            target_id: a.target.target_id,
        }
    }
}
