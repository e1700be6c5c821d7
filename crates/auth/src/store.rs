//! Storage ports consumed by the identity core.
//!
//! The core never talks to a database directly; infra provides implementations
//! of these traits (in-memory for dev/tests, Postgres for deployments).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crm_core::{ProfileId, RoleAssignmentId, UserId};

use crate::target::{RoleAssignment, RoleGrant, RoleTarget};
use crate::user::{NewUser, Profile, ProfileFields, UserAccount};

/// Infrastructure failure from a store.
///
/// These are never folded into an allow/deny decision; callers map them to a
/// 5xx-equivalent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Read access to user records.
pub trait UserDirectory: Send + Sync {
    fn find_user_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError>;
}

/// Read access to role assignments.
pub trait RoleSource: Send + Sync {
    fn role_assignments_for(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError>;
}

/// Full credential store: users, profiles and role assignments.
pub trait CredentialStore: UserDirectory + RoleSource {
    /// Insert a user; fails with `Conflict` if the email is taken.
    fn create_user(&self, user: NewUser) -> Result<UserAccount, StoreError>;

    /// Persist the mutable fields of an existing user.
    fn update_user(&self, user: &UserAccount) -> Result<(), StoreError>;

    fn find_profile(&self, user: UserId) -> Result<Option<Profile>, StoreError>;

    fn find_profile_by_id(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;

    /// Create the user's profile or overwrite its fields.
    fn upsert_profile(&self, user: UserId, fields: ProfileFields) -> Result<Profile, StoreError>;

    /// Get-or-create semantics: granting an identical tuple twice returns the
    /// existing assignment.
    fn assign_role(&self, grant: RoleGrant) -> Result<RoleAssignment, StoreError>;

    /// Returns `false` if no such assignment existed.
    fn remove_role(&self, id: RoleAssignmentId) -> Result<bool, StoreError>;

    fn list_role_assignments(&self) -> Result<Vec<RoleAssignment>, StoreError>;

    /// Remove every assignment scoped to `target`; returns how many were removed.
    fn remove_assignments_for_target(&self, target: &RoleTarget) -> Result<usize, StoreError>;
}

/// Append-only set of revoked refresh-token identities.
pub trait RevocationList: Send + Sync {
    /// Atomically add `jti`. Returns `true` if this call inserted it and `false`
    /// if it was already present.
    fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError>;

    fn is_revoked(&self, jti: &str) -> Result<bool, StoreError>;
}

impl<S> UserDirectory for Arc<S>
where
    S: UserDirectory + ?Sized,
{
    fn find_user_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        (**self).find_user_by_id(id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        (**self).find_user_by_email(email)
    }
}

impl<S> RoleSource for Arc<S>
where
    S: RoleSource + ?Sized,
{
    fn role_assignments_for(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        (**self).role_assignments_for(user)
    }
}

impl<S> RevocationList for Arc<S>
where
    S: RevocationList + ?Sized,
{
    fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        (**self).revoke(jti, expires_at)
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        (**self).is_revoked(jti)
    }
}
