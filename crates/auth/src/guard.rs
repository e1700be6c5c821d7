//! Inline role gate for operations outside the request/policy path.
//!
//! The operation receives the principal as an explicit parameter; nothing is
//! discovered by inspecting arguments.

use crate::authorize::AuthzError;
use crate::principal::Principal;
use crate::resolver::RoleResolver;
use crate::roles::{self, RoleKind};

/// Acceptable role kinds for a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    kinds: Vec<RoleKind>,
}

/// Build a requirement satisfied by any of `kinds`.
pub fn role_required<I>(kinds: I) -> RoleRequirement
where
    I: IntoIterator<Item = RoleKind>,
{
    RoleRequirement {
        kinds: kinds.into_iter().collect(),
    }
}

impl RoleRequirement {
    pub fn kinds(&self) -> &[RoleKind] {
        &self.kinds
    }

    /// Check order: authentication, superuser bypass, call-site configuration,
    /// then role membership.
    pub fn check(&self, principal: &Principal, resolver: &RoleResolver) -> Result<(), AuthzError> {
        let Some(identity) = principal.identity() else {
            return Err(AuthzError::Unauthenticated);
        };
        if identity.is_superuser {
            return Ok(());
        }
        if self.kinds.is_empty() {
            tracing::error!(
                user_id = %identity.id,
                "role_required called with no acceptable role kinds"
            );
            return Err(AuthzError::ConfigurationError(
                "role_required needs at least one role kind".into(),
            ));
        }

        let held = resolver.resolve_roles(identity.id)?;
        if roles::intersects(&held, &self.kinds) {
            Ok(())
        } else {
            tracing::debug!(user_id = %identity.id, required = ?self.kinds, "role_required denied");
            Err(AuthzError::PermissionDenied)
        }
    }

    /// Wrap `op` behind this requirement.
    pub fn wrap<F>(self, op: F) -> Guarded<F> {
        Guarded {
            requirement: self,
            op,
        }
    }
}

/// An operation that only runs once its [`RoleRequirement`] passes.
#[derive(Debug, Clone)]
pub struct Guarded<F> {
    requirement: RoleRequirement,
    op: F,
}

impl<F> Guarded<F> {
    pub fn requirement(&self) -> &RoleRequirement {
        &self.requirement
    }

    /// Run the wrapped operation for `principal`.
    ///
    /// On a failed check the operation is never invoked.
    pub fn call<A, T, E>(&self, principal: &Principal, resolver: &RoleResolver, input: A) -> Result<T, E>
    where
        F: Fn(&Principal, A) -> Result<T, E>,
        E: From<AuthzError>,
    {
        self.requirement.check(principal, resolver)?;
        (self.op)(principal, input)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::fixtures::{FailingRoles, StaticRoles, anonymous, superuser, user};

    #[test]
    fn superuser_passes_without_admin_assignment() {
        let resolver = RoleResolver::new(StaticRoles::default());
        assert_eq!(
            role_required([RoleKind::ADMIN]).check(&superuser(1), &resolver),
            Ok(())
        );
    }

    #[test]
    fn user_without_matching_role_is_denied() {
        let resolver = RoleResolver::new(StaticRoles::with(2, &[RoleKind::PROJECTANT]));
        assert_eq!(
            role_required([RoleKind::ADMIN]).check(&user(2), &resolver),
            Err(AuthzError::PermissionDenied)
        );
    }

    #[test]
    fn any_listed_kind_is_enough() {
        let resolver = RoleResolver::new(StaticRoles::with(2, &[RoleKind::CURATOR]));
        assert_eq!(
            role_required([RoleKind::ADMIN, RoleKind::CURATOR]).check(&user(2), &resolver),
            Ok(())
        );
    }

    #[test]
    fn anonymous_fails_before_role_lookup() {
        let resolver = RoleResolver::new(FailingRoles);
        assert_eq!(
            role_required([RoleKind::ADMIN]).check(&anonymous(), &resolver),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn empty_requirement_is_a_configuration_error() {
        let resolver = RoleResolver::new(StaticRoles::with(3, &[RoleKind::ADMIN]));
        let err = role_required(Vec::new()).check(&user(3), &resolver).unwrap_err();
        assert!(matches!(err, AuthzError::ConfigurationError(_)));
    }

    #[test]
    fn guarded_operation_does_not_run_when_denied() {
        let calls = Cell::new(0);
        let guarded = role_required([RoleKind::ADMIN]).wrap(|p: &Principal, n: i32| {
            calls.set(calls.get() + 1);
            Ok::<_, AuthzError>(p.user_id().map(|id| id.get()).unwrap_or(0) + n as i64)
        });
        let resolver = RoleResolver::new(StaticRoles::with(5, &[RoleKind::ADMIN]));

        assert_eq!(guarded.call(&user(5), &resolver, 10), Ok(15));
        assert_eq!(
            guarded.call(&user(6), &resolver, 10),
            Err(AuthzError::PermissionDenied)
        );
        assert_eq!(calls.get(), 1);
    }
}
