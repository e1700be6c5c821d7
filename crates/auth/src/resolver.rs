use std::sync::Arc;

use crm_core::UserId;

use crate::roles::{RoleKind, RoleSet};
use crate::store::{RoleSource, StoreError};
use crate::target::{RoleAssignment, RoleTarget};

/// Loads the role kinds a user holds.
///
/// One read against the role source per call; no caching.
#[derive(Clone)]
pub struct RoleResolver {
    source: Arc<dyn RoleSource>,
}

impl RoleResolver {
    pub fn new(source: impl RoleSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Distinct role kinds, ignoring target scoping.
    pub fn resolve_roles(&self, user: UserId) -> Result<RoleSet, StoreError> {
        Ok(self
            .source
            .role_assignments_for(user)?
            .into_iter()
            .map(|a| a.role)
            .collect())
    }

    /// Full assignments, for callers that need target scoping.
    pub fn resolve_assignments(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        self.source.role_assignments_for(user)
    }

    /// Does `user` hold one of `kinds` scoped to exactly `target`?
    pub fn holds_on(
        &self,
        user: UserId,
        kinds: &[RoleKind],
        target: &RoleTarget,
    ) -> Result<bool, StoreError> {
        Ok(self
            .source
            .role_assignments_for(user)?
            .iter()
            .any(|a| &a.target == target && kinds.contains(&a.role)))
    }
}

impl core::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoleResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FailingRoles, StaticRoles};
    use crm_core::{DirectionId, EventId};

    fn curator_of_event_7() -> RoleResolver {
        let mut roles = StaticRoles::with(1, &[RoleKind::PROJECTANT]);
        roles.push(1, RoleKind::CURATOR, RoleTarget::event(EventId::new(7)), 10);
        roles.push(1, RoleKind::CURATOR, RoleTarget::event(EventId::new(7)), 11);
        RoleResolver::new(roles)
    }

    #[test]
    fn resolve_roles_collapses_duplicate_kinds() {
        let roles = curator_of_event_7().resolve_roles(UserId::new(1)).unwrap();
        assert_eq!(roles.len(), 2);
        assert!(roles.contains(&RoleKind::CURATOR));
        assert!(roles.contains(&RoleKind::PROJECTANT));
    }

    #[test]
    fn resolve_assignments_keeps_targets() {
        let resolver = curator_of_event_7();
        let assignments = resolver.resolve_assignments(UserId::new(1)).unwrap();
        assert_eq!(assignments.len(), 3);
        assert!(
            assignments
                .iter()
                .any(|a| a.role == RoleKind::CURATOR && a.target == RoleTarget::event(EventId::new(7)))
        );
        assert!(resolver.resolve_assignments(UserId::new(2)).unwrap().is_empty());
    }

    #[test]
    fn holds_on_matches_exact_kind_and_target() {
        let resolver = curator_of_event_7();
        let user = UserId::new(1);
        let event_7 = RoleTarget::event(EventId::new(7));

        assert!(resolver.holds_on(user, &[RoleKind::CURATOR], &event_7).unwrap());
        assert!(
            resolver
                .holds_on(user, &[RoleKind::ADMIN, RoleKind::CURATOR], &event_7)
                .unwrap()
        );

        // same kind, other target id
        assert!(
            !resolver
                .holds_on(user, &[RoleKind::CURATOR], &RoleTarget::event(EventId::new(8)))
                .unwrap()
        );
        // same id, other target type
        assert!(
            !resolver
                .holds_on(user, &[RoleKind::CURATOR], &RoleTarget::direction(DirectionId::new(7)))
                .unwrap()
        );
        // right target, other kind
        assert!(!resolver.holds_on(user, &[RoleKind::ADMIN], &event_7).unwrap());
        assert!(!resolver.holds_on(user, &[], &event_7).unwrap());
        assert!(!resolver.holds_on(UserId::new(2), &[RoleKind::CURATOR], &event_7).unwrap());
    }

    #[test]
    fn store_failures_propagate() {
        let resolver = RoleResolver::new(FailingRoles);
        let event = RoleTarget::event(EventId::new(1));
        assert!(resolver.resolve_assignments(UserId::new(1)).is_err());
        assert!(resolver.holds_on(UserId::new(1), &[RoleKind::ADMIN], &event).is_err());
    }
}
