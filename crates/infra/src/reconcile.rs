//! Keeps role assignments pointing at records that exist.
//!
//! Role targets are tagged references without a foreign key. Deletions that go
//! through [`delete_event_cascading`] / [`delete_direction_cascading`] remove
//! the affected assignments immediately; [`reconcile_role_targets`] sweeps
//! anything left dangling by writes that bypassed them.

use thiserror::Error;

use crm_auth::{CredentialStore, RoleTarget, StoreError, TargetType};
use crm_catalog::{CatalogStore, CatalogStoreError, Direction, Event};
use crm_core::{ApplicationId, DirectionId, EventId, ProfileId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error(transparent)]
    Credentials(#[from] StoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogStoreError),
}

/// Delete an event, its directions and every role scoped to any of them.
pub fn delete_event_cascading(
    catalog: &dyn CatalogStore,
    credentials: &dyn CredentialStore,
    id: EventId,
) -> Result<Option<Event>, ReconcileError> {
    let Some((event, directions)) = catalog.delete_event(id)? else {
        return Ok(None);
    };

    let mut removed = credentials.remove_assignments_for_target(&RoleTarget::event(id))?;
    for d in directions {
        removed += credentials.remove_assignments_for_target(&RoleTarget::direction(d))?;
    }
    tracing::info!(event_id = %id, roles_removed = removed, "event deleted");
    Ok(Some(event))
}

pub fn delete_direction_cascading(
    catalog: &dyn CatalogStore,
    credentials: &dyn CredentialStore,
    id: DirectionId,
) -> Result<Option<Direction>, ReconcileError> {
    let Some(direction) = catalog.delete_direction(id)? else {
        return Ok(None);
    };
    let removed = credentials.remove_assignments_for_target(&RoleTarget::direction(id))?;
    tracing::info!(direction_id = %id, roles_removed = removed, "direction deleted");
    Ok(Some(direction))
}

/// Outcome of a reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub removed: Vec<RoleTarget>,
    /// Target types this process cannot resolve; left untouched.
    pub skipped: usize,
}

/// Remove assignments whose target no longer exists.
///
/// Project targets are not stored by this service and are never removed.
pub fn reconcile_role_targets(
    catalog: &dyn CatalogStore,
    credentials: &dyn CredentialStore,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::default();

    for assignment in credentials.list_role_assignments()? {
        report.checked += 1;
        let target = assignment.target;
        let exists = match target.target_type {
            TargetType::Profile => credentials
                .find_profile_by_id(ProfileId::new(target.target_id))?
                .is_some(),
            TargetType::Event => catalog.get_event(EventId::new(target.target_id))?.is_some(),
            TargetType::Direction => catalog
                .get_direction(DirectionId::new(target.target_id))?
                .is_some(),
            TargetType::Application => catalog
                .get_application(ApplicationId::new(target.target_id))?
                .is_some(),
            TargetType::Project => {
                report.skipped += 1;
                continue;
            }
        };

        if !exists && credentials.remove_role(assignment.id)? {
            tracing::warn!(
                assignment_id = %assignment.id,
                user_id = %assignment.user_id,
                %target,
                "removed role assignment with dangling target"
            );
            report.removed.push(target);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use crm_auth::{NewUser, ProfileFields, RoleGrant, RoleKind, RoleSource};
    use crm_catalog::{DirectionDraft, EventDraft};

    use super::*;
    use crate::catalog::InMemoryCatalogStore;
    use crate::identity::InMemoryCredentialStore;

    fn event_draft() -> EventDraft {
        EventDraft {
            name: "Olympiad".into(),
            description: String::new(),
            stage: "open".into(),
            start_date: NaiveDate::from_ymd_opt(2027, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 3, 2).unwrap(),
            end_app_date: Utc::now() + Duration::days(7),
            specialization: None,
        }
    }

    #[test]
    fn event_deletion_cascades_to_scoped_roles() {
        let catalog = InMemoryCatalogStore::new();
        let creds = InMemoryCredentialStore::new();
        let user = creds
            .create_user(NewUser::applicant("c@x.io", "C", "D", "h".into()))
            .unwrap();

        let ev = catalog.insert_event(event_draft()).unwrap();
        let dir = catalog
            .insert_direction(
                ev.id,
                DirectionDraft {
                    name: "Math".into(),
                    description: String::new(),
                    leader: None,
                },
            )
            .unwrap();
        for target in [RoleTarget::event(ev.id), RoleTarget::direction(dir.id)] {
            creds
                .assign_role(RoleGrant {
                    user_id: user.id,
                    role: RoleKind::CURATOR,
                    target,
                })
                .unwrap();
        }

        assert!(delete_event_cascading(&catalog, &creds, ev.id).unwrap().is_some());
        assert!(creds.role_assignments_for(user.id).unwrap().is_empty());
        assert!(delete_event_cascading(&catalog, &creds, ev.id).unwrap().is_none());
    }

    #[test]
    fn sweep_removes_only_dangling_targets() {
        let catalog = InMemoryCatalogStore::new();
        let creds = InMemoryCredentialStore::new();
        let user = creds
            .create_user(NewUser::applicant("e@x.io", "E", "F", "h".into()))
            .unwrap();
        let profile = creds
            .upsert_profile(user.id, ProfileFields::from_account(&user))
            .unwrap();
        let ev = catalog.insert_event(event_draft()).unwrap();

        for target in [
            RoleTarget::profile(profile.id),
            RoleTarget::event(ev.id),
            RoleTarget::new(TargetType::Event, 999),
            RoleTarget::new(TargetType::Project, 5),
        ] {
            creds
                .assign_role(RoleGrant {
                    user_id: user.id,
                    role: RoleKind::PROJECTANT,
                    target,
                })
                .unwrap();
        }

        let report = reconcile_role_targets(&catalog, &creds).unwrap();
        assert_eq!(report.checked, 4);
        assert_eq!(report.removed, vec![RoleTarget::new(TargetType::Event, 999)]);
        assert_eq!(report.skipped, 1);
        assert_eq!(creds.role_assignments_for(user.id).unwrap().len(), 3);
    }
}
