use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crm_auth::{
    CredentialStore, NewUser, Profile, ProfileFields, RevocationList, RoleAssignment, RoleGrant,
    RoleSource, RoleTarget, StoreError, UserAccount, UserDirectory,
};
use crm_core::{ProfileId, RoleAssignmentId, UserId};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserAccount>,
    /// Keyed by owning user.
    profiles: BTreeMap<UserId, Profile>,
    roles: BTreeMap<RoleAssignmentId, RoleAssignment>,
    next_user: i64,
    next_profile: i64,
    next_role: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

/// In-memory credential store.
///
/// Intended for tests/dev. Email uniqueness and role-assignment uniqueness are
/// enforced under a single write lock.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserDirectory for InMemoryCredentialStore {
    fn find_user_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }
}

impl RoleSource for InMemoryCredentialStore {
    fn role_assignments_for(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.roles.values().filter(|a| a.user_id == user).cloned().collect())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn create_user(&self, user: NewUser) -> Result<UserAccount, StoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {} is taken", user.email)));
        }

        let id = UserId::new(next(&mut t.next_user));
        let account = UserAccount {
            id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_hash: user.password_hash,
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        };
        t.users.insert(id, account.clone());
        Ok(account)
    }

    fn update_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        if t.users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(StoreError::Conflict(format!("email {} is taken", user.email)));
        }
        match t.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::Corrupt(format!("user {} does not exist", user.id))),
        }
    }

    fn find_profile(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.profiles.get(&user).cloned())
    }

    fn find_profile_by_id(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.profiles.values().find(|p| p.id == id).cloned())
    }

    fn upsert_profile(&self, user: UserId, fields: ProfileFields) -> Result<Profile, StoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        if !t.users.contains_key(&user) {
            return Err(StoreError::Corrupt(format!("user {user} does not exist")));
        }

        let id = match t.profiles.get(&user) {
            Some(existing) => existing.id,
            None => ProfileId::new(next(&mut t.next_profile)),
        };
        let profile = Profile {
            id,
            user_id: user,
            surname: fields.surname,
            name: fields.name,
            patronymic: fields.patronymic,
            telegram: fields.telegram,
            email: fields.email,
            course: fields.course,
            university: fields.university,
            vk: fields.vk,
            job: fields.job,
        };
        t.profiles.insert(user, profile.clone());
        Ok(profile)
    }

    fn assign_role(&self, grant: RoleGrant) -> Result<RoleAssignment, StoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        if let Some(existing) = t.roles.values().find(|a| a.matches_grant(&grant)) {
            return Ok(existing.clone());
        }
        let id = RoleAssignmentId::new(next(&mut t.next_role));
        let assignment = RoleAssignment {
            id,
            user_id: grant.user_id,
            role: grant.role,
            target: grant.target,
        };
        t.roles.insert(id, assignment.clone());
        Ok(assignment)
    }

    fn remove_role(&self, id: RoleAssignmentId) -> Result<bool, StoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        Ok(t.roles.remove(&id).is_some())
    }

    fn list_role_assignments(&self) -> Result<Vec<RoleAssignment>, StoreError> {
        let t = self.tables.read().map_err(|_| poisoned())?;
        Ok(t.roles.values().cloned().collect())
    }

    fn remove_assignments_for_target(&self, target: &RoleTarget) -> Result<usize, StoreError> {
        let mut t = self.tables.write().map_err(|_| poisoned())?;
        let before = t.roles.len();
        t.roles.retain(|_, a| &a.target != target);
        Ok(before - t.roles.len())
    }
}

/// In-memory revocation list; a map from `jti` to the token's own expiry.
#[derive(Debug, Default)]
pub struct InMemoryRevocationList {
    entries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries whose token has expired anyway; returns how many.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let before = entries.len();
        entries.retain(|_, exp| *exp > now);
        Ok(before - entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationList for InMemoryRevocationList {
    fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        if entries.contains_key(jti) {
            return Ok(false);
        }
        entries.insert(jti.to_string(), expires_at);
        Ok(true)
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries.contains_key(jti))
    }
}
