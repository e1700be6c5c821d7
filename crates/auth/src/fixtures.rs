//! Small in-crate doubles for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crm_core::{RoleAssignmentId, UserId};

use crate::principal::{Principal, UserIdentity};
use crate::roles::RoleKind;
use crate::store::{RevocationList, RoleSource, StoreError, UserDirectory};
use crate::target::{RoleAssignment, RoleTarget};
use crate::user::UserAccount;

pub fn user(id: i64) -> Principal {
    Principal::user(UserIdentity {
        id: UserId::new(id),
        email: format!("user{id}@example.com"),
        is_superuser: false,
        is_staff: false,
    })
}

pub fn superuser(id: i64) -> Principal {
    Principal::user(UserIdentity {
        id: UserId::new(id),
        email: format!("root{id}@example.com"),
        is_superuser: true,
        is_staff: true,
    })
}

pub fn anonymous() -> Principal {
    Principal::Anonymous
}

pub fn account(id: i64, active: bool) -> UserAccount {
    UserAccount {
        id: UserId::new(id),
        email: format!("user{id}@example.com"),
        first_name: "Test".into(),
        last_name: "User".into(),
        password_hash: format!("hash-{id}"),
        is_active: active,
        is_superuser: false,
        is_staff: false,
        date_joined: Utc::now(),
    }
}

#[derive(Default)]
pub struct StaticRoles {
    by_user: HashMap<UserId, Vec<RoleAssignment>>,
}

impl StaticRoles {
    /// Global-ish roles: every kind is scoped to the user's own profile id.
    pub fn with(user_id: i64, kinds: &[RoleKind]) -> Self {
        let mut me = Self::default();
        for (n, kind) in kinds.iter().enumerate() {
            me.push(user_id, kind.clone(), RoleTarget::new(crate::TargetType::Profile, user_id), n as i64 + 1);
        }
        me
    }

    pub fn push(&mut self, user_id: i64, role: RoleKind, target: RoleTarget, id: i64) {
        self.by_user
            .entry(UserId::new(user_id))
            .or_default()
            .push(RoleAssignment {
                id: RoleAssignmentId::new(id),
                user_id: UserId::new(user_id),
                role,
                target,
            });
    }
}

impl RoleSource for StaticRoles {
    fn role_assignments_for(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        Ok(self.by_user.get(&user).cloned().unwrap_or_default())
    }
}

/// Every read fails.
pub struct FailingRoles;

impl RoleSource for FailingRoles {
    fn role_assignments_for(&self, _user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        Err(StoreError::Unavailable("role source offline".into()))
    }
}

#[derive(Default)]
pub struct Users {
    accounts: Mutex<HashMap<UserId, UserAccount>>,
}

impl Users {
    pub fn with(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        Self {
            accounts: Mutex::new(accounts.into_iter().map(|a| (a.id, a)).collect()),
        }
    }

    pub fn set_active(&self, id: i64, active: bool) {
        if let Some(a) = self.accounts.lock().unwrap().get_mut(&UserId::new(id)) {
            a.is_active = active;
        }
    }

    pub fn remove(&self, id: i64) {
        self.accounts.lock().unwrap().remove(&UserId::new(id));
    }
}

impl UserDirectory for Users {
    fn find_user_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.accounts.lock().unwrap().get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.email == email)
            .cloned())
    }
}

#[derive(Default)]
pub struct Revocations {
    jtis: Mutex<HashSet<String>>,
}

impl Revocations {
    pub fn len(&self) -> usize {
        self.jtis.lock().unwrap().len()
    }
}

impl RevocationList for Revocations {
    fn revoke(&self, jti: &str, _expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        Ok(self.jtis.lock().unwrap().insert(jti.to_string()))
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        Ok(self.jtis.lock().unwrap().contains(jti))
    }
}
