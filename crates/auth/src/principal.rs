use serde::{Deserialize, Serialize};

use crm_core::UserId;

use crate::user::UserAccount;

/// Snapshot of the authenticated user carried through a request.
///
/// Built from the account record at token validation time; the `is_active`
/// flag is intentionally not part of it (it gated issuance, not use).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub email: String,
    pub is_superuser: bool,
    pub is_staff: bool,
}

impl From<&UserAccount> for UserIdentity {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            is_superuser: account.is_superuser,
            is_staff: account.is_staff,
        }
    }
}

/// The identity attached to a request, or its absence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    #[default]
    Anonymous,
    User(UserIdentity),
}

impl Principal {
    pub fn user(identity: UserIdentity) -> Self {
        Principal::User(identity)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User(_))
    }

    pub fn is_superuser(&self) -> bool {
        matches!(self, Principal::User(u) if u.is_superuser)
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        match self {
            Principal::User(u) => Some(u),
            Principal::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.identity().map(|u| u.id)
    }
}

impl From<UserIdentity> for Principal {
    fn from(value: UserIdentity) -> Self {
        Principal::User(value)
    }
}
