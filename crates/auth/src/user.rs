//! User accounts and profiles as held by the credential store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crm_core::{ProfileId, UserId};

/// Durable user record.
///
/// `email` is the login handle and is stored lower-cased. `password_hash` is a
/// PHC string (see [`crate::password`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

/// Input for creating a user record; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub is_staff: bool,
}

impl NewUser {
    /// A self-registered applicant: inactive until the email is confirmed.
    pub fn applicant(
        email: &str,
        first_name: &str,
        last_name: &str,
        password_hash: String,
    ) -> Self {
        Self {
            email: normalize_email(email),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            password_hash,
            is_active: false,
            is_superuser: false,
            is_staff: false,
        }
    }
}

/// Applicant profile, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: UserId,
    pub surname: String,
    pub name: String,
    pub patronymic: String,
    pub telegram: String,
    pub email: String,
    pub course: u32,
    pub university: String,
    pub vk: String,
    pub job: String,
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub surname: String,
    pub name: String,
    #[serde(default)]
    pub patronymic: String,
    #[serde(default)]
    pub telegram: String,
    pub email: String,
    #[serde(default)]
    pub course: u32,
    #[serde(default)]
    pub university: String,
    #[serde(default)]
    pub vk: String,
    #[serde(default)]
    pub job: String,
}

impl ProfileFields {
    /// Defaults derived from the account when a profile is first created.
    pub fn from_account(account: &UserAccount) -> Self {
        Self {
            surname: account.last_name.clone(),
            name: account.first_name.clone(),
            email: account.email.clone(),
            ..Default::default()
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
