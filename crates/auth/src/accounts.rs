//! Registration, login, email confirmation and password reset.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_core::UserId;

use crate::account_token::{AccountTokenGenerator, AccountTokenPurpose};
use crate::authorize::AuthzError;
use crate::mail::{MailMessage, Mailer, send_best_effort};
use crate::password::{hash_password, verify_password};
use crate::roles::RoleKind;
use crate::store::{CredentialStore, StoreError, UserDirectory};
use crate::target::{RoleAssignment, RoleGrant, RoleTarget};
use crate::user::{NewUser, Profile, ProfileFields, UserAccount, normalize_email};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Field name -> messages, serialized as-is in 400 responses.
pub type FieldErrors = BTreeMap<&'static str, Vec<String>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("validation failed")]
    Validation(FieldErrors),

    /// Login failure; deliberately the same for every cause.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl AccountError {
    fn field(name: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name, vec![message.into()]);
        AccountError::Validation(errors)
    }
}

impl From<AuthzError> for AccountError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::Store(e) => AccountError::Store(e),
            other => AccountError::Hashing(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfirm {
    pub email: String,
    pub token: String,
    pub new_password: String,
    pub new_password_confirmation: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&UserAccount> for UserSummary {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
        }
    }
}

/// Account lifecycle workflows over a [`CredentialStore`].
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn CredentialStore>,
    tokens: AccountTokenGenerator,
    mailer: Arc<dyn Mailer>,
    public_base_url: String,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        tokens: AccountTokenGenerator,
        mailer: Arc<dyn Mailer>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create an inactive user, its profile and its default role, then mail a
    /// confirmation link.
    pub fn register(&self, input: Registration) -> Result<UserAccount, AccountError> {
        let mut errors = FieldErrors::new();
        let email = normalize_email(&input.email);

        if !is_plausible_email(&email) {
            errors.entry("email").or_default().push("Enter a valid email address.".into());
        }
        if input.first_name.trim().is_empty() {
            errors.entry("first_name").or_default().push("This field is required.".into());
        }
        if input.last_name.trim().is_empty() {
            errors.entry("last_name").or_default().push("This field is required.".into());
        }
        if input.password != input.password_confirmation {
            errors
                .entry("password_confirmation")
                .or_default()
                .push("Passwords do not match.".into());
        } else {
            let problems = password_problems(&input.password);
            if !problems.is_empty() {
                errors.entry("password").or_default().extend(problems);
            }
        }
        if errors.is_empty() && self.store.find_user_by_email(&email)?.is_some() {
            errors
                .entry("email")
                .or_default()
                .push("A user with this email already exists.".into());
        }
        if !errors.is_empty() {
            return Err(AccountError::Validation(errors));
        }

        let hash = hash_password(&input.password)?;
        let user = match self.store.create_user(NewUser::applicant(
            &email,
            &input.first_name,
            &input.last_name,
            hash,
        )) {
            Ok(user) => user,
            Err(StoreError::Conflict(_)) => {
                return Err(AccountError::field("email", "A user with this email already exists."));
            }
            Err(e) => return Err(e.into()),
        };

        let profile = self
            .store
            .upsert_profile(user.id, ProfileFields::from_account(&user))?;
        self.assign_default_role(user.id, RoleKind::PROJECTANT, RoleTarget::profile(profile.id))?;

        let token = self.tokens.make_token(AccountTokenPurpose::ConfirmEmail, &user);
        send_best_effort(
            self.mailer.as_ref(),
            &MailMessage {
                to: user.email.clone(),
                subject: "Confirm your registration".into(),
                body: format!(
                    "To confirm your account follow the link: {}",
                    self.link("/confirm-email", &user.email, &token)
                ),
            },
        );

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Administrative provisioning: an active superuser with profile and
    /// default role. An existing account with this email is promoted and
    /// re-activated; its password is left as it is.
    pub fn provision_superuser(&self, email: &str, password: &str) -> Result<UserAccount, AccountError> {
        let email = normalize_email(email);
        let user = match self.store.find_user_by_email(&email)? {
            Some(mut existing) => {
                if !(existing.is_active && existing.is_superuser && existing.is_staff) {
                    existing.is_active = true;
                    existing.is_superuser = true;
                    existing.is_staff = true;
                    self.store.update_user(&existing)?;
                    tracing::info!(user_id = %existing.id, "existing account promoted to superuser");
                }
                existing
            }
            None => {
                if !is_plausible_email(&email) {
                    return Err(AccountError::field("email", "Enter a valid email address."));
                }
                let problems = password_problems(password);
                if !problems.is_empty() {
                    let mut errors = FieldErrors::new();
                    errors.insert("password", problems);
                    return Err(AccountError::Validation(errors));
                }

                let user = self.store.create_user(NewUser {
                    email,
                    first_name: String::new(),
                    last_name: String::new(),
                    password_hash: hash_password(password)?,
                    is_active: true,
                    is_superuser: true,
                    is_staff: true,
                })?;
                tracing::info!(user_id = %user.id, "superuser provisioned");
                user
            }
        };

        let profile = match self.store.find_profile(user.id)? {
            Some(profile) => profile,
            None => self
                .store
                .upsert_profile(user.id, ProfileFields::from_account(&user))?,
        };
        self.assign_default_role(user.id, RoleKind::PROJECTANT, RoleTarget::profile(profile.id))?;
        Ok(user)
    }

    /// The explicit post-registration step granting the starting role.
    pub fn assign_default_role(
        &self,
        user: UserId,
        role: RoleKind,
        target: RoleTarget,
    ) -> Result<RoleAssignment, StoreError> {
        let assignment = self.store.assign_role(RoleGrant {
            user_id: user,
            role,
            target,
        })?;
        tracing::debug!(user_id = %user, role = %assignment.role, target = %assignment.target, "default role assigned");
        Ok(assignment)
    }

    /// Email + password for an active user. Every failure looks the same.
    pub fn login(&self, email: &str, password: &str) -> Result<UserAccount, AccountError> {
        let Some(user) = self.store.find_user_by_email(&normalize_email(email))? else {
            return Err(AccountError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash) || !user.is_active {
            return Err(AccountError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn confirm_email(&self, email: &str, token: &str) -> Result<UserAccount, AccountError> {
        let mut user = self.require_user(email)?;
        if user.is_active {
            return Err(AccountError::field("email", "This account is already confirmed."));
        }
        if !self.tokens.check_token(AccountTokenPurpose::ConfirmEmail, &user, token) {
            return Err(invalid_token());
        }

        user.is_active = true;
        self.store.update_user(&user)?;
        tracing::info!(user_id = %user.id, "email confirmed");
        Ok(user)
    }

    pub fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let user = self.require_user(email)?;
        if !user.is_active {
            return Err(AccountError::field("email", "This account is not confirmed."));
        }

        let token = self.tokens.make_token(AccountTokenPurpose::PasswordReset, &user);
        send_best_effort(
            self.mailer.as_ref(),
            &MailMessage {
                to: user.email.clone(),
                subject: "Password reset".into(),
                body: format!(
                    "To reset your password follow the link: {}",
                    self.link("/password-reset/confirm", &user.email, &token)
                ),
            },
        );
        tracing::info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    /// Validate a reset link without consuming it.
    pub fn check_password_reset(&self, email: &str, token: &str) -> Result<UserAccount, AccountError> {
        let user = self.require_user(email)?;
        if !self.tokens.check_token(AccountTokenPurpose::PasswordReset, &user, token) {
            return Err(invalid_token());
        }
        Ok(user)
    }

    pub fn confirm_password_reset(&self, input: PasswordResetConfirm) -> Result<(), AccountError> {
        let mut user = self.check_password_reset(&input.email, &input.token)?;

        if input.new_password != input.new_password_confirmation {
            return Err(AccountError::field(
                "new_password_confirmation",
                "Passwords do not match.",
            ));
        }
        let problems = password_problems(&input.new_password);
        if !problems.is_empty() {
            let mut errors = FieldErrors::new();
            errors.insert("new_password", problems);
            return Err(AccountError::Validation(errors));
        }

        user.password_hash = hash_password(&input.new_password)?;
        self.store.update_user(&user)?;
        tracing::info!(user_id = %user.id, "password reset completed");
        Ok(())
    }

    pub fn profile(&self, user: &UserAccount) -> Result<Profile, AccountError> {
        match self.store.find_profile(user.id)? {
            Some(profile) => Ok(profile),
            None => Ok(self
                .store
                .upsert_profile(user.id, ProfileFields::from_account(user))?),
        }
    }

    pub fn update_profile(&self, user: UserId, fields: ProfileFields) -> Result<Profile, AccountError> {
        let mut errors = FieldErrors::new();
        if fields.surname.trim().is_empty() {
            errors.entry("surname").or_default().push("This field is required.".into());
        }
        if fields.name.trim().is_empty() {
            errors.entry("name").or_default().push("This field is required.".into());
        }
        if !is_plausible_email(&normalize_email(&fields.email)) {
            errors.entry("email").or_default().push("Enter a valid email address.".into());
        }
        if !errors.is_empty() {
            return Err(AccountError::Validation(errors));
        }
        Ok(self.store.upsert_profile(user, fields)?)
    }

    fn require_user(&self, email: &str) -> Result<UserAccount, AccountError> {
        self.store
            .find_user_by_email(&normalize_email(email))?
            .ok_or_else(|| AccountError::field("email", "No user with this email."))
    }

    fn link(&self, path: &str, email: &str, token: &str) -> String {
        format!(
            "{}{}?email={}&token={}",
            self.public_base_url,
            path,
            encode_query_value(email),
            token
        )
    }
}

impl core::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountService")
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

fn invalid_token() -> AccountError {
    AccountError::field("token", "Invalid or expired token.")
}

/// Password rules: minimum length and not entirely numeric.
pub fn password_problems(password: &str) -> Vec<String> {
    let mut problems = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".into());
    }
    problems
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(password_problems("s3cure-pass").is_empty());
        assert_eq!(password_problems("short").len(), 1);
        assert_eq!(password_problems("1234").len(), 2);
        assert_eq!(password_problems("123456789").len(), 1);
    }

    #[test]
    fn email_shape() {
        assert!(is_plausible_email("a@b.io"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("@b.io"));
        assert!(!is_plausible_email("a b@c.io"));
        assert!(!is_plausible_email("a@@b.io"));
    }

    #[test]
    fn query_values_are_percent_encoded() {
        assert_eq!(encode_query_value("a+b@x.io"), "a%2Bb%40x.io");
    }
}
