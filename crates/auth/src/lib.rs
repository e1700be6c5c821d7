//! `crm-auth`: identity and authorization core.
//!
//! This crate is decoupled from HTTP and storage. Storage is reached through
//! the ports in [`store`]; the HTTP boundary lives in `crm-api`.

pub mod account_token;
pub mod accounts;
pub mod authorize;
pub mod claims;
pub mod csrf;
pub mod guard;
pub mod mail;
pub mod password;
pub mod policy;
pub mod principal;
pub mod resolver;
pub mod roles;
pub mod store;
pub mod target;
pub mod token;
pub mod user;

#[cfg(test)]
pub(crate) mod fixtures;

pub use account_token::{AccountTokenGenerator, AccountTokenPurpose};
pub use accounts::{AccountError, AccountService, FieldErrors, PasswordResetConfirm, Registration, UserSummary};
pub use authorize::{AuthorizationExplanation, AuthzError, authorize, decide, explain_authorization};
pub use claims::{SessionClaims, TokenType, TokenValidationError, validate_claims};
pub use guard::{Guarded, RoleRequirement, role_required};
pub use mail::{MailError, MailMessage, Mailer};
pub use policy::{RequestSafety, ResourcePolicy};
pub use principal::{Principal, UserIdentity};
pub use resolver::RoleResolver;
pub use roles::{RoleKind, RoleSet};
pub use store::{CredentialStore, RevocationList, RoleSource, StoreError, UserDirectory};
pub use target::{RoleAssignment, RoleGrant, RoleTarget, TargetType};
pub use token::{TokenConfig, TokenPair, TokenService};
pub use user::{NewUser, Profile, ProfileFields, UserAccount};
