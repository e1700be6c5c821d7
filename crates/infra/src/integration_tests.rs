//! Integration tests for the identity pipeline.
//!
//! Tests: Registration → Confirmation mail → Activation → Login → Session tokens
//!
//! Verifies:
//! - New users start inactive with a projectant role on their own profile
//! - One-time account tokens are consumed by the state change they authorise
//! - Session rotation runs against the in-memory revocation list

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crm_auth::{
        AccountError, AccountService, AccountTokenGenerator, CredentialStore, PasswordResetConfirm,
        Registration, RoleKind, RoleResolver, RoleSource, RoleTarget, TargetType, TokenConfig,
        TokenService, UserDirectory,
    };

    use crate::identity::{InMemoryCredentialStore, InMemoryRevocationList};
    use crate::mail::{FailingMailer, InMemoryOutbox, token_from_body};

    const SECRET: &str = "integration-secret-integration-secret";

    struct Harness {
        store: Arc<InMemoryCredentialStore>,
        outbox: Arc<InMemoryOutbox>,
        accounts: AccountService,
        tokens: TokenService,
    }

    fn setup() -> Harness {
        let store = Arc::new(InMemoryCredentialStore::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let accounts = AccountService::new(
            store.clone(),
            AccountTokenGenerator::new(SECRET, 3600).unwrap(),
            outbox.clone(),
            "http://crm.test",
        );
        let tokens = TokenService::new(
            TokenConfig::new(SECRET),
            store.clone(),
            InMemoryRevocationList::new(),
        )
        .unwrap();
        Harness {
            store,
            outbox,
            accounts,
            tokens,
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            email: email.into(),
            first_name: "Ivan".into(),
            last_name: "Petrov".into(),
            password: "long-enough-pw".into(),
            password_confirmation: "long-enough-pw".into(),
        }
    }

    fn mailed_token(h: &Harness, to: &str) -> String {
        let mail = h.outbox.last_to(to).expect("mail sent");
        token_from_body(&mail.body).expect("token in body")
    }

    #[test]
    fn registration_creates_inactive_user_with_default_role() {
        let h = setup();
        let user = h.accounts.register(registration("Ivan@Example.org")).unwrap();
        assert_eq!(user.email, "ivan@example.org");
        assert!(!user.is_active);

        let profile = h.store.find_profile(user.id).unwrap().unwrap();
        let roles = h.store.role_assignments_for(user.id).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].role, RoleKind::PROJECTANT);
        assert_eq!(roles[0].target, RoleTarget::profile(profile.id));

        let mail = h.outbox.last_to("ivan@example.org").unwrap();
        assert!(mail.body.contains("http://crm.test/confirm-email?email=ivan%40example.org&token="));
    }

    #[test]
    fn registration_rules() {
        let h = setup();
        let mut bad = registration("x@example.org");
        bad.password_confirmation = "something-else".into();
        let Err(AccountError::Validation(errors)) = h.accounts.register(bad) else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("password_confirmation"));

        let mut numeric = registration("x@example.org");
        numeric.password = "1234567890".into();
        numeric.password_confirmation = "1234567890".into();
        let Err(AccountError::Validation(errors)) = h.accounts.register(numeric) else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("password"));

        h.accounts.register(registration("x@example.org")).unwrap();
        let Err(AccountError::Validation(errors)) = h.accounts.register(registration("X@example.org")) else {
            panic!("expected duplicate email");
        };
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn inactive_user_cannot_log_in_until_confirmed() {
        let h = setup();
        h.accounts.register(registration("a@example.org")).unwrap();
        assert_eq!(
            h.accounts.login("a@example.org", "long-enough-pw"),
            Err(AccountError::InvalidCredentials)
        );

        let token = mailed_token(&h, "a@example.org");
        let user = h.accounts.confirm_email("a@example.org", &token).unwrap();
        assert!(user.is_active);

        // the token is spent once the account is active
        assert!(h.accounts.confirm_email("a@example.org", &token).is_err());

        let user = h.accounts.login("A@example.org", "long-enough-pw").unwrap();
        assert_eq!(
            h.accounts.login("a@example.org", "wrong-password"),
            Err(AccountError::InvalidCredentials)
        );
        assert_eq!(
            h.accounts.login("nobody@example.org", "long-enough-pw"),
            Err(AccountError::InvalidCredentials)
        );

        let pair = h.tokens.issue_for(&user).unwrap();
        let principal = h.tokens.validate_access(&pair.access).unwrap();
        assert_eq!(principal.user_id(), Some(user.id));

        let resolver = RoleResolver::new(h.store.clone());
        assert!(resolver.resolve_roles(user.id).unwrap().contains(&RoleKind::PROJECTANT));
    }

    #[test]
    fn bad_confirmation_token_is_a_token_error() {
        let h = setup();
        h.accounts.register(registration("b@example.org")).unwrap();
        let Err(AccountError::Validation(errors)) = h.accounts.confirm_email("b@example.org", "1-00") else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("token"));

        let Err(AccountError::Validation(errors)) = h.accounts.confirm_email("zz@example.org", "1-00") else {
            panic!("expected validation error");
        };
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn password_reset_round() {
        let h = setup();
        h.accounts.register(registration("r@example.org")).unwrap();

        // unconfirmed accounts cannot reset
        assert!(h.accounts.request_password_reset("r@example.org").is_err());

        let confirm = mailed_token(&h, "r@example.org");
        h.accounts.confirm_email("r@example.org", &confirm).unwrap();

        h.accounts.request_password_reset("r@example.org").unwrap();
        let mail = h.outbox.last_to("r@example.org").unwrap();
        assert!(mail.body.contains("/password-reset/confirm?"));
        let reset = token_from_body(&mail.body).unwrap();

        h.accounts.check_password_reset("r@example.org", &reset).unwrap();
        h.accounts
            .confirm_password_reset(PasswordResetConfirm {
                email: "r@example.org".into(),
                token: reset.clone(),
                new_password: "brand-new-pass".into(),
                new_password_confirmation: "brand-new-pass".into(),
            })
            .unwrap();

        assert!(h.accounts.login("r@example.org", "brand-new-pass").is_ok());
        assert!(h.accounts.login("r@example.org", "long-enough-pw").is_err());
        // the password change invalidated the reset link
        assert!(h.accounts.check_password_reset("r@example.org", &reset).is_err());
    }

    #[test]
    fn mail_failures_do_not_fail_registration() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let accounts = AccountService::new(
            store.clone(),
            AccountTokenGenerator::new(SECRET, 3600).unwrap(),
            Arc::new(FailingMailer),
            "http://crm.test",
        );
        assert!(accounts.register(registration("m@example.org")).is_ok());
    }

    #[test]
    fn provisioned_superuser_is_active_and_idempotent() {
        let h = setup();
        let root = h.accounts.provision_superuser("root@example.org", "root-password").unwrap();
        assert!(root.is_active && root.is_superuser && root.is_staff);
        let again = h.accounts.provision_superuser("root@example.org", "other-password").unwrap();
        assert_eq!(root.id, again.id);

        let roles = h.store.role_assignments_for(root.id).unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].target.target_type, TargetType::Profile);
    }

    #[test]
    fn provisioning_promotes_an_existing_inactive_account() {
        let h = setup();
        let registered = h.accounts.register(registration("boss@example.org")).unwrap();
        assert!(!registered.is_active && !registered.is_superuser);

        let promoted = h
            .accounts
            .provision_superuser("Boss@example.org", "another-password")
            .unwrap();
        assert_eq!(promoted.id, registered.id);
        assert!(promoted.is_active && promoted.is_superuser && promoted.is_staff);

        let stored = h.store.find_user_by_id(registered.id).unwrap().unwrap();
        assert!(stored.is_active && stored.is_superuser && stored.is_staff);
        assert_eq!(stored.password_hash, registered.password_hash);

        // the profile role from registration is reused, not duplicated
        assert_eq!(h.store.role_assignments_for(registered.id).unwrap().len(), 1);
        assert!(h.accounts.login("boss@example.org", "long-enough-pw").is_ok());
    }
}
