//! Session token issuance, validation, rotation and revocation.
//!
//! Tokens are HS256 JWTs carrying [`SessionClaims`]. Every way a presented
//! token can be wrong (bad signature, malformed, expired, wrong type, revoked)
//! surfaces as [`AuthzError::InvalidToken`]; the precise reason is only logged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::authorize::AuthzError;
use crate::claims::{SessionClaims, TokenType, validate_claims};
use crate::principal::{Principal, UserIdentity};
use crate::store::{RevocationList, UserDirectory};
use crate::user::UserAccount;

/// Signing secret and lifetimes.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl_secs: 300,
            refresh_ttl_secs: 86_400,
        }
    }

    pub fn with_ttls(mut self, access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        self
    }
}

impl core::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

/// A freshly minted access/refresh pair.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    pub access_max_age: i64,
    pub refresh_max_age: i64,
}

impl core::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_max_age", &self.access_max_age)
            .field("refresh_max_age", &self.refresh_max_age)
            .finish_non_exhaustive()
    }
}

/// Sole authority on session-token validity.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<TokenConfig>,
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    users: Arc<dyn UserDirectory>,
    revocations: Arc<dyn RevocationList>,
}

impl TokenService {
    pub fn new(
        config: TokenConfig,
        users: impl UserDirectory + 'static,
        revocations: impl RevocationList + 'static,
    ) -> Result<Self, AuthzError> {
        if config.secret.is_empty() {
            return Err(AuthzError::ConfigurationError(
                "token signing secret is empty".into(),
            ));
        }
        if config.access_ttl_secs <= 0 || config.refresh_ttl_secs <= 0 {
            return Err(AuthzError::ConfigurationError(
                "token lifetimes must be positive".into(),
            ));
        }
        if config.secret.len() < 32 {
            tracing::warn!("token signing secret is shorter than 32 bytes");
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Time checks run in `validate_claims` against an explicit clock.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            config: Arc::new(config),
            encoding_key: Arc::new(encoding_key),
            decoding_key: Arc::new(decoding_key),
            validation: Arc::new(validation),
            users: Arc::new(users),
            revocations: Arc::new(revocations),
        })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Mint a pair for an active user.
    pub fn issue_for(&self, user: &UserAccount) -> Result<TokenPair, AuthzError> {
        self.issue_for_at(user, Utc::now())
    }

    pub fn issue_for_at(&self, user: &UserAccount, now: DateTime<Utc>) -> Result<TokenPair, AuthzError> {
        if !user.is_active {
            tracing::debug!(user_id = %user.id, "refusing to issue tokens for inactive user");
            return Err(AuthzError::Unauthenticated);
        }

        let access = SessionClaims::new(user.id, TokenType::Access, now, self.config.access_ttl_secs);
        let refresh = SessionClaims::new(user.id, TokenType::Refresh, now, self.config.refresh_ttl_secs);

        Ok(TokenPair {
            access: self.sign(&access)?,
            refresh: self.sign(&refresh)?,
            access_max_age: self.config.access_ttl_secs,
            refresh_max_age: self.config.refresh_ttl_secs,
        })
    }

    /// Resolve an access token to its principal.
    ///
    /// The user's active flag is not consulted here.
    pub fn validate_access(&self, token: &str) -> Result<Principal, AuthzError> {
        self.validate_access_at(token, Utc::now())
    }

    pub fn validate_access_at(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthzError> {
        let claims = self.decode_checked(token, TokenType::Access, now)?;
        let user_id = claims.user_id().ok_or(AuthzError::InvalidToken)?;
        let account = self
            .users
            .find_user_by_id(user_id)?
            .ok_or(AuthzError::UserNotFound)?;
        Ok(Principal::user(UserIdentity::from(&account)))
    }

    /// Single-use refresh: consume the presented token and mint a new pair.
    pub fn rotate(&self, refresh: Option<&str>) -> Result<TokenPair, AuthzError> {
        self.rotate_at(refresh, Utc::now())
    }

    pub fn rotate_at(&self, refresh: Option<&str>, now: DateTime<Utc>) -> Result<TokenPair, AuthzError> {
        let token = refresh.ok_or(AuthzError::MissingToken)?;
        let claims = self.decode_checked(token, TokenType::Refresh, now)?;
        let user_id = claims.user_id().ok_or(AuthzError::InvalidToken)?;
        let expires_at = claims.expires_at().ok_or(AuthzError::InvalidToken)?;

        // Add-and-check in one step; a concurrent second use loses here.
        if !self.revocations.revoke(&claims.jti, expires_at)? {
            tracing::info!(user_id = %user_id, jti = %claims.jti, "refresh token reuse rejected");
            return Err(AuthzError::InvalidToken);
        }

        let account = match self.users.find_user_by_id(user_id)? {
            Some(account) if account.is_active => account,
            _ => {
                tracing::info!(user_id = %user_id, "refresh for missing or inactive user");
                return Err(AuthzError::InvalidToken);
            }
        };

        let pair = self.issue_for_at(&account, now)?;
        tracing::info!(user_id = %user_id, jti = %claims.jti, "refresh token rotated");
        Ok(pair)
    }

    /// Put a refresh token on the revocation list.
    ///
    /// An already revoked token is `InvalidToken` like any other bad token;
    /// logout reports the failure and carries on.
    pub fn revoke(&self, refresh: Option<&str>) -> Result<(), AuthzError> {
        self.revoke_at(refresh, Utc::now())
    }

    pub fn revoke_at(&self, refresh: Option<&str>, now: DateTime<Utc>) -> Result<(), AuthzError> {
        let token = refresh.ok_or(AuthzError::MissingToken)?;
        let claims = self.decode_checked(token, TokenType::Refresh, now)?;
        let expires_at = claims.expires_at().ok_or(AuthzError::InvalidToken)?;

        let inserted = self.revocations.revoke(&claims.jti, expires_at)?;
        tracing::info!(sub = %claims.sub, jti = %claims.jti, inserted, "refresh token revoked");
        Ok(())
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthzError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthzError::Signing(e.to_string()))
    }

    /// Signature, structure, type and time window; plus the revocation list
    /// for refresh tokens.
    fn decode_checked(
        &self,
        token: &str,
        expected: TokenType,
        now: DateTime<Utc>,
    ) -> Result<SessionClaims, AuthzError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, ?expected, "token failed to decode");
                AuthzError::InvalidToken
            })?
            .claims;

        if let Err(reason) = validate_claims(&claims, expected, now) {
            tracing::debug!(%reason, ?expected, jti = %claims.jti, "token rejected");
            return Err(AuthzError::InvalidToken);
        }

        if expected == TokenType::Refresh && self.revocations.is_revoked(&claims.jti)? {
            tracing::debug!(jti = %claims.jti, "refresh token is revoked");
            return Err(AuthzError::InvalidToken);
        }

        Ok(claims)
    }
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::fixtures::{Revocations, Users, account};

    const SECRET: &str = "test-secret-test-secret-test-secret!";

    fn service() -> (TokenService, Arc<Users>, Arc<Revocations>) {
        let users = Arc::new(Users::with([account(1, true), account(2, false)]));
        let revocations = Arc::new(Revocations::default());
        let svc = TokenService::new(
            TokenConfig::new(SECRET).with_ttls(300, 3600),
            users.clone(),
            revocations.clone(),
        )
        .unwrap();
        (svc, users, revocations)
    }

    #[test]
    fn issued_access_token_resolves_to_user() {
        let (svc, _, _) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();
        let principal = svc.validate_access(&pair.access).unwrap();
        assert_eq!(principal.user_id(), Some(crm_core::UserId::new(1)));
        assert_eq!(pair.access_max_age, 300);
        assert_eq!(pair.refresh_max_age, 3600);
    }

    #[test]
    fn inactive_user_gets_no_tokens() {
        let (svc, _, _) = service();
        assert_eq!(
            svc.issue_for(&account(2, false)),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn access_validation_ignores_later_deactivation() {
        let (svc, users, _) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();
        users.set_active(1, false);
        assert!(svc.validate_access(&pair.access).is_ok());
    }

    #[test]
    fn access_for_deleted_user_is_user_not_found() {
        let (svc, users, _) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();
        users.remove(1);
        assert_eq!(
            svc.validate_access(&pair.access),
            Err(AuthzError::UserNotFound)
        );
    }

    #[test]
    fn every_bad_token_is_the_same_invalid_token() {
        let (svc, _, _) = service();
        let now = Utc::now();
        let pair = svc.issue_for_at(&account(1, true), now).unwrap();

        // expired
        assert_eq!(
            svc.validate_access_at(&pair.access, now + Duration::seconds(301)),
            Err(AuthzError::InvalidToken)
        );
        // wrong type
        assert_eq!(
            svc.validate_access(&pair.refresh),
            Err(AuthzError::InvalidToken)
        );
        // garbage
        assert_eq!(svc.validate_access("not-a-jwt"), Err(AuthzError::InvalidToken));

        // foreign signature
        let other = TokenService::new(
            TokenConfig::new("another-secret-another-secret-xx"),
            Users::with([account(1, true)]),
            Revocations::default(),
        )
        .unwrap();
        let forged = other.issue_for(&account(1, true)).unwrap();
        assert_eq!(
            svc.validate_access(&forged.access),
            Err(AuthzError::InvalidToken)
        );
    }

    #[test]
    fn rotation_is_single_use() {
        let (svc, _, revocations) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();

        let rotated = svc.rotate(Some(&pair.refresh)).unwrap();
        assert_ne!(rotated.refresh, pair.refresh);
        assert!(svc.validate_access(&rotated.access).is_ok());

        assert_eq!(svc.rotate(Some(&pair.refresh)), Err(AuthzError::InvalidToken));
        assert_eq!(revocations.len(), 1);

        // the new refresh token still works
        assert!(svc.rotate(Some(&rotated.refresh)).is_ok());
    }

    #[test]
    fn rotation_without_token_is_missing_token() {
        let (svc, _, _) = service();
        assert_eq!(svc.rotate(None), Err(AuthzError::MissingToken));
        assert_eq!(svc.revoke(None), Err(AuthzError::MissingToken));
    }

    #[test]
    fn rotation_refuses_deactivated_user() {
        let (svc, users, _) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();
        users.set_active(1, false);
        assert_eq!(svc.rotate(Some(&pair.refresh)), Err(AuthzError::InvalidToken));
    }

    #[test]
    fn revoked_refresh_cannot_rotate_and_revoke_is_idempotent() {
        let (svc, _, _) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();
        svc.revoke(Some(&pair.refresh)).unwrap();
        assert_eq!(svc.rotate(Some(&pair.refresh)), Err(AuthzError::InvalidToken));
        assert_eq!(svc.revoke(Some(&pair.refresh)), Err(AuthzError::InvalidToken));
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let (svc, _, _) = service();
        let pair = svc.issue_for(&account(1, true)).unwrap();
        assert_eq!(svc.rotate(Some(&pair.access)), Err(AuthzError::InvalidToken));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let res = TokenService::new(TokenConfig::new(""), Users::default(), Revocations::default());
        assert!(matches!(res, Err(AuthzError::ConfigurationError(_))));
    }
}
