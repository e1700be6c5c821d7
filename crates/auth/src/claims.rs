use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crm_core::UserId;

/// Which half of the session pair a token is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Session token claims (transport-agnostic).
///
/// Timestamps are Unix seconds, as in RFC 7519. Every token carries a unique
/// `jti`; only refresh `jti`s are ever written to the revocation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the user id.
    pub sub: String,

    pub token_type: TokenType,

    /// Token identity.
    pub jti: String,

    /// Issued-at timestamp.
    pub iat: i64,

    /// Expiration timestamp.
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(user_id: UserId, token_type: TokenType, issued_at: DateTime<Utc>, ttl_secs: i64) -> Self {
        let iat = issued_at.timestamp();
        Self {
            sub: user_id.to_string(),
            token_type,
            jti: Uuid::now_v7().simple().to_string(),
            iat,
            exp: iat + ttl_secs,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.sub.parse().ok()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("wrong token type")]
    WrongType,
}

/// Deterministically validate decoded claims against the expected token type.
///
/// Signature verification happens before this, in [`crate::token`]. The error
/// kinds exist for logging only; callers outside the token service see a single
/// generic invalid-token failure.
pub fn validate_claims(
    claims: &SessionClaims,
    expected: TokenType,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.token_type != expected {
        return Err(TokenValidationError::WrongType);
    }
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn fresh_claims_validate() {
        let now = Utc::now();
        let claims = SessionClaims::new(UserId::new(3), TokenType::Access, now, 300);
        assert_eq!(claims.user_id(), Some(UserId::new(3)));
        assert_eq!(validate_claims(&claims, TokenType::Access, now), Ok(()));
    }

    #[test]
    fn type_confusion_is_rejected() {
        let now = Utc::now();
        let claims = SessionClaims::new(UserId::new(3), TokenType::Refresh, now, 300);
        assert_eq!(
            validate_claims(&claims, TokenType::Access, now),
            Err(TokenValidationError::WrongType)
        );
    }

    #[test]
    fn expiry_and_future_issuance() {
        let now = Utc::now();
        let claims = SessionClaims::new(UserId::new(1), TokenType::Access, now, 60);
        assert_eq!(
            validate_claims(&claims, TokenType::Access, now + Duration::seconds(61)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, TokenType::Access, now - Duration::seconds(5)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn every_token_gets_a_distinct_jti() {
        let now = Utc::now();
        let a = SessionClaims::new(UserId::new(1), TokenType::Refresh, now, 60);
        let b = SessionClaims::new(UserId::new(1), TokenType::Refresh, now, 60);
        assert_ne!(a.jti, b.jti);
    }
}
