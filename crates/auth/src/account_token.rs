//! Stateless one-time tokens for email confirmation and password reset.
//!
//! Format: `{issued_at_base36}-{hmac_sha256_hex}`. The MAC covers the user id,
//! the current password hash, the active flag and the issue time, so activating
//! the account or changing the password invalidates every outstanding token.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::authorize::AuthzError;
use crate::user::UserAccount;

type HmacSha256 = Hmac<Sha256>;

/// Key purpose; tokens minted for one purpose never verify for another.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccountTokenPurpose {
    ConfirmEmail,
    PasswordReset,
}

impl AccountTokenPurpose {
    fn salt(self) -> &'static str {
        match self {
            AccountTokenPurpose::ConfirmEmail => "crm.accounts.confirm-email",
            AccountTokenPurpose::PasswordReset => "crm.accounts.password-reset",
        }
    }
}

#[derive(Clone)]
pub struct AccountTokenGenerator {
    keyed: HmacSha256,
    ttl_secs: i64,
}

impl AccountTokenGenerator {
    pub fn new(secret: impl AsRef<[u8]>, ttl_secs: i64) -> Result<Self, AuthzError> {
        let keyed = HmacSha256::new_from_slice(secret.as_ref())
            .map_err(|e| AuthzError::ConfigurationError(format!("account token key: {e}")))?;
        Ok(Self { keyed, ttl_secs })
    }

    pub fn make_token(&self, purpose: AccountTokenPurpose, user: &UserAccount) -> String {
        self.make_token_at(purpose, user, Utc::now())
    }

    pub fn make_token_at(
        &self,
        purpose: AccountTokenPurpose,
        user: &UserAccount,
        now: DateTime<Utc>,
    ) -> String {
        let ts = now.timestamp().max(0) as u64;
        let mac = self.mac(purpose, user, ts).finalize().into_bytes();
        format!("{}-{}", to_base36(ts), hex::encode(mac))
    }

    pub fn check_token(&self, purpose: AccountTokenPurpose, user: &UserAccount, token: &str) -> bool {
        self.check_token_at(purpose, user, token, Utc::now())
    }

    pub fn check_token_at(
        &self,
        purpose: AccountTokenPurpose,
        user: &UserAccount,
        token: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some((ts_part, mac_part)) = token.split_once('-') else {
            return false;
        };
        let Some(ts) = from_base36(ts_part) else {
            return false;
        };
        let Ok(tag) = hex::decode(mac_part) else {
            return false;
        };

        let age = now.timestamp() - ts as i64;
        if age < 0 || age > self.ttl_secs {
            return false;
        }

        self.mac(purpose, user, ts).verify_slice(&tag).is_ok()
    }

    fn mac(&self, purpose: AccountTokenPurpose, user: &UserAccount, ts: u64) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(purpose.salt().as_bytes());
        mac.update(b"\0");
        mac.update(user.id.to_string().as_bytes());
        mac.update(b"\0");
        mac.update(user.password_hash.as_bytes());
        mac.update(b"\0");
        mac.update(if user.is_active { b"1" } else { b"0" });
        mac.update(b"\0");
        mac.update(ts.to_string().as_bytes());
        mac
    }
}

impl core::fmt::Debug for AccountTokenGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AccountTokenGenerator")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 13 {
        return None;
    }
    u64::from_str_radix(s, 36).ok()
}
