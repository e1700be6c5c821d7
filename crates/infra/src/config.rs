//! Configuration loading from environment.
//!
//! A `.env` file in the working directory is honoured when present. Unset
//! variables fall back to defaults; set-but-malformed variables are errors.

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-only-insecure-jwt-secret-change-me!!";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is malformed: {reason}")]
    Malformed { var: &'static str, reason: String },

    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Bootstrap superuser created at startup if missing.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed").field("email", &self.email).finish_non_exhaustive()
    }
}

/// Process configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// `Secure` attribute on session cookies.
    pub session_cookie_secure: bool,
    /// Email-confirmation and password-reset token lifetime.
    pub account_token_ttl_secs: i64,
    pub public_base_url: String,
    /// Postgres-backed identity stores when set, in-memory otherwise.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub admin_seed: Option<AdminSeed>,
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("session_cookie_secure", &self.session_cookie_secure)
            .field("account_token_ttl_secs", &self.account_token_ttl_secs)
            .field("public_base_url", &self.public_base_url)
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("bind_addr", &self.bind_addr)
            .field("admin_seed", &self.admin_seed)
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_ttl_secs: 300,
            refresh_token_ttl_secs: 86_400,
            session_cookie_secure: false,
            account_token_ttl_secs: 259_200,
            public_base_url: "http://localhost:8080".to_string(),
            database_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            admin_seed: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment (after reading `.env`, if any).
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set; using the insecure development secret");
                defaults.jwt_secret
            }
        };

        let access_token_ttl_secs =
            positive("ACCESS_TOKEN_TTL_SECS", get("ACCESS_TOKEN_TTL_SECS"), defaults.access_token_ttl_secs)?;
        let refresh_token_ttl_secs =
            positive("REFRESH_TOKEN_TTL_SECS", get("REFRESH_TOKEN_TTL_SECS"), defaults.refresh_token_ttl_secs)?;
        let account_token_ttl_secs =
            positive("ACCOUNT_TOKEN_TTL_SECS", get("ACCOUNT_TOKEN_TTL_SECS"), defaults.account_token_ttl_secs)?;

        let session_cookie_secure = match get("SESSION_COOKIE_SECURE") {
            None => defaults.session_cookie_secure,
            Some(v) => parse_bool(&v).ok_or_else(|| ConfigError::Malformed {
                var: "SESSION_COOKIE_SECURE",
                reason: format!("expected a boolean, got '{v}'"),
            })?,
        };

        let public_base_url = match get("PUBLIC_BASE_URL") {
            None => defaults.public_base_url,
            Some(v) if v.starts_with("http://") || v.starts_with("https://") => {
                v.trim_end_matches('/').to_string()
            }
            Some(v) => {
                return Err(ConfigError::Malformed {
                    var: "PUBLIC_BASE_URL",
                    reason: format!("expected an http(s) URL, got '{v}'"),
                });
            }
        };

        let bind_addr = match get("BIND_ADDR") {
            None => defaults.bind_addr,
            Some(v) => v.parse().map_err(|e| ConfigError::Malformed {
                var: "BIND_ADDR",
                reason: format!("{e}"),
            })?,
        };

        let admin_seed = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed { email, password }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::Incomplete("BOOTSTRAP_ADMIN_EMAIL", "BOOTSTRAP_ADMIN_PASSWORD"));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete("BOOTSTRAP_ADMIN_PASSWORD", "BOOTSTRAP_ADMIN_EMAIL"));
            }
        };

        Ok(Self {
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            session_cookie_secure,
            account_token_ttl_secs,
            public_base_url,
            database_url: get("DATABASE_URL"),
            bind_addr,
            admin_seed,
        })
    }
}

fn positive(var: &'static str, raw: Option<String>, default: i64) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        Ok(v) => Err(ConfigError::Malformed {
            var,
            reason: format!("must be positive, got {v}"),
        }),
        Err(e) => Err(ConfigError::Malformed {
            var,
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.access_token_ttl_secs, 300);
        assert_eq!(cfg.refresh_token_ttl_secs, 86_400);
        assert!(!cfg.session_cookie_secure);
        assert!(cfg.database_url.is_none());
    }

    #[test]
    fn values_are_parsed() {
        let cfg = load(&[
            ("JWT_SECRET", "s3cr3t-s3cr3t-s3cr3t-s3cr3t-s3cr3t"),
            ("ACCESS_TOKEN_TTL_SECS", "60"),
            ("SESSION_COOKIE_SECURE", "true"),
            ("PUBLIC_BASE_URL", "https://crm.example.org/"),
            ("DATABASE_URL", "postgres://crm@localhost/crm"),
            ("BIND_ADDR", "127.0.0.1:9000"),
        ])
        .unwrap();
        assert_eq!(cfg.access_token_ttl_secs, 60);
        assert!(cfg.session_cookie_secure);
        assert_eq!(cfg.public_base_url, "https://crm.example.org");
        assert_eq!(cfg.bind_addr.port(), 9000);
        assert!(cfg.database_url.is_some());
    }

    #[test]
    fn malformed_values_are_errors_not_defaults() {
        assert!(matches!(
            load(&[("ACCESS_TOKEN_TTL_SECS", "five")]),
            Err(ConfigError::Malformed { var: "ACCESS_TOKEN_TTL_SECS", .. })
        ));
        assert!(matches!(
            load(&[("REFRESH_TOKEN_TTL_SECS", "0")]),
            Err(ConfigError::Malformed { .. })
        ));
        assert!(load(&[("SESSION_COOKIE_SECURE", "maybe")]).is_err());
        assert!(load(&[("BIND_ADDR", "nowhere")]).is_err());
        assert!(load(&[("PUBLIC_BASE_URL", "crm.example.org")]).is_err());
    }

    #[test]
    fn admin_seed_needs_both_halves() {
        assert!(matches!(
            load(&[("BOOTSTRAP_ADMIN_EMAIL", "root@example.org")]),
            Err(ConfigError::Incomplete(..))
        ));
        let cfg = load(&[
            ("BOOTSTRAP_ADMIN_EMAIL", "root@example.org"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "changeme-now"),
        ])
        .unwrap();
        assert_eq!(cfg.admin_seed.unwrap().email, "root@example.org");
    }
}
