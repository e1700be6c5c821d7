//! Cookie header parsing and `Set-Cookie` construction for the session pair
//! and the CSRF cookie.

use axum::http::{HeaderMap, HeaderValue, header};

use crm_auth::TokenPair;
use crm_auth::csrf::{ACCESS_TOKEN_COOKIE, CSRF_COOKIE, REFRESH_TOKEN_COOKIE};

/// Attributes shared by every cookie this API writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CookieSettings {
    pub secure: bool,
}

impl CookieSettings {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    fn same_site(&self) -> &'static str {
        // Browsers drop SameSite=None cookies that are not Secure.
        if self.secure { "None" } else { "Lax" }
    }

    pub fn build(&self, name: &str, value: &str, max_age: i64, http_only: bool) -> String {
        let mut cookie = format!(
            "{name}={value}; Path=/; Max-Age={max_age}; SameSite={}",
            self.same_site()
        );
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// `access_token` + `refresh_token` (HttpOnly) and a script-readable `csrftoken`.
    pub fn session(&self, pair: &TokenPair, csrf_token: &str) -> [String; 3] {
        [
            self.build(ACCESS_TOKEN_COOKIE, &pair.access, pair.access_max_age, true),
            self.build(REFRESH_TOKEN_COOKIE, &pair.refresh, pair.refresh_max_age, true),
            self.build(CSRF_COOKIE, csrf_token, pair.refresh_max_age, false),
        ]
    }

    pub fn cleared_session(&self) -> [String; 2] {
        [
            self.build(ACCESS_TOKEN_COOKIE, "", 0, true),
            self.build(REFRESH_TOKEN_COOKIE, "", 0, true),
        ]
    }
}

/// Value of cookie `name` across all `Cookie` headers. Empty values count as absent.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (k, v) = pair.trim().split_once('=')?;
            (k.trim() == name).then(|| v.trim())
        })
        .filter(|v| !v.is_empty())
}

pub fn append_set_cookies<I>(headers: &mut HeaderMap, cookies: I)
where
    I: IntoIterator<Item = String>,
{
    for cookie in cookies {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(_) => tracing::error!("refusing to emit a cookie with invalid header bytes"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access: "acc".into(),
            refresh: "ref".into(),
            access_max_age: 300,
            refresh_max_age: 86_400,
        }
    }

    #[test]
    fn reads_named_cookie_among_several_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; csrftoken=abc"));
        headers.append(header::COOKIE, HeaderValue::from_static("access_token=tok"));

        assert_eq!(read_cookie(&headers, "csrftoken"), Some("abc"));
        assert_eq!(read_cookie(&headers, "access_token"), Some("tok"));
        assert_eq!(read_cookie(&headers, "refresh_token"), None);
    }

    #[test]
    fn empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("access_token="));
        assert_eq!(read_cookie(&headers, "access_token"), None);
    }

    #[test]
    fn session_cookie_attributes() {
        let [access, refresh, csrf] = CookieSettings::new(false).session(&pair(), "c");
        assert_eq!(access, "access_token=acc; Path=/; Max-Age=300; SameSite=Lax; HttpOnly");
        assert!(refresh.contains("Max-Age=86400") && refresh.contains("HttpOnly"));
        assert!(!csrf.contains("HttpOnly"));

        let [access, ..] = CookieSettings::new(true).session(&pair(), "c");
        assert!(access.ends_with("SameSite=None; HttpOnly; Secure"));
    }

    #[test]
    fn clearing_expires_immediately() {
        for cookie in CookieSettings::default().cleared_session() {
            assert!(cookie.contains("=; Path=/; Max-Age=0"));
        }
    }
}
