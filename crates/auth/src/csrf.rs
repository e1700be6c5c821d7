//! Double-submit CSRF primitives and session cookie names.

use rand::RngCore;

use crate::authorize::AuthzError;
use crate::policy::RequestSafety;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";
pub const CSRF_COOKIE: &str = "csrftoken";

/// Accepted request headers carrying the echoed CSRF value, in lookup order.
pub const CSRF_HEADERS: [&str; 2] = ["X-CSRFToken", "X-CSRF-Token"];

/// Fixed rejection body.
pub const CSRF_FAILURE_DETAIL: &str = "CSRF validation failed.";

const CSRF_TOKEN_BYTES: usize = 32;

/// 256 bits from the OS-seeded thread RNG, hex encoded.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Only unsafe requests that ride a session cookie are checked. Bearer
/// clients without the cookie are exempt.
pub fn csrf_required(safety: RequestSafety, has_session_cookie: bool) -> bool {
    !safety.is_safe() && has_session_cookie
}

/// Cookie and header must both be present, non-empty and byte-equal.
pub fn verify_double_submit(cookie: Option<&str>, header: Option<&str>) -> Result<(), AuthzError> {
    match (cookie, header) {
        (Some(c), Some(h)) if !c.is_empty() && constant_time_eq(c.as_bytes(), h.as_bytes()) => Ok(()),
        _ => Err(AuthzError::CsrfValidationFailed),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = generate_csrf_token();
        let b = generate_csrf_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn only_unsafe_session_requests_are_checked() {
        assert!(csrf_required(RequestSafety::Unsafe, true));
        assert!(!csrf_required(RequestSafety::Unsafe, false));
        assert!(!csrf_required(RequestSafety::Safe, true));
    }

    #[test]
    fn double_submit_needs_equal_values() {
        assert_eq!(verify_double_submit(Some("abc"), Some("abc")), Ok(()));
        for (c, h) in [
            (Some("abc"), Some("abd")),
            (Some("abc"), None),
            (None, Some("abc")),
            (None, None),
            (Some(""), Some("")),
            (Some("abc"), Some("abcd")),
        ] {
            assert_eq!(
                verify_double_submit(c, h),
                Err(AuthzError::CsrfValidationFailed),
                "{c:?} / {h:?}"
            );
        }
    }
}
