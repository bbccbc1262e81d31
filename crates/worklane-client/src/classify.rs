//! Response classification
//!
//! Pure functions that map a failed response (or a transport error) onto
//! the small set of failure classes the rest of the pipeline dispatches on.
//! Nothing here retries, refreshes, or logs; callers decide what a class
//! means for them.

use reqwest::header::{HeaderMap, RETRY_AFTER};

/// Body fragments on a 401 that mean the account needs verification, not a
/// token refresh. Matched case-insensitively against the response body.
const VERIFICATION_PATTERNS: &[&str] = &[
    "verification required",
    "verify your email",
    "account not verified",
    "email not confirmed",
];

/// Failure class of a request that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// No response was received at all.
    Network,
    /// 401. When `verification_required` is set the server asked for
    /// account verification and a token refresh cannot help.
    Unauthenticated { verification_required: bool },
    /// 403: authenticated but not allowed.
    Forbidden,
    /// 429. `retry_after` is the server's hint in seconds when it sent
    /// one that parses.
    RateLimited { retry_after: Option<u64> },
    /// Every other non-success status.
    Other,
}

/// Classify a response that came back with a non-success status.
pub fn classify_response(status: u16, headers: &HeaderMap, body: &str) -> FailureClass {
    match status {
        401 => FailureClass::Unauthenticated {
            verification_required: is_verification_hint(body),
        },
        403 => FailureClass::Forbidden,
        429 => FailureClass::RateLimited {
            retry_after: parse_retry_after(headers),
        },
        _ => FailureClass::Other,
    }
}

/// Classify a transport-level failure. Anything reqwest reports before a
/// response arrives (DNS, connect, TLS, timeout) is a network failure.
pub fn classify_transport(_err: &reqwest::Error) -> FailureClass {
    FailureClass::Network
}

/// Whether a 401 body carries one of the account-verification hints.
pub fn is_verification_hint(body: &str) -> bool {
    let lower = body.to_lowercase();
    VERIFICATION_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Integer-seconds form of `Retry-After`. The HTTP-date form is rare on
/// this API and is treated as no hint.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_retry_after(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn plain_401_is_unauthenticated() {
        let class = classify_response(401, &HeaderMap::new(), r#"{"error":"token expired"}"#);
        assert_eq!(
            class,
            FailureClass::Unauthenticated { verification_required: false }
        );
    }

    #[test]
    fn verification_hints_are_detected() {
        for body in [
            r#"{"error":"Email verification required"}"#,
            "Please verify your email to continue",
            r#"{"message":"ACCOUNT NOT VERIFIED"}"#,
            "email not confirmed yet",
        ] {
            let class = classify_response(401, &HeaderMap::new(), body);
            assert_eq!(
                class,
                FailureClass::Unauthenticated { verification_required: true },
                "{body}"
            );
        }
    }

    #[test]
    fn verification_hints_only_apply_to_401() {
        let class = classify_response(403, &HeaderMap::new(), "verification required");
        assert_eq!(class, FailureClass::Forbidden);
    }

    #[test]
    fn forbidden_is_its_own_class() {
        assert_eq!(
            classify_response(403, &HeaderMap::new(), r#"{"error":"admins only"}"#),
            FailureClass::Forbidden
        );
    }

    #[test]
    fn rate_limited_with_integer_hint() {
        let headers = headers_with_retry_after("30");
        assert_eq!(
            classify_response(429, &headers, "slow down"),
            FailureClass::RateLimited { retry_after: Some(30) }
        );
    }

    #[test]
    fn rate_limited_hint_tolerates_whitespace() {
        let headers = headers_with_retry_after(" 7 ");
        assert_eq!(
            classify_response(429, &headers, ""),
            FailureClass::RateLimited { retry_after: Some(7) }
        );
    }

    #[test]
    fn rate_limited_without_header_has_no_hint() {
        assert_eq!(
            classify_response(429, &HeaderMap::new(), "slow down"),
            FailureClass::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn http_date_retry_after_is_no_hint() {
        let headers = headers_with_retry_after("Fri, 31 Dec 1999 23:59:59 GMT");
        assert_eq!(
            classify_response(429, &headers, ""),
            FailureClass::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn other_statuses_are_other() {
        for status in [400u16, 404, 409, 418, 500, 502, 503] {
            assert_eq!(
                classify_response(status, &HeaderMap::new(), "body"),
                FailureClass::Other,
                "status {status}"
            );
        }
    }

    #[test]
    fn hint_matching_is_case_insensitive() {
        assert!(is_verification_hint("VERIFICATION REQUIRED"));
        assert!(is_verification_hint("Verify Your Email"));
        assert!(!is_verification_hint(r#"{"error":"token expired"}"#));
        assert!(!is_verification_hint(""));
    }
}
