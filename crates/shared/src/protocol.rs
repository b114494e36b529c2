//! STOMP header names, endpoint naming and small protocol helpers.

use std::net::IpAddr;

/// STOMP header names
pub const HEADER_ACCEPT_VERSION: &str = "accept-version";
pub const HEADER_HOST: &str = "host";
pub const HEADER_HEART_BEAT: &str = "heart-beat";
pub const HEADER_VERSION: &str = "version";
pub const HEADER_DESTINATION: &str = "destination";
pub const HEADER_ID: &str = "id";
pub const HEADER_SUBSCRIPTION: &str = "subscription";
pub const HEADER_MESSAGE: &str = "message";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_CONTENT_LENGTH: &str = "content-length";
pub const HEADER_RECEIPT: &str = "receipt";
pub const HEADER_RECEIPT_ID: &str = "receipt-id";

/// Authentication headers carried on CONNECT
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_USER_ID: &str = "user-id";

/// Versions offered in the CONNECT frame, most preferred first.
pub const ACCEPT_VERSIONS: &str = "1.2,1.1,1.0";

/// Heart-beats are application level (`/app/ping`), so none are negotiated.
pub const NO_HEART_BEAT: &str = "0,0";

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Build the `Authorization` header value for a bearer token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Single words that mark an ERROR frame (or rejected upgrade) as an authentication failure.
const AUTH_FAILURE_WORDS: &[&str] = &[
    "401",
    "403",
    "unauthorized",
    "unauthenticated",
    "forbidden",
    "authenticationexception",
];

/// Adjacent word pairs with the same meaning.
const AUTH_FAILURE_PHRASES: &[[&str; 2]] = &[
    ["authentication", "failed"],
    ["authentication", "required"],
    ["bad", "credentials"],
    ["invalid", "token"],
    ["invalid", "jwt"],
    ["token", "expired"],
    ["expired", "token"],
    ["jwt", "expired"],
];

/// Decide whether an error message reports rejected credentials.
///
/// Matches whole words only, so `40312 bytes` is not a 401.
pub fn is_auth_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().any(|w| AUTH_FAILURE_WORDS.contains(w))
        || words
            .windows(2)
            .any(|pair| AUTH_FAILURE_PHRASES.iter().any(|p| p[0] == pair[0] && p[1] == pair[1]))
}

/// Check if a host (optionally with a port) is a loopback or private-network address.
pub fn is_local_address(host: &str) -> bool {
    let host = strip_port(host);
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            ip.is_loopback() || ip.is_private() || ip.is_unspecified() || ip.is_link_local()
        }
        Ok(IpAddr::V6(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Err(_) => false,
    }
}

fn strip_port(host: &str) -> &str {
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }
    if let Some(bracketed) = host.strip_prefix('[') {
        return bracketed.split(']').next().unwrap_or(bracketed);
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_auth_failures() {
        assert!(is_auth_failure("401 Unauthorized"));
        assert!(is_auth_failure("Failed to send message: JWT expired at 2024-01-01"));
        assert!(is_auth_failure("AuthenticationException: bad credentials"));
        assert!(is_auth_failure("Authentication failed"));
        assert!(is_auth_failure("403"));
        assert!(!is_auth_failure("Broker unavailable"));
        assert!(!is_auth_failure("Session closed"));
    }

    #[test]
    fn numbers_inside_words_are_not_status_codes() {
        assert!(!is_auth_failure("Message too large: 40312 bytes exceeds limit"));
        assert!(!is_auth_failure("error 4010 from upstream"));
        assert!(!is_auth_failure("queue 1403 full"));
        assert!(!is_auth_failure("authentication service slow, retry"));
        assert!(!is_auth_failure("token refreshed"));
    }

    #[test]
    fn local_addresses() {
        assert!(is_local_address("localhost:8080"));
        assert!(is_local_address("192.168.1.4"));
        assert!(is_local_address("172.20.0.3:8080"));
        assert!(is_local_address("[::1]:8080"));
        assert!(is_local_address("::1"));
        assert!(!is_local_address("hearth.social"));
        assert!(!is_local_address("172.32.0.1"));
        assert!(!is_local_address("10.example.com"));
    }
}
