//! Origin trust decisions.

use std::net::IpAddr;

use url::{Host, Url};

/// Allow-list entry that trusts every origin.
pub const WILDCARD_ORIGIN: &str = "*";

/// Allow-list entry that also trusts loopback and browser-extension origins.
pub const LOCALHOST_ORIGIN: &str = "http://localhost";

const EXTENSION_SCHEMES: [&str; 3] = ["chrome-extension", "moz-extension", "safari-web-extension"];

/// Whether a caller is trusted and which origin to echo back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginDecision {
    allowed: bool,
    echoed_origin: String,
}

impl OriginDecision {
    fn allow(echoed_origin: impl Into<String>) -> Self {
        Self {
            allowed: true,
            echoed_origin: echoed_origin.into(),
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            echoed_origin: LOCALHOST_ORIGIN.to_owned(),
        }
    }

    /// Returns `true` when the origin is trusted.
    #[must_use]
    pub const fn allowed(&self) -> bool {
        self.allowed
    }

    /// Value for the `Access-Control-Allow-Origin` header.
    #[must_use]
    pub fn echoed_origin(&self) -> &str {
        self.echoed_origin.as_str()
    }
}

/// Decides whether `origin` is trusted by `allow_list`.
///
/// A missing `Origin` header marks a non-browser caller on the same machine
/// and is trusted.
#[must_use]
pub fn decide<S: AsRef<str>>(origin: Option<&str>, allow_list: &[S]) -> OriginDecision {
    let listed = |candidate: &str| allow_list.iter().any(|entry| entry.as_ref() == candidate);

    if listed(WILDCARD_ORIGIN) {
        return OriginDecision::allow(WILDCARD_ORIGIN);
    }
    let Some(origin) = origin else {
        return OriginDecision::allow(LOCALHOST_ORIGIN);
    };
    if listed(origin) || (listed(LOCALHOST_ORIGIN) && is_local_equivalent(origin)) {
        return OriginDecision::allow(origin);
    }
    OriginDecision::deny()
}

/// Loopback web origins and browser-extension origins.
fn is_local_equivalent(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };
    let scheme = url.scheme();
    if EXTENSION_SCHEMES.contains(&scheme) {
        return true;
    }
    if scheme != "http" && scheme != "https" {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(address)) => IpAddr::V4(address).is_loopback(),
        Some(Host::Ipv6(address)) => IpAddr::V6(address).is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const LOCAL: &[&str] = &[LOCALHOST_ORIGIN];

    #[rstest]
    fn wildcard_trusts_everyone_and_echoes_wildcard() {
        let decision = decide(Some("http://evil.com"), &["*"]);
        assert!(decision.allowed());
        assert_eq!(decision.echoed_origin(), "*");
    }

    #[rstest]
    fn missing_origin_is_trusted_with_default_echo() {
        let decision = decide(None, &["http://example.com"]);
        assert!(decision.allowed());
        assert_eq!(decision.echoed_origin(), LOCALHOST_ORIGIN);
    }

    #[rstest]
    fn exact_entry_is_echoed() {
        let decision = decide(Some("http://example.com"), &["http://example.com"]);
        assert!(decision.allowed());
        assert_eq!(decision.echoed_origin(), "http://example.com");
    }

    #[rstest]
    fn unknown_origin_is_denied_with_default_echo() {
        let decision = decide(Some("http://evil.com"), &["http://example.com"]);
        assert!(!decision.allowed());
        assert_eq!(decision.echoed_origin(), LOCALHOST_ORIGIN);
    }

    #[rstest]
    #[case("http://127.0.0.1")]
    #[case("https://127.0.0.1")]
    #[case("http://127.0.0.1:3000")]
    #[case("http://localhost:8080")]
    #[case("http://[::1]:5173")]
    #[case("chrome-extension://abcdefghijklmnop")]
    #[case("moz-extension://0a1b2c3d-uuid")]
    #[case("safari-web-extension://ABCDEF")]
    fn local_equivalents_follow_localhost_entry(#[case] origin: &str) {
        let decision = decide(Some(origin), LOCAL);
        assert!(decision.allowed(), "{origin} should be trusted");
        assert_eq!(decision.echoed_origin(), origin);

        assert!(!decide(Some(origin), &["http://example.com"]).allowed());
    }

    #[rstest]
    #[case("http://localhost.evil.com")]
    #[case("http://10.0.0.1")]
    #[case("ftp://127.0.0.1")]
    #[case("null")]
    fn lookalikes_are_not_local(#[case] origin: &str) {
        assert!(!decide(Some(origin), LOCAL).allowed());
    }
}
