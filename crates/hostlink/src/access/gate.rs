//! Authorization boundary applied before action lookup.

use crate::dispatch::DispatchError;

/// Checks callers against the configured shared secret and origin trust.
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    secret: Option<String>,
}

impl PermissionGate {
    /// Builds a gate; blank secrets are treated as unset.
    #[must_use]
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            secret: secret.filter(|value| !value.is_empty()).map(str::to_owned),
        }
    }

    /// Returns `true` when callers must present the shared secret.
    #[must_use]
    pub const fn requires_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Admits a call when the origin is trusted and, if a secret is
    /// configured, the caller presented it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::OriginDenied`] or
    /// [`DispatchError::MissingSecret`] when the call must not proceed.
    pub fn authorize(
        &self,
        key: Option<&str>,
        origin: &str,
        origin_allowed: bool,
    ) -> Result<(), DispatchError> {
        if !origin_allowed {
            return Err(DispatchError::OriginDenied {
                origin: origin.to_owned(),
            });
        }
        match self.secret.as_deref() {
            Some(secret) if key != Some(secret) => Err(DispatchError::MissingSecret),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, None, true, true)]
    #[case(None, Some("anything"), true, true)]
    #[case(None, None, false, false)]
    #[case(Some("s3cret"), Some("s3cret"), true, true)]
    #[case(Some("s3cret"), Some("wrong"), true, false)]
    #[case(Some("s3cret"), None, true, false)]
    #[case(Some("s3cret"), Some("s3cret"), false, false)]
    #[case(Some(""), None, true, true)]
    fn authorizes_by_origin_and_secret(
        #[case] secret: Option<&str>,
        #[case] key: Option<&str>,
        #[case] origin_allowed: bool,
        #[case] expected: bool,
    ) {
        let gate = PermissionGate::new(secret);
        let outcome = gate.authorize(key, "http://localhost", origin_allowed);
        assert_eq!(outcome.is_ok(), expected, "{outcome:?}");
    }

    #[rstest]
    fn wrong_secret_reports_missing_key_message() {
        let gate = PermissionGate::new(Some("s3cret"));
        let error = gate
            .authorize(Some("nope"), "http://localhost", true)
            .expect_err("wrong key should fail");
        assert_eq!(error.to_string(), "valid api key must be provided");
    }
}
