//! Version-dependent reply envelopes.
//!
//! Callers speaking protocol version 4 or older receive the bare result, or
//! `null` when the call failed. Newer callers receive
//! `{"result": ..., "error": ...}` with the result first.

use serde_json::{Value, json};

use super::errors::DispatchError;

/// Highest protocol version that receives bare results.
pub const LEGACY_REPLY_MAX_VERSION: u32 = 4;

/// Reduces a call outcome to the envelope the caller's version expects.
#[must_use]
pub fn format_reply(version: u32, outcome: Result<Value, DispatchError>) -> Value {
    match outcome {
        Ok(result) if version <= LEGACY_REPLY_MAX_VERSION => result,
        Ok(result) => json!({ "result": result, "error": null }),
        Err(_) if version <= LEGACY_REPLY_MAX_VERSION => Value::Null,
        Err(error) => error_envelope(&error.to_string()),
    }
}

/// Envelope reporting `message` with no result.
#[must_use]
pub fn error_envelope(message: &str) -> Value {
    json!({ "result": null, "error": message })
}

/// Plain-text liveness banner, e.g. `hostlink v.6`.
#[must_use]
pub fn banner(server_name: &str, api_version: u32) -> String {
    format!("{server_name} v.{api_version}")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(4, "6")]
    #[case(1, "6")]
    #[case(5, r#"{"result":6,"error":null}"#)]
    #[case(6, r#"{"result":6,"error":null}"#)]
    fn success_shape_depends_on_version(#[case] version: u32, #[case] expected: &str) {
        let reply = format_reply(version, Ok(json!(6)));
        assert_eq!(reply.to_string(), expected);
    }

    #[rstest]
    #[case(4, "null")]
    #[case(6, r#"{"result":null,"error":"unsupported action"}"#)]
    fn failure_shape_depends_on_version(#[case] version: u32, #[case] expected: &str) {
        let reply = format_reply(version, Err(DispatchError::unsupported("nope")));
        assert_eq!(reply.to_string(), expected);
    }

    #[rstest]
    fn banner_names_server_and_version() {
        assert_eq!(banner("hostlink", 6), "hostlink v.6");
    }
}
