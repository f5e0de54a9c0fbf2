//! Error types for action dispatch failures.
//!
//! Every variant renders as a short message without internal detail: the
//! `Display` text is what callers receive in the `error` field of a reply.

use thiserror::Error;

use crate::access::PermissionStoreError;

/// Errors surfaced while decoding, authorizing or running an action call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body was not valid JSON.
    #[error("{message}")]
    MalformedRequest {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The request JSON does not match the call schema.
    #[error("{message}")]
    InvalidStructure { message: String },

    /// No registration answers to the action name at the requested version.
    #[error("unsupported action")]
    UnsupportedAction { action: String },

    /// A secret is configured and the caller did not present it.
    #[error("valid api key must be provided")]
    MissingSecret,

    /// The caller's origin is not trusted.
    #[error("origin '{origin}' is not permitted")]
    OriginDenied { origin: String },

    /// The action rejected its arguments or failed.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The action handler panicked.
    #[error("action '{action}' failed unexpectedly")]
    HandlerPanicked { action: String },

    /// A permission decision could not be persisted.
    #[error("failed to record permission: {0}")]
    PermissionStore(#[from] PermissionStoreError),
}

impl DispatchError {
    pub(crate) fn malformed(error: serde_json::Error) -> Self {
        Self::MalformedRequest {
            message: error.to_string(),
            source: Some(error),
        }
    }

    pub(crate) fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(action: impl Into<String>) -> Self {
        Self::UnsupportedAction {
            action: action.into(),
        }
    }
}

/// Failures raised by an action while binding or using its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// A required parameter was absent.
    #[error("{action}() missing required argument: '{name}'")]
    MissingArgument { action: String, name: String },

    /// The caller supplied a parameter the action does not declare.
    #[error("{action}() got an unexpected keyword argument '{name}'")]
    UnexpectedArgument { action: String, name: String },

    /// A parameter was present but had the wrong shape.
    #[error("{name} has invalid value")]
    InvalidArgument { name: String, message: String },

    /// The action ran and reported a failure.
    #[error("{message}")]
    Failed { message: String },
}

impl ActionError {
    /// Builds a failure carrying `message` back to the caller.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Builds an argument error for `name`.
    pub fn invalid_argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn unsupported_action_hides_the_name() {
        assert_eq!(
            DispatchError::unsupported("deleteEverything").to_string(),
            "unsupported action"
        );
    }

    #[rstest]
    #[case(
        ActionError::MissingArgument { action: "findNotes".into(), name: "query".into() },
        "findNotes() missing required argument: 'query'"
    )]
    #[case(
        ActionError::UnexpectedArgument { action: "version".into(), name: "x".into() },
        "version() got an unexpected keyword argument 'x'"
    )]
    #[case(ActionError::invalid_argument("scopes", "expected a list"), "scopes has invalid value")]
    #[case(ActionError::failed("deck not found"), "deck not found")]
    fn action_errors_render_caller_messages(#[case] error: ActionError, #[case] expected: &str) {
        assert_eq!(DispatchError::from(error).to_string(), expected);
    }
}
