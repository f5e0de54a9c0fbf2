//! Interactive first-contact confirmation.

/// The user's answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Trust the origin from now on.
    Allow,
    /// Refuse this request only.
    Deny,
    /// Refuse and stop asking for this origin.
    DenyAndIgnore,
}

/// Asks the user whether an origin may use the gateway.
///
/// Implementations may block; the gateway thread waits for the answer and no
/// other connection progresses in the meantime.
pub trait PermissionPrompt {
    /// Returns the user's decision for `origin`.
    fn confirm(&mut self, origin: &str) -> PromptOutcome;
}

/// Prompt that always gives the same answer.
///
/// Used by the standalone daemon, which has no user interface to ask.
#[derive(Debug, Clone, Copy)]
pub struct StaticPrompt(pub PromptOutcome);

impl PermissionPrompt for StaticPrompt {
    fn confirm(&mut self, _origin: &str) -> PromptOutcome {
        self.0
    }
}
