//! Versioned action registry.
//!
//! Each registration carries its current name plus a list of
//! `(threshold, name)` aliases. At protocol version `v` a registration answers
//! to the alias with the highest threshold not above `v`; when no alias applies
//! it answers to its own name, provided `v` is at least its `since` version.
//! Among aliases sharing a threshold the one registered last wins.
//!
//! Names never cross registrations: an alias may repeat its own action's
//! name, but no name or alias may equal another registration's name or alias.

use serde_json::Value;
use thiserror::Error;

use super::builtin::Builtin;
use super::errors::ActionError;
use super::params::Params;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// A host operation callable through the gateway.
pub trait ActionHandler {
    /// Runs the action with its bound parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the parameters are unusable or the
    /// operation fails; the message is reported to the caller.
    fn call(&mut self, params: &Params) -> Result<Value, ActionError>;
}

impl<F> ActionHandler for F
where
    F: FnMut(&Params) -> Result<Value, ActionError>,
{
    fn call(&mut self, params: &Params) -> Result<Value, ActionError> {
        self(params)
    }
}

/// An alternate name an action answers to from a protocol version onwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionAlias {
    threshold: u32,
    name: String,
}

impl VersionAlias {
    /// Lowest protocol version at which the alias applies.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// The alias name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

pub(crate) enum ActionKind {
    Builtin(Builtin),
    Host(Box<dyn ActionHandler>),
}

/// One entry of the action table.
pub struct ActionRegistration {
    name: String,
    params: Vec<String>,
    aliases: Vec<VersionAlias>,
    since: u32,
    kind: ActionKind,
}

impl std::fmt::Debug for ActionRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistration")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("aliases", &self.aliases)
            .field("since", &self.since)
            .finish_non_exhaustive()
    }
}

impl ActionRegistration {
    /// Registers a closure under `name`.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: FnMut(&Params) -> Result<Value, ActionError> + 'static,
    {
        Self::with_handler(name, handler)
    }

    /// Registers any [`ActionHandler`] under `name`.
    pub fn with_handler(name: impl Into<String>, handler: impl ActionHandler + 'static) -> Self {
        Self::from_kind(name, ActionKind::Host(Box::new(handler)))
    }

    pub(crate) fn builtin(builtin: Builtin) -> Self {
        Self::from_kind(builtin.name(), ActionKind::Builtin(builtin))
            .params(builtin.params().iter().copied())
    }

    fn from_kind(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            aliases: Vec::new(),
            since: 0,
            kind,
        }
    }

    /// Declares the parameter names the action accepts.
    #[must_use]
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Makes the action answer to `name` from protocol version `threshold`.
    #[must_use]
    pub fn alias(mut self, threshold: u32, name: impl Into<String>) -> Self {
        self.aliases.push(VersionAlias {
            threshold,
            name: name.into(),
        });
        self
    }

    /// Lowest protocol version at which the action's own name is callable
    /// when none of its aliases apply.
    #[must_use]
    pub const fn since(mut self, version: u32) -> Self {
        self.since = version;
        self
    }

    /// Current name of the action.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Declared parameter names.
    #[must_use]
    pub fn declared_params(&self) -> &[String] {
        self.params.as_slice()
    }

    /// Registered aliases, in registration order.
    #[must_use]
    pub fn aliases(&self) -> &[VersionAlias] {
        self.aliases.as_slice()
    }

    /// Name the action answers to at `version`, if any.
    #[must_use]
    pub fn name_at(&self, version: u32) -> Option<&str> {
        let mut best: Option<&VersionAlias> = None;
        for alias in &self.aliases {
            if alias.threshold <= version
                && best.is_none_or(|current| alias.threshold >= current.threshold)
            {
                best = Some(alias);
            }
        }
        match best {
            Some(alias) => Some(alias.name()),
            None if version >= self.since => Some(self.name()),
            None => None,
        }
    }

    /// Own name followed by every alias name.
    fn answer_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name()).chain(self.aliases.iter().map(VersionAlias::name))
    }

    pub(crate) const fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub(crate) const fn kind_mut(&mut self) -> &mut ActionKind {
        &mut self.kind
    }
}

/// Errors raised while building an action table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Another registration already uses the name.
    #[error("action '{name}' is already registered")]
    Duplicate {
        /// The contested action name.
        name: String,
    },
    /// A name or alias of the new registration is claimed by another action.
    #[error("name '{name}' of action '{action}' is already used by action '{owner}'")]
    NameTaken {
        /// The contested name.
        name: String,
        /// Action being registered.
        action: String,
        /// Registered action already answering to the name.
        owner: String,
    },
}

/// Registrations in the order they were added.
#[derive(Debug, Default)]
pub struct ActionTable {
    registrations: Vec<ActionRegistration>,
}

impl ActionTable {
    /// Empty table without built-in actions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with `version`, `multi`, `requestPermission` and
    /// `apiReflect`.
    #[must_use]
    pub fn with_builtins() -> Self {
        Self {
            registrations: Builtin::ALL
                .iter()
                .copied()
                .map(ActionRegistration::builtin)
                .collect(),
        }
    }

    /// Adds a registration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::Duplicate`] when the name is taken and
    /// [`RegistrationError::NameTaken`] when an alias collides with another
    /// action's names.
    pub fn register(&mut self, registration: ActionRegistration) -> Result<(), RegistrationError> {
        if self.contains(registration.name()) {
            return Err(RegistrationError::Duplicate {
                name: registration.name,
            });
        }
        for name in registration.answer_names() {
            if let Some(owner) = self
                .registrations
                .iter()
                .find(|entry| entry.answer_names().any(|taken| taken == name))
            {
                return Err(RegistrationError::NameTaken {
                    name: name.to_owned(),
                    action: registration.name().to_owned(),
                    owner: owner.name().to_owned(),
                });
            }
        }
        self.registrations.push(registration);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn with(mut self, registration: ActionRegistration) -> Result<Self, RegistrationError> {
        self.register(registration)?;
        Ok(self)
    }

    /// Returns `true` when an action is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.registrations.iter().any(|entry| entry.name == name)
    }

    /// Current names of every registered action, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.registrations.iter().map(ActionRegistration::name)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Finds the registration answering to `action` at `version`.
    #[must_use]
    pub fn resolve(&self, action: &str, version: u32) -> Option<usize> {
        self.registrations
            .iter()
            .position(|entry| entry.name_at(version) == Some(action))
    }

    pub(crate) fn get(&self, index: usize) -> Option<&ActionRegistration> {
        self.registrations.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut ActionRegistration> {
        self.registrations.get_mut(index)
    }
}
