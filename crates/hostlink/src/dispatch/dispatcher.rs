//! Authorization, resolution and execution of decoded calls.

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::{debug, info, warn};

use super::builtin::REQUEST_PERMISSION;
use super::errors::DispatchError;
use super::params::Params;
use super::request::{ActionCall, requested_version};
use super::response::format_reply;
use super::router::{ActionKind, ActionTable, DISPATCH_TARGET};
use crate::access::{PermissionGate, PermissionPrompt, PermissionStore, PromptOutcome};

/// Who is calling, as established by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    origin: String,
    origin_allowed: bool,
}

impl CallContext {
    /// Context for a caller presenting `origin`; empty when no header was sent.
    #[must_use]
    pub fn new(origin: impl Into<String>, origin_allowed: bool) -> Self {
        Self {
            origin: origin.into(),
            origin_allowed,
        }
    }

    /// The caller's declared origin.
    #[must_use]
    pub fn origin(&self) -> &str {
        self.origin.as_str()
    }

    /// Whether the CORS policy trusts the origin.
    #[must_use]
    pub const fn origin_allowed(&self) -> bool {
        self.origin_allowed
    }
}

/// Owns the action table and the trust state consulted on every call.
pub struct Dispatcher {
    table: ActionTable,
    gate: PermissionGate,
    store: PermissionStore,
    prompt: Box<dyn PermissionPrompt>,
    api_version: u32,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("table", &self.table)
            .field("gate", &self.gate)
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Assembles a dispatcher.
    #[must_use]
    pub fn new(
        table: ActionTable,
        gate: PermissionGate,
        store: PermissionStore,
        prompt: Box<dyn PermissionPrompt>,
        api_version: u32,
    ) -> Self {
        Self {
            table,
            gate,
            store,
            prompt,
            api_version,
        }
    }

    /// Protocol version the gateway reports.
    #[must_use]
    pub const fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Registered actions.
    #[must_use]
    pub const fn table(&self) -> &ActionTable {
        &self.table
    }

    /// Persisted permission decisions.
    #[must_use]
    pub const fn store(&self) -> &PermissionStore {
        &self.store
    }

    pub(crate) const fn store_mut(&mut self) -> &mut PermissionStore {
        &mut self.store
    }

    pub(crate) const fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub(crate) fn confirm(&mut self, origin: &str) -> PromptOutcome {
        info!(target: DISPATCH_TARGET, origin, "awaiting permission decision");
        let outcome = self.prompt.confirm(origin);
        info!(target: DISPATCH_TARGET, origin, ?outcome, "permission decision received");
        outcome
    }

    /// Decodes `value` as a call and returns its formatted reply. Calls that
    /// omit `version` are treated as speaking `fallback_version`.
    pub fn reply(&mut self, value: Value, fallback_version: u32, context: &CallContext) -> Value {
        let version = requested_version(&value).unwrap_or(fallback_version);
        match ActionCall::from_value(value, fallback_version) {
            Ok(call) => self.answer(call, context),
            Err(error) => {
                debug!(target: DISPATCH_TARGET, error = %error, "undecodable call");
                format_reply(version, Err(error))
            }
        }
    }

    /// Runs a decoded call and returns its formatted reply.
    pub fn answer(&mut self, call: ActionCall, context: &CallContext) -> Value {
        debug!(
            target: DISPATCH_TARGET,
            action = %call.action,
            version = call.version,
            origin = context.origin(),
            "request"
        );
        let version = call.version;
        let outcome = self.call(call, context);
        if let Err(error) = &outcome {
            debug!(target: DISPATCH_TARGET, version, error = %error, "call failed");
        }
        let reply = format_reply(version, outcome);
        debug!(target: DISPATCH_TARGET, reply = %reply, "reply");
        reply
    }

    /// Authorizes, resolves and runs a call.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the caller is not authorized, no action
    /// answers to the name at the requested version, or the action fails.
    pub fn call(&mut self, call: ActionCall, context: &CallContext) -> Result<Value, DispatchError> {
        if call.action != REQUEST_PERMISSION {
            self.gate.authorize(
                call.key.as_deref(),
                context.origin(),
                context.origin_allowed(),
            )?;
        }

        let index = self
            .table
            .resolve(&call.action, call.version)
            .ok_or_else(|| DispatchError::unsupported(call.action.as_str()))?;
        let registration = self
            .table
            .get(index)
            .ok_or_else(|| DispatchError::unsupported(call.action.as_str()))?;
        let params = Params::bind(
            registration.name(),
            registration.declared_params(),
            call.params,
        )?;
        let builtin = match registration.kind() {
            ActionKind::Builtin(builtin) => Some(*builtin),
            ActionKind::Host(_) => None,
        };

        match builtin {
            Some(builtin) => self.run_builtin(builtin, &params, call.version, context),
            None => self.run_host(index, &params),
        }
    }

    fn run_host(&mut self, index: usize, params: &Params) -> Result<Value, DispatchError> {
        let Some(ActionKind::Host(handler)) = self.table.get_mut(index).map(|entry| entry.kind_mut())
        else {
            return Err(DispatchError::unsupported(params.action()));
        };
        match panic::catch_unwind(AssertUnwindSafe(|| handler.call(params))) {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => {
                warn!(
                    target: DISPATCH_TARGET,
                    action = params.action(),
                    "action handler panicked"
                );
                Err(DispatchError::HandlerPanicked {
                    action: params.action().to_owned(),
                })
            }
        }
    }
}
