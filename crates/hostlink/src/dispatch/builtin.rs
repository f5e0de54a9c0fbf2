//! Actions every gateway provides regardless of the host.

use serde_json::{Value, json};

use super::dispatcher::{CallContext, Dispatcher};
use super::errors::{ActionError, DispatchError};
use super::params::Params;
use crate::access::PromptOutcome;

/// Name of the action that stays reachable for untrusted origins.
pub const REQUEST_PERMISSION: &str = "requestPermission";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Version,
    Multi,
    RequestPermission,
    ApiReflect,
}

impl Builtin {
    pub(crate) const ALL: [Self; 4] = [
        Self::Version,
        Self::Multi,
        Self::RequestPermission,
        Self::ApiReflect,
    ];

    pub(crate) const fn name(self) -> &'static str {
        match self {
            Self::Version => "version",
            Self::Multi => "multi",
            Self::RequestPermission => REQUEST_PERMISSION,
            Self::ApiReflect => "apiReflect",
        }
    }

    pub(crate) const fn params(self) -> &'static [&'static str] {
        match self {
            Self::Version => &[],
            Self::Multi => &["actions"],
            Self::RequestPermission => &["origin", "allowed"],
            Self::ApiReflect => &["scopes", "actions"],
        }
    }
}

impl Dispatcher {
    pub(crate) fn run_builtin(
        &mut self,
        builtin: Builtin,
        params: &Params,
        version: u32,
        context: &CallContext,
    ) -> Result<Value, DispatchError> {
        match builtin {
            Builtin::Version => Ok(Value::from(self.api_version())),
            Builtin::Multi => self.multi(params, version, context),
            Builtin::RequestPermission => self.request_permission(context),
            Builtin::ApiReflect => Ok(self.reflect(params)?),
        }
    }

    /// Runs each sub-call through the full call path, in order.
    fn multi(
        &mut self,
        params: &Params,
        version: u32,
        context: &CallContext,
    ) -> Result<Value, DispatchError> {
        let actions: Vec<Value> = params.required("actions")?;
        let replies = actions
            .into_iter()
            .map(|action| self.reply(action, version, context))
            .collect();
        Ok(Value::Array(replies))
    }

    fn request_permission(&mut self, context: &CallContext) -> Result<Value, DispatchError> {
        let origin = context.origin();
        if context.origin_allowed() {
            return Ok(self.granted());
        }
        if self.store().is_ignored(origin) {
            return Ok(denied());
        }
        match self.confirm(origin) {
            PromptOutcome::Allow => {
                self.store_mut().allow(origin)?;
                Ok(self.granted())
            }
            PromptOutcome::DenyAndIgnore if !origin.is_empty() => {
                self.store_mut().ignore(origin)?;
                Ok(denied())
            }
            PromptOutcome::DenyAndIgnore | PromptOutcome::Deny => Ok(denied()),
        }
    }

    fn granted(&self) -> Value {
        json!({
            "permission": "granted",
            "requireApikey": self.gate().requires_secret(),
            "version": self.api_version(),
        })
    }

    /// Lists registered action names, optionally limited to `actions`.
    fn reflect(&self, params: &Params) -> Result<Value, ActionError> {
        let scopes = match params.get("scopes") {
            Some(Value::Array(scopes)) => scopes,
            _ => {
                return Err(ActionError::invalid_argument(
                    "scopes",
                    "expected a list of scope names",
                ));
            }
        };
        let requested = match params.get("actions") {
            None | Some(Value::Null) => None,
            Some(Value::Array(actions)) => Some(actions),
            Some(_) => {
                return Err(ActionError::invalid_argument(
                    "actions",
                    "expected a list of action names",
                ));
            }
        };

        if !scopes.iter().any(|scope| scope.as_str() == Some("actions")) {
            return Ok(json!({ "scopes": [] }));
        }

        let table = self.table();
        let names: Vec<&str> = match requested {
            Some(actions) => actions
                .iter()
                .filter_map(Value::as_str)
                .filter(|name| table.contains(name))
                .collect(),
            None => {
                let mut names: Vec<&str> = table.names().collect();
                names.sort_unstable();
                names
            }
        };
        Ok(json!({ "scopes": ["actions"], "actions": names }))
    }
}

fn denied() -> Value {
    json!({ "permission": "denied" })
}
