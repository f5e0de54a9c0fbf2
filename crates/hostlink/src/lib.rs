//! Local JSON action gateway for desktop applications.
//!
//! `hostlink` exposes a host application's operations as JSON actions on a
//! loopback TCP socket so browser extensions and scripts can drive the
//! application without modifying it. The gateway is single-threaded and
//! cooperative: the host calls [`Gateway::advance`] from its own periodic
//! timer and each call does a bounded amount of non-blocking work per
//! connection.
//!
//! A request travels through:
//!
//! 1. the [`transport`] layer, which accepts connections, frames the request
//!    line, headers and `Content-Length` body, and writes the reply;
//! 2. the [`access`] layer, which decides whether the caller's origin is
//!    trusted, checks the shared secret and runs the interactive
//!    `requestPermission` flow;
//! 3. the [`dispatch`] layer, which resolves the action name for the caller's
//!    protocol version and formats the outcome as a bare value (version 4 and
//!    older) or a `{"result", "error"}` envelope.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use hostlink::access::{PromptOutcome, StaticPrompt};
//! use hostlink::dispatch::{ActionRegistration, ActionTable};
//! use hostlink::{StaticConfigLoader, StructuredHealthReporter, bootstrap_with};
//! use hostlink_config::Config;
//! use serde_json::json;
//!
//! let actions = ActionTable::with_builtins()
//!     .with(ActionRegistration::new("deckNames", |_| Ok(json!(["Default"]))))
//!     .expect("unique action names");
//! let mut gateway = bootstrap_with(
//!     &StaticConfigLoader::new(Config::default()),
//!     Arc::new(StructuredHealthReporter::new()),
//!     actions,
//!     Box::new(StaticPrompt(PromptOutcome::Deny)),
//! )
//! .expect("gateway should start");
//!
//! loop {
//!     gateway.advance();
//!     std::thread::sleep(Duration::from_millis(25));
//! }
//! ```

pub mod access;
mod bootstrap;
pub mod dispatch;
mod gateway;
mod health;
pub mod runner;
pub mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use gateway::Gateway;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use telemetry::{SubscriberOwner, TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
