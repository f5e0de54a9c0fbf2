//! Action dispatch for decoded gateway requests.
//!
//! Requests are JSON objects naming an action, the protocol version the
//! caller speaks, named parameters and an optional shared secret:
//!
//! ```json
//! {"action":"multi","version":6,"params":{"actions":[{"action":"version"}]}}
//! ```
//!
//! The dispatcher authorizes the caller, resolves the name against the
//! versioned [`ActionTable`] and formats the outcome for the caller's
//! version:
//!
//! ```json
//! {"result":[{"result":6,"error":null}],"error":null}
//! ```

mod builtin;
mod dispatcher;
mod errors;
mod handler;
mod params;
mod request;
mod response;
mod router;

pub use self::builtin::REQUEST_PERMISSION;
pub use self::dispatcher::{CallContext, Dispatcher};
pub use self::errors::{ActionError, DispatchError};
pub use self::handler::{GatewayHandler, SERVER_NAME};
pub use self::params::Params;
pub use self::request::{ActionCall, requested_version};
pub use self::response::{LEGACY_REPLY_MAX_VERSION, banner, error_envelope, format_reply};
pub use self::router::{
    ActionHandler, ActionRegistration, ActionTable, RegistrationError, VersionAlias,
};
