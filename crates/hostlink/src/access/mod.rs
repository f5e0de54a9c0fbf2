//! Caller trust: CORS decisions, the authorization gate and the persisted
//! permission lists behind the interactive `requestPermission` flow.

mod cors;
mod gate;
mod prompt;
mod store;

pub use self::cors::{LOCALHOST_ORIGIN, OriginDecision, WILDCARD_ORIGIN, decide};
pub use self::gate::PermissionGate;
pub use self::prompt::{PermissionPrompt, PromptOutcome, StaticPrompt};
pub use self::store::{
    JsonFilePersistence, MemoryPersistence, PermissionLists, PermissionPersistence,
    PermissionStore, PermissionStoreError,
};

const ACCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::access");
