//! Gateway bootstrap orchestration.

use std::sync::Arc;

use thiserror::Error;

use hostlink_config::{Config, ConfigLoadError};

use crate::access::{
    JsonFilePersistence, MemoryPersistence, PermissionPersistence, PermissionPrompt,
    PermissionStore, PermissionStoreError,
};
use crate::dispatch::ActionTable;
use crate::gateway::Gateway;
use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError};
use crate::transport::ListenerError;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] when a layer fails or the result is invalid.
    fn load(&self) -> Result<Config, ConfigLoadError>;
}

/// Loader that reads process arguments, environment and configuration files.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, ConfigLoadError> {
        Config::load_validated()
    }
}

/// Loader returning a configuration supplied by the embedding host.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, ConfigLoadError> {
        self.config.validate()?;
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: ConfigLoadError,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Saved permission decisions could not be loaded.
    #[error("failed to load permission store: {source}")]
    Permissions {
        /// Underlying persistence error.
        #[source]
        source: PermissionStoreError,
    },
    /// The listening socket could not be bound.
    #[error("failed to start listener: {source}")]
    Listen {
        /// Underlying socket error.
        #[source]
        source: ListenerError,
    },
}

/// Bootstraps the gateway using the supplied collaborators.
///
/// Every failure is reported to `reporter` and returned; none panics, so an
/// embedding host can notify its user and carry on without the gateway.
///
/// # Errors
///
/// Returns [`BootstrapError`] naming the stage that failed.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    actions: ActionTable,
    prompt: Box<dyn PermissionPrompt>,
) -> Result<Gateway, BootstrapError> {
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let config = loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;

    telemetry::initialise(&config).map_err(|source| fail(BootstrapError::Telemetry { source }))?;

    let persistence: Box<dyn PermissionPersistence> = match &config.permission_store_path {
        Some(path) => Box::new(JsonFilePersistence::new(path.clone())),
        None => Box::new(MemoryPersistence::default()),
    };
    let store = PermissionStore::load(persistence, config.ignore_origin_list.iter().cloned())
        .map_err(|source| fail(BootstrapError::Permissions { source }))?;

    let gateway = Gateway::listen(config, actions, store, prompt)
        .map_err(|source| fail(BootstrapError::Listen { source }))?;
    reporter.bootstrap_succeeded(gateway.config(), gateway.local_addr());
    Ok(gateway)
}
