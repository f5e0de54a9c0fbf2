//! Log output for the gateway.
//!
//! The gateway installs a subscriber only when the process has none. A host
//! that already routes `tracing` events keeps its own subscriber and the
//! gateway's events flow into it unchanged.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use hostlink_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static SUBSCRIBER_OWNER: OnceCell<SubscriberOwner> = OnceCell::new();

/// Who installed the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberOwner {
    /// The gateway installed its own subscriber from [`Config`].
    Gateway,
    /// A subscriber was already installed by the embedding host.
    Host,
}

/// Handle returned once log output is settled.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryHandle {
    owner: SubscriberOwner,
}

impl TelemetryHandle {
    /// Reports which party owns the global subscriber.
    #[must_use]
    pub const fn owner(self) -> SubscriberOwner {
        self.owner
    }
}

/// Errors encountered while configuring log output.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// The rejected expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
}

/// Settles log output for the process.
///
/// The first call either installs the gateway's subscriber or, when the host
/// installed one already, leaves it in place. Later calls report the same
/// outcome.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `log_filter` does not parse and
/// the gateway would have installed its own subscriber.
///
/// # Examples
///
/// ```rust
/// use hostlink::telemetry;
/// use hostlink_config::Config;
///
/// # fn main() -> Result<(), telemetry::TelemetryError> {
/// let config = Config::default();
/// let first = telemetry::initialise(&config)?;
/// let second = telemetry::initialise(&config)?;
/// assert_eq!(first.owner(), second.owner());
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    SUBSCRIBER_OWNER
        .get_or_try_init(|| install(config))
        .map(|owner| TelemetryHandle { owner: *owner })
}

fn install(config: &Config) -> Result<SubscriberOwner, TelemetryError> {
    if tracing::dispatcher::has_been_set() {
        return Ok(host_owned());
    }

    let filter =
        EnvFilter::try_new(config.log_filter()).map_err(|error| TelemetryError::Filter {
            filter: config.log_filter().to_owned(),
            message: error.to_string(),
        })?;
    let subscriber = Registry::default()
        .with(output_layer(config.log_format()))
        .with(filter);

    match tracing::subscriber::set_global_default(subscriber) {
        Ok(()) => Ok(SubscriberOwner::Gateway),
        // Lost a race with the host installing its subscriber.
        Err(_) => Ok(host_owned()),
    }
}

fn host_owned() -> SubscriberOwner {
    debug!(
        target: TELEMETRY_TARGET,
        "global subscriber already installed; keeping the host's log output"
    );
    SubscriberOwner::Host
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339())
        .with_target(true);
    match format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}
