//! Built-in defaults for the gateway configuration surface.

/// Host the gateway binds to unless configured otherwise.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// TCP port the gateway listens on by default.
pub const DEFAULT_BIND_PORT: u16 = 8765;

/// Pending-connection backlog handed to `listen(2)`.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Interval between host ticks, in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 25;

/// Idle time after which a connection that has not completed its request is
/// dropped, in milliseconds.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5_000;

/// Upper bound on the size of a single buffered request frame.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 32 * 1024 * 1024;

/// Current protocol version spoken by the gateway.
pub const DEFAULT_API_VERSION: u32 = 6;

/// Version assumed for requests that do not declare one.
pub const DEFAULT_REQUEST_VERSION: u32 = 4;

/// Origin trusted out of the box. Its presence also enables the
/// local-equivalent origin patterns (loopback addresses, browser extensions).
pub const LOCALHOST_ORIGIN: &str = "http://localhost";

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default bind address as an owned value for serde defaults.
pub fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_owned()
}

/// Default bind port.
pub const fn default_bind_port() -> u16 {
    DEFAULT_BIND_PORT
}

/// Default accept backlog.
pub const fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

/// Default tick interval in milliseconds.
pub const fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

/// Default idle-read timeout in milliseconds.
pub const fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// Default request size limit in bytes.
pub const fn default_max_request_bytes() -> usize {
    DEFAULT_MAX_REQUEST_BYTES
}

/// Default protocol version.
pub const fn default_api_version() -> u32 {
    DEFAULT_API_VERSION
}

/// Default version for requests that omit one.
pub const fn default_request_version() -> u32 {
    DEFAULT_REQUEST_VERSION
}

/// Default CORS allow-list.
pub fn default_cors_origin_list() -> Vec<String> {
    vec![LOCALHOST_ORIGIN.to_owned()]
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
