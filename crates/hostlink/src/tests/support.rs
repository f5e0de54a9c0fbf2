//! Loopback helpers shared by the gateway test suites.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use hostlink_config::Config;

use crate::Gateway;
use crate::access::{PermissionPrompt, PermissionStore, PromptOutcome, StaticPrompt};
use crate::dispatch::{ActionError, ActionRegistration, ActionTable, Params};

/// Configuration bound to an ephemeral loopback port.
pub(crate) fn loopback_config() -> Config {
    Config {
        bind_port: 0,
        ..Config::default()
    }
}

/// Built-ins plus a couple of host actions.
pub(crate) fn host_actions() -> ActionTable {
    ActionTable::with_builtins()
        .with(ActionRegistration::new("deckNames", |_: &Params| {
            Ok(serde_json::json!(["Default", "Japanese"]))
        }))
        .expect("register deckNames")
        .with(
            ActionRegistration::new("findCards", |params: &Params| {
                let query: String = params.required("query")?;
                if query.is_empty() {
                    return Err(ActionError::failed("query must not be empty"));
                }
                Ok(serde_json::json!([1, 2, 3]))
            })
            .params(["query"])
            .alias(1, "findCardsLegacy")
            .alias(5, "findCards"),
        )
        .expect("register findCards")
}

pub(crate) fn start_gateway(config: Config, prompt: Box<dyn PermissionPrompt>) -> Gateway {
    let store = PermissionStore::load(
        Box::new(crate::access::MemoryPersistence::default()),
        config.ignore_origin_list.clone(),
    )
    .expect("load permission store");
    Gateway::listen(config, host_actions(), store, prompt).expect("gateway should bind")
}

pub(crate) fn start_default_gateway() -> Gateway {
    start_gateway(loopback_config(), Box::new(StaticPrompt(PromptOutcome::Deny)))
}

/// Builds a request frame carrying `body`.
pub(crate) fn post(origin: Option<&str>, body: &str) -> Vec<u8> {
    let mut frame = String::from("POST / HTTP/1.1\r\nHost: 127.0.0.1\r\n");
    if let Some(origin) = origin {
        frame.push_str(&format!("Origin: {origin}\r\n"));
    }
    frame.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    frame.into_bytes()
}

/// A parsed response as seen by the client.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub(crate) status: u16,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: String,
}

impl Exchange {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Opens a client, sends `frame` in `pieces` writes (one per tick) and ticks
/// the gateway until the connection closes.
pub(crate) fn exchange_in_pieces(gateway: &mut Gateway, frame: &[u8], pieces: usize) -> Exchange {
    let mut client = TcpStream::connect(gateway.local_addr()).expect("connect client");
    client.set_nonblocking(true).expect("non-blocking client");
    let piece_len = frame.len().div_ceil(pieces.max(1)).max(1);
    let mut pending = frame.chunks(piece_len);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut received = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        if let Some(piece) = pending.next() {
            write_fully(&mut client, piece);
        }
        gateway.advance();
        match client.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => received.extend_from_slice(&chunk[..count]),
            Err(error) if error.kind() == ErrorKind::WouldBlock => {}
            Err(error) if error.kind() == ErrorKind::ConnectionReset => break,
            Err(error) => panic!("client read failed: {error}"),
        }
        assert!(Instant::now() < deadline, "gateway did not answer in time");
        thread::sleep(Duration::from_millis(1));
    }
    parse_response(&received)
}

pub(crate) fn exchange(gateway: &mut Gateway, frame: &[u8]) -> Exchange {
    exchange_in_pieces(gateway, frame, 1)
}

fn write_fully(client: &mut TcpStream, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        match client.write(bytes) {
            Ok(written) => bytes = &bytes[written..],
            Err(error) if error.kind() == ErrorKind::WouldBlock => thread::yield_now(),
            Err(error) => panic!("client write failed: {error}"),
        }
    }
}

fn parse_response(raw: &[u8]) -> Exchange {
    let text = String::from_utf8(raw.to_vec()).expect("utf-8 response");
    let (head, body) = text
        .split_once("\r\n\r\n")
        .unwrap_or_else(|| panic!("response has no header terminator: {text:?}"));
    let mut lines = head.split("\r\n");
    let status_line = lines.next().expect("status line");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or_else(|| panic!("bad status line: {status_line}"));
    let headers = lines
        .filter_map(|line| line.split_once(": "))
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect();
    Exchange {
        status,
        headers,
        body: body.to_owned(),
    }
}

/// Lifecycle events captured by [`RecordingHealthReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    GatewayStopped,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingHealthReporter {
    events: std::sync::Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    pub(crate) fn events(&self) -> Vec<HealthEvent> {
        self.events.lock().expect("events lock").clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl crate::HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config, _address: std::net::SocketAddr) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &crate::BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn gateway_stopped(&self, _address: std::net::SocketAddr) {
        self.record(HealthEvent::GatewayStopped);
    }
}
