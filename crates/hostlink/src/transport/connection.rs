//! Per-socket read/write state machine.
//!
//! A connection carries exactly one request. It accumulates bytes until the
//! framing parser yields a request, hands that request to the
//! [`RequestHandler`], then drains the response and closes.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::LISTENER_TARGET;
use super::framing::{ParseOutcome, parse_request_within};
use super::handler::RequestHandler;

/// Bytes requested from the socket per tick, and the size of the receive
/// scratch buffer the listener lends to each connection.
pub(crate) const RECEIVE_CHUNK: usize = 64 * 1024;

/// Bounds applied to every connection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConnectionLimits {
    pub(crate) idle_timeout: Duration,
    pub(crate) max_request_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    Writing,
}

/// Why a connection left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CloseReason {
    Completed,
    PeerClosed,
    IdleTimeout,
    RequestTooLarge,
    ReadFailed,
    WriteFailed,
}

/// Outcome of one tick for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Open,
    Closed(CloseReason),
}

/// One accepted socket and its buffers.
#[derive(Debug)]
pub(crate) struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    read_buffer: Vec<u8>,
    write_buffer: Vec<u8>,
    phase: Phase,
    last_activity: Instant,
}

impl Connection {
    pub(crate) fn new(stream: TcpStream, peer: SocketAddr, now: Instant) -> Self {
        Self {
            stream,
            peer,
            read_buffer: Vec::new(),
            write_buffer: Vec::new(),
            phase: Phase::Reading,
            last_activity: now,
        }
    }

    pub(crate) fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Performs at most one receive and one send.
    ///
    /// `scratch` receives the raw bytes; only the filled prefix is kept.
    pub(crate) fn advance(
        &mut self,
        handler: &mut dyn RequestHandler,
        limits: ConnectionLimits,
        scratch: &mut [u8],
        now: Instant,
    ) -> Progress {
        if self.phase == Phase::Reading
            && let Progress::Closed(reason) = self.receive(handler, limits, scratch, now)
        {
            return Progress::Closed(reason);
        }

        if self.write_buffer.is_empty() {
            return match self.phase {
                Phase::Writing => Progress::Closed(CloseReason::Completed),
                Phase::Reading => self.check_idle(limits, now),
            };
        }
        match self.send(now) {
            Progress::Open => self.check_idle(limits, now),
            closed @ Progress::Closed(_) => closed,
        }
    }

    fn receive(
        &mut self,
        handler: &mut dyn RequestHandler,
        limits: ConnectionLimits,
        scratch: &mut [u8],
        now: Instant,
    ) -> Progress {
        let received = match self.stream.read(scratch) {
            Ok(0) => return Progress::Closed(CloseReason::PeerClosed),
            Ok(received) => received,
            Err(error) if is_transient(&error) => return Progress::Open,
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    peer = %self.peer,
                    error = %error,
                    "receive failed"
                );
                return Progress::Closed(CloseReason::ReadFailed);
            }
        };
        self.last_activity = now;
        self.read_buffer
            .extend_from_slice(scratch.get(..received).unwrap_or_default());

        match parse_request_within(&self.read_buffer, limits.max_request_bytes) {
            Ok(ParseOutcome::Complete { request, consumed }) => {
                self.read_buffer.drain(..consumed);
                self.respond_with(handler.handle(&request));
                Progress::Open
            }
            Ok(ParseOutcome::Incomplete) if self.read_buffer.len() > limits.max_request_bytes => {
                warn!(
                    target: LISTENER_TARGET,
                    peer = %self.peer,
                    buffered = self.read_buffer.len(),
                    limit = limits.max_request_bytes,
                    "request exceeds maximum size"
                );
                Progress::Closed(CloseReason::RequestTooLarge)
            }
            Ok(ParseOutcome::Incomplete) => Progress::Open,
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    peer = %self.peer,
                    error = %error,
                    "malformed request frame"
                );
                self.read_buffer.clear();
                self.respond_with(handler.reject(&error));
                Progress::Open
            }
        }
    }

    fn respond_with(&mut self, response: Vec<u8>) {
        self.write_buffer = response;
        self.phase = Phase::Writing;
    }

    fn send(&mut self, now: Instant) -> Progress {
        match self.stream.write(&self.write_buffer) {
            Ok(0) => Progress::Closed(CloseReason::WriteFailed),
            Ok(sent) => {
                self.write_buffer.drain(..sent);
                self.last_activity = now;
                if self.write_buffer.is_empty() {
                    Progress::Closed(CloseReason::Completed)
                } else {
                    Progress::Open
                }
            }
            Err(error) if is_transient(&error) => Progress::Open,
            Err(error) => {
                debug!(
                    target: LISTENER_TARGET,
                    peer = %self.peer,
                    error = %error,
                    "send failed"
                );
                Progress::Closed(CloseReason::WriteFailed)
            }
        }
    }

    fn check_idle(&self, limits: ConnectionLimits, now: Instant) -> Progress {
        if now.saturating_duration_since(self.last_activity) > limits.idle_timeout {
            Progress::Closed(CloseReason::IdleTimeout)
        } else {
            Progress::Open
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}
