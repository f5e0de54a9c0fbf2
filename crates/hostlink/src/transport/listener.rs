//! Non-blocking TCP listener multiplexing every open connection.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::time::Instant;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use super::connection::{CloseReason, Connection, ConnectionLimits, Progress, RECEIVE_CHUNK};
use super::{LISTENER_TARGET, ListenerError, RequestHandler};

/// Listening socket plus the set of connections it accepted.
#[derive(Debug)]
pub(crate) struct SocketListener {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    connections: Vec<Connection>,
    limits: ConnectionLimits,
    scratch: Vec<u8>,
    last_accept_error: Option<io::ErrorKind>,
}

impl SocketListener {
    pub(crate) fn bind(
        host: &str,
        port: u16,
        backlog: u32,
        limits: ConnectionLimits,
    ) -> Result<Self, ListenerError> {
        let listener = bind_tcp(host, port, backlog)?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ListenerError::LocalAddr { source })?;
        info!(
            target: LISTENER_TARGET,
            address = %local_addr,
            backlog,
            "socket listener active"
        );
        Ok(Self {
            listener: Some(listener),
            local_addr,
            connections: Vec::new(),
            limits,
            scratch: vec![0_u8; RECEIVE_CHUNK],
            last_accept_error: None,
        })
    }

    pub(crate) const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub(crate) const fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    /// Accepts every pending client, then gives each open connection one
    /// receive and one send.
    pub(crate) fn advance(&mut self, handler: &mut dyn RequestHandler, now: Instant) {
        self.accept_pending(now);
        let limits = self.limits;
        let scratch = self.scratch.as_mut_slice();
        self.connections.retain_mut(|connection| {
            match connection.advance(handler, limits, scratch, now) {
                Progress::Open => true,
                Progress::Closed(reason) => {
                    log_close(connection.peer(), reason);
                    false
                }
            }
        });
    }

    /// Closes the listening socket and every open connection.
    pub(crate) fn close(&mut self) {
        if self.listener.take().is_some() {
            info!(
                target: LISTENER_TARGET,
                address = %self.local_addr,
                open_connections = self.connections.len(),
                "socket listener closed"
            );
        }
        self.connections.clear();
    }

    fn accept_pending(&mut self, now: Instant) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    self.last_accept_error = None;
                    if let Err(error) = stream.set_nonblocking(true) {
                        warn!(
                            target: LISTENER_TARGET,
                            peer = %peer,
                            error = %error,
                            "failed to make connection non-blocking"
                        );
                        continue;
                    }
                    debug!(target: LISTENER_TARGET, peer = %peer, "connection accepted");
                    self.connections.push(Connection::new(stream, peer, now));
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    let kind = error.kind();
                    if self.last_accept_error != Some(kind) {
                        warn!(
                            target: LISTENER_TARGET,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    self.last_accept_error = Some(kind);
                    return;
                }
            }
        }
    }
}

fn log_close(peer: SocketAddr, reason: CloseReason) {
    match reason {
        CloseReason::Completed | CloseReason::PeerClosed => {
            debug!(target: LISTENER_TARGET, peer = %peer, ?reason, "connection closed");
        }
        CloseReason::IdleTimeout
        | CloseReason::RequestTooLarge
        | CloseReason::ReadFailed
        | CloseReason::WriteFailed => {
            info!(target: LISTENER_TARGET, peer = %peer, ?reason, "connection dropped");
        }
    }
}

fn bind_tcp(host: &str, port: u16, backlog: u32) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?;
    let addr = addrs
        .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
        .ok_or_else(|| ListenerError::ResolveEmpty {
            host: host.to_string(),
            port,
        })?;

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|source| ListenerError::Socket { addr, source })?;
    socket
        .set_reuse_address(true)
        .map_err(|source| ListenerError::Socket { addr, source })?;
    socket
        .bind(&addr.into())
        .map_err(|source| ListenerError::BindTcp { addr, source })?;
    socket
        .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
        .map_err(|source| ListenerError::Listen {
            addr,
            backlog,
            source,
        })?;
    socket
        .set_nonblocking(true)
        .map_err(|source| ListenerError::NonBlocking { source })?;
    Ok(TcpListener::from(socket))
}
