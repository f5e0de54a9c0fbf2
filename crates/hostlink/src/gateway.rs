//! The embeddable gateway driven by the host's tick.

use std::net::SocketAddr;
use std::time::Instant;

use hostlink_config::Config;

use crate::access::{PermissionGate, PermissionPrompt, PermissionStore};
use crate::dispatch::{ActionTable, Dispatcher, GatewayHandler};
use crate::transport::{ConnectionLimits, ListenerError, SocketListener};

/// A bound gateway. Nothing happens until the host calls
/// [`advance`](Self::advance).
#[derive(Debug)]
pub struct Gateway {
    config: Config,
    listener: SocketListener,
    handler: GatewayHandler,
}

impl Gateway {
    /// Binds the listening socket described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the address cannot be resolved or bound.
    pub fn listen(
        config: Config,
        actions: ActionTable,
        store: PermissionStore,
        prompt: Box<dyn PermissionPrompt>,
    ) -> Result<Self, ListenerError> {
        let limits = ConnectionLimits {
            idle_timeout: config.read_timeout(),
            max_request_bytes: config.max_request_bytes,
        };
        let listener = SocketListener::bind(
            config.bind_address(),
            config.bind_port(),
            config.backlog,
            limits,
        )?;
        let dispatcher = Dispatcher::new(
            actions,
            PermissionGate::new(config.api_key()),
            store,
            prompt,
            config.api_version,
        );
        let handler =
            GatewayHandler::new(dispatcher, config.cors_allow_list(), config.default_version);
        Ok(Self {
            config,
            listener,
            handler,
        })
    }

    /// Performs one tick of non-blocking network work.
    ///
    /// Dispatch runs synchronously inside the tick, so a slow action or an
    /// open permission prompt delays every other connection until it returns.
    pub fn advance(&mut self) {
        self.listener.advance(&mut self.handler, Instant::now());
    }

    /// Address the gateway is listening on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Number of connections awaiting a complete request or a flushed reply.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.listener.connection_count()
    }

    /// Returns `false` once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listener.is_open()
    }

    /// The configuration the gateway was started with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The request pipeline, including the permission store.
    #[must_use]
    pub const fn handler(&self) -> &GatewayHandler {
        &self.handler
    }

    /// Closes the listening socket and drops every open connection.
    pub fn shutdown(&mut self) {
        self.listener.close();
    }
}
