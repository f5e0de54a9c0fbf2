//! Single-threaded TCP transport.
//!
//! The transport owns the listening socket and every accepted connection.
//! Nothing runs in the background: each call to
//! [`SocketListener::advance`] accepts pending clients and moves each
//! connection forward by one read and one write, so the host decides when
//! network work happens.

mod connection;
mod errors;
mod framing;
mod handler;
mod listener;
mod response;
#[cfg(test)]
mod test_utils;

pub(crate) use self::connection::ConnectionLimits;
pub use self::errors::ListenerError;
pub use self::framing::{
    FramingError, FramingErrorKind, HttpRequest, ParseOutcome, parse_request,
    parse_request_within,
};
pub use self::handler::RequestHandler;
pub(crate) use self::listener::SocketListener;
pub use self::response::{HttpResponse, JSON_CONTENT_TYPE, Status, TEXT_CONTENT_TYPE};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
