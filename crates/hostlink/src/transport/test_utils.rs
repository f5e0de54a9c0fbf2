//! Test helpers for the transport module.

use std::io::{ErrorKind, Read};
use std::net::TcpStream;
use std::time::Duration;

use super::framing::{FramingError, HttpRequest};
use super::handler::RequestHandler;

/// Answers each request with its own body and counts invocations.
#[derive(Debug, Default)]
pub(crate) struct EchoHandler {
    pub(crate) handled: usize,
    pub(crate) rejected: usize,
}

impl RequestHandler for EchoHandler {
    fn handle(&mut self, request: &HttpRequest) -> Vec<u8> {
        self.handled += 1;
        request.body().to_vec()
    }

    fn reject(&mut self, _error: &FramingError) -> Vec<u8> {
        self.rejected += 1;
        b"rejected".to_vec()
    }
}

/// Reads from `stream` until the peer closes it.
pub(crate) fn read_to_close(stream: &mut TcpStream) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set read timeout");
    let mut received = Vec::new();
    let mut chunk = [0_u8; 1024];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return received,
            Ok(count) => received.extend_from_slice(&chunk[..count]),
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) if error.kind() == ErrorKind::ConnectionReset => return received,
            Err(error) => panic!("read failed: {error}"),
        }
    }
}
