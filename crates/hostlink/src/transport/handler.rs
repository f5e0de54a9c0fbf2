//! Seam between the connection state machine and the request pipeline.

use super::framing::{FramingError, HttpRequest};

/// Produces the serialized response for each framed request.
///
/// Handlers run on the gateway thread and may block; while they do, no other
/// connection makes progress.
pub trait RequestHandler {
    /// Answers a complete request.
    fn handle(&mut self, request: &HttpRequest) -> Vec<u8>;

    /// Answers a request whose frame could not be interpreted.
    fn reject(&mut self, error: &FramingError) -> Vec<u8>;
}
