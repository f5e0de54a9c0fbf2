//! Response framing for the gateway's replies.

use std::fmt::Write as _;

/// Content type attached to JSON replies.
pub const JSON_CONTENT_TYPE: &str = "text/json";

/// Content type attached to the liveness banner.
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Status lines the gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `200 OK`.
    Ok,
    /// `400 Bad Request`, used for malformed frames from trusted callers.
    BadRequest,
    /// `403 Forbidden`, used for every denied caller.
    Forbidden,
}

impl Status {
    /// Numeric status code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
        }
    }

    const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::Forbidden => "Forbidden",
        }
    }
}

/// A response awaiting serialization onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: Status,
    content_type: &'static str,
    headers: Vec<(&'static str, String)>,
    body: Vec<u8>,
}

impl HttpResponse {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            content_type: JSON_CONTENT_TYPE,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Replaces the body and its content type.
    #[must_use]
    pub fn with_body(mut self, content_type: &'static str, body: Vec<u8>) -> Self {
        self.content_type = content_type;
        self.body = body;
        self
    }

    /// Appends a header. Headers are written in insertion order.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Status of the response.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Body bytes of the response.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    /// Looks up a header value by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Serializes the status line, headers and body.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        let mut head = String::new();
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\n",
            self.status.code(),
            self.status.reason(),
            self.content_type
        );
        for (name, value) in &self.headers {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        let _ = write!(head, "Content-Length: {}\r\n\r\n", self.body.len());

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
