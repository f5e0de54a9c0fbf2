//! Incremental request framing.
//!
//! Requests arrive as a request line, `key: value` header lines, a blank line
//! and exactly `Content-Length` body bytes:
//!
//! ```text
//! POST / HTTP/1.1\r\n
//! Content-Length: 20\r\n
//! \r\n
//! {"action":"version"}
//! ```
//!
//! The parser works on whatever prefix of the stream has been buffered so far.
//! It reports [`ParseOutcome::Incomplete`] until the whole frame is present and
//! never consumes bytes beyond the frame it returns.

use std::collections::BTreeMap;

use thiserror::Error;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A fully framed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    method: String,
    path: Option<String>,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl HttpRequest {
    /// Request method, upper-cased.
    #[must_use]
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Request target, when the request line carried one.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Looks up a header by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Request body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    /// Returns `true` for a preflight request.
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        self.method == "OPTIONS"
    }
}

/// Result of a parse attempt over the buffered bytes.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    /// More bytes are needed before a request can be produced.
    Incomplete,
    /// A request was framed from the first `consumed` bytes of the buffer.
    Complete {
        /// The parsed request.
        request: HttpRequest,
        /// Number of buffer bytes making up the frame.
        consumed: usize,
    },
}

/// Ways a frame can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingErrorKind {
    /// The request line was empty.
    #[error("missing request line")]
    MissingRequestLine,
    /// A header line was not valid UTF-8 or lacked a `:` separator.
    #[error("malformed header line: {line}")]
    MalformedHeader {
        /// The offending line, lossily decoded.
        line: String,
    },
    /// `Content-Length` was not a non-negative integer.
    #[error("invalid content length: {value}")]
    InvalidContentLength {
        /// The header value as received.
        value: String,
    },
    /// The declared frame is larger than the receiver accepts.
    #[error("request of {declared} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Header block plus declared body length.
        declared: usize,
        /// Largest frame the receiver buffers.
        limit: usize,
    },
}

/// A malformed frame, with whatever caller identity could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct FramingError {
    kind: FramingErrorKind,
    origin: Option<String>,
}

impl FramingError {
    fn new(kind: FramingErrorKind, headers: &BTreeMap<String, String>) -> Self {
        Self {
            kind,
            origin: headers.get("origin").cloned(),
        }
    }

    /// The specific framing violation.
    #[must_use]
    pub fn kind(&self) -> &FramingErrorKind {
        &self.kind
    }

    /// `Origin` header of the malformed request, when it was readable.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Attempts to frame one request from the start of `buffer`.
///
/// # Errors
///
/// Returns [`FramingError`] once the header block is complete but cannot be
/// interpreted.
pub fn parse_request(buffer: &[u8]) -> Result<ParseOutcome, FramingError> {
    parse_request_within(buffer, usize::MAX)
}

/// Like [`parse_request`], but refuses frames whose header block plus
/// declared body exceed `limit` bytes as soon as the headers are complete.
///
/// # Errors
///
/// Returns [`FramingError`] for uninterpretable headers and for
/// [`FramingErrorKind::FrameTooLarge`].
pub fn parse_request_within(buffer: &[u8], limit: usize) -> Result<ParseOutcome, FramingError> {
    let Some(separator) = find_terminator(buffer) else {
        return Ok(ParseOutcome::Incomplete);
    };
    let header_length = separator + HEADER_TERMINATOR.len();
    let head = buffer.get(..separator).unwrap_or_default();
    let mut lines = head.split(|byte| *byte == b'\n').map(trim_carriage_return);

    let request_line = lines.next().unwrap_or_default();
    let mut headers = BTreeMap::new();
    for line in lines {
        let (key, value) = split_header(line).map_err(|kind| FramingError::new(kind, &headers))?;
        headers.insert(key, value);
    }

    let (method, path) = split_request_line(request_line)
        .ok_or_else(|| FramingError::new(FramingErrorKind::MissingRequestLine, &headers))?;

    let body_length = content_length(&headers)?;
    let Some(total) = header_length.checked_add(body_length) else {
        return Err(FramingError::new(
            FramingErrorKind::InvalidContentLength {
                value: body_length.to_string(),
            },
            &headers,
        ));
    };
    if total > limit {
        return Err(FramingError::new(
            FramingErrorKind::FrameTooLarge {
                declared: total,
                limit,
            },
            &headers,
        ));
    }
    let Some(body) = buffer.get(header_length..total) else {
        return Ok(ParseOutcome::Incomplete);
    };

    Ok(ParseOutcome::Complete {
        request: HttpRequest {
            method,
            path,
            headers,
            body: body.to_vec(),
        },
        consumed: total,
    })
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

fn trim_carriage_return(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn split_request_line(line: &[u8]) -> Option<(String, Option<String>)> {
    let text = String::from_utf8_lossy(line);
    let mut parts = text.split_ascii_whitespace();
    let method = parts.next()?.to_ascii_uppercase();
    let path = parts.next().map(str::to_owned);
    Some((method, path))
}

fn split_header(line: &[u8]) -> Result<(String, String), FramingErrorKind> {
    let malformed = || FramingErrorKind::MalformedHeader {
        line: String::from_utf8_lossy(line).into_owned(),
    };
    let text = std::str::from_utf8(line).map_err(|_| malformed())?;
    let (key, value) = text.split_once(':').ok_or_else(malformed)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(malformed());
    }
    Ok((key.to_ascii_lowercase(), value.trim().to_owned()))
}

fn content_length(headers: &BTreeMap<String, String>) -> Result<usize, FramingError> {
    match headers.get("content-length") {
        None => Ok(0),
        Some(value) => value.parse::<usize>().map_err(|_| {
            FramingError::new(
                FramingErrorKind::InvalidContentLength {
                    value: value.clone(),
                },
                headers,
            )
        }),
    }
}
