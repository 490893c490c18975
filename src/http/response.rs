//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses and
//! serializing their head (and fixed body, if any) for transmission over TCP.
//! A response may instead carry an [`EventStream`], in which case the body is
//! unbounded and the server pumps it frame by frame after the head.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};
use crate::realtime::EventStream;

/// The body of a [`Response`].
#[derive(Debug)]
pub enum Body {
    /// A complete body, sent with a `Content-Length` header.
    Full(Vec<u8>),
    /// An unbounded server-sent event stream, delimited by connection close.
    Stream(EventStream),
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use flightwire::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let (head, stream) = response.into_parts();
/// let text = std::str::from_utf8(&head).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
/// assert!(stream.is_none());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: Option<bool>,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Full(Vec::new()),
            keep_alive: None,
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for callers that decorate a response
    /// conditionally without consuming it.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_parts`](Self::into_parts).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Full(body.into().into_bytes());
        self
    }

    /// Replaces the body with an unbounded event stream.
    #[must_use]
    pub fn stream(mut self, stream: EventStream) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    /// Writes `Connection: keep-alive` or `Connection: close` unless the
    /// caller already set a `Connection` header.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = Some(keep_alive);
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers set so far (automatic framing headers excluded).
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns `true` if the body is an event stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    /// Serializes the response head into a `BytesMut` buffer using HTTP/1.1
    /// wire format, appending the body when it is a fixed one.
    ///
    /// For a fixed body this adds `Content-Type: text/plain; charset=utf-8`
    /// when the body is non-empty and no type was set, and always writes
    /// `Content-Length`. A streaming body gets neither: its length is
    /// delimited by the connection closing, and it is handed back to the
    /// caller to pump.
    pub fn into_parts(mut self) -> (BytesMut, Option<EventStream>) {
        let (fixed, stream) = match self.body {
            Body::Full(bytes) => (Some(bytes), None),
            Body::Stream(stream) => (None, Some(stream)),
        };

        if let Some(body) = &fixed {
            if !body.is_empty() && !self.headers.contains("content-type") {
                self.headers
                    .insert("Content-Type", "text/plain; charset=utf-8");
            }
        }

        if let Some(keep_alive) = self.keep_alive {
            if !self.headers.contains("connection") {
                let connection = if keep_alive { "keep-alive" } else { "close" };
                self.headers.insert("Connection", connection);
            }
        }

        let body_len = fixed.as_ref().map_or(0, Vec::len);
        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + body_len);

        // Status line
        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        buf.put(self.headers.to_string().as_bytes());

        if let Some(body) = fixed {
            buf.put(format!("Content-Length: {body_len}\r\n\r\n").as_bytes());
            buf.put(body.as_slice());
        } else {
            buf.put(&b"\r\n"[..]);
        }

        (buf, stream)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::Connection;

    fn head_string(response: Response) -> String {
        let (head, _) = response.into_parts();
        String::from_utf8(head.to_vec()).unwrap()
    }

    #[test]
    fn simple_ok_response() {
        let s = head_string(Response::new(StatusCode::Ok).body("Hello"));
        assert!(s.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(s.contains("Content-Length: 5\r\n"));
        assert!(s.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn not_found_is_status_line_and_length_only() {
        let s = head_string(Response::new(StatusCode::NotFound));
        assert_eq!(s, "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn connection_close() {
        let s = head_string(Response::new(StatusCode::BadRequest).keep_alive(false));
        assert!(s.contains("Connection: close\r\n"));
    }

    #[test]
    fn explicit_connection_header_is_not_duplicated() {
        let s = head_string(
            Response::new(StatusCode::Ok)
                .header("Connection", "keep-alive")
                .keep_alive(true),
        );
        assert_eq!(s.matches("Connection:").count(), 1);
    }

    #[tokio::test]
    async fn streaming_head_has_no_length_and_returns_stream() {
        let (connection, frames) = Connection::new();
        let response = Response::new(StatusCode::Ok)
            .header("Content-Type", "text/event-stream")
            .stream(EventStream::new(connection, frames));
        assert!(response.is_streaming());

        let (head, stream) = response.into_parts();
        let s = std::str::from_utf8(&head).unwrap();
        assert_eq!(s, "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\r\n");
        assert!(stream.is_some());
    }
}
