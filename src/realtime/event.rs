//! Server-sent event messages and their wire framing.
//!
//! A message goes out as exactly three frames, in order:
//!
//! ```text
//! event: <name>\n
//! data: <payload>\n
//! \n
//! ```
//!
//! Clients split the stream on the blank line and read the event name from
//! the first field, so a payload may never contain a line break.

use std::io;
use std::string::FromUtf8Error;

use bytes::Bytes;
use chrono::NaiveTime;
use serde::Serialize;
use thiserror::Error;

/// Name of the liveness event.
pub const HEARTBEAT: &str = "heartbeat";

/// Name of the sentinel sent before a server-initiated close.
pub const CLOSED_CONNECTION: &str = "closedConnection";

/// Errors raised while building an [`Event`].
#[derive(Debug, Error)]
pub enum EventError {
    #[error("event name must be non-empty and free of line breaks and colons: {0:?}")]
    InvalidName(String),

    #[error("event data must be a single line")]
    MultilineData,

    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("serialized payload is not UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// A typed payload that knows which event name it travels under.
pub trait Payload: Serialize {
    /// The event name written on the `event:` line.
    fn event_name(&self) -> &'static str;
}

/// One named server-sent event.
///
/// # Examples
///
/// ```
/// use flightwire::realtime::Event;
///
/// let event = Event::new("ping", "pong").unwrap();
/// let wire: Vec<u8> = event.frames().iter().flat_map(|f| f.to_vec()).collect();
/// assert_eq!(wire, b"event: ping\ndata: pong\n\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    name: String,
    data: String,
}

impl Event {
    /// Builds an event from a name and a single-line payload.
    ///
    /// # Errors
    ///
    /// - [`EventError::InvalidName`] if the name is empty or contains `:`, `\r` or `\n`.
    /// - [`EventError::MultilineData`] if the payload contains `\r` or `\n`.
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Result<Self, EventError> {
        let name = name.into();
        if name.is_empty() || name.contains([':', '\r', '\n']) {
            return Err(EventError::InvalidName(name));
        }
        let data = data.into();
        if data.contains(['\r', '\n']) {
            return Err(EventError::MultilineData);
        }
        Ok(Self { name, data })
    }

    /// Builds an event from a typed payload, serialized as one line of JSON.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Serialize`] if the payload cannot be serialized.
    pub fn from_payload<P: Payload>(payload: &P) -> Result<Self, EventError> {
        Self::new(payload.event_name(), to_line(payload)?)
    }

    /// A `heartbeat` event carrying `time` as zero-padded `HH:MM:SS`.
    pub fn heartbeat(time: NaiveTime) -> Self {
        Self {
            name: HEARTBEAT.to_owned(),
            data: time.format("%H:%M:%S").to_string(),
        }
    }

    /// The sentinel written right before the server ends a stream.
    pub fn closed_connection() -> Self {
        Self {
            name: CLOSED_CONNECTION.to_owned(),
            data: String::new(),
        }
    }

    /// Returns the event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Returns the three wire frames of this message: the `event:` line,
    /// the `data:` line, and the terminating blank line.
    pub fn frames(&self) -> [Bytes; 3] {
        [
            Bytes::from(format!("event: {}\n", self.name)),
            Bytes::from(format!("data: {}\n", self.data)),
            Bytes::from_static(b"\n"),
        ]
    }
}

/// Serializes `value` as single-line JSON with a space after every `:` and `,`,
/// e.g. `{"flight": "I768", "state": "landing"}`.
fn to_line<T: Serialize + ?Sized>(value: &T) -> Result<String, EventError> {
    let mut buf = Vec::with_capacity(64);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(event: &Event) -> String {
        event
            .frames()
            .iter()
            .map(|f| std::str::from_utf8(f).unwrap().to_owned())
            .collect()
    }

    #[test]
    fn frames_are_event_data_blank() {
        let event = Event::new("flightRemoval", r#"{"flight": "I768"}"#).unwrap();
        let frames = event.frames();
        assert_eq!(&frames[0][..], b"event: flightRemoval\n");
        assert_eq!(&frames[1][..], b"data: {\"flight\": \"I768\"}\n");
        assert_eq!(&frames[2][..], b"\n");
        assert_eq!(wire(&event), "event: flightRemoval\ndata: {\"flight\": \"I768\"}\n\n");
    }

    #[test]
    fn heartbeat_is_zero_padded() {
        let time = NaiveTime::from_hms_opt(3, 4, 5).unwrap();
        let event = Event::heartbeat(time);
        assert_eq!(event.name(), "heartbeat");
        assert_eq!(event.data(), "03:04:05");

        let late = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        assert_eq!(Event::heartbeat(late).data(), "23:59:59");

        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Event::heartbeat(midnight).data(), "00:00:00");
    }

    #[test]
    fn closed_connection_has_empty_data_line() {
        assert_eq!(
            wire(&Event::closed_connection()),
            "event: closedConnection\ndata: \n\n"
        );
    }

    #[test]
    fn multiline_data_rejected() {
        assert!(matches!(
            Event::new("x", "a\n\nb"),
            Err(EventError::MultilineData)
        ));
        assert!(matches!(Event::new("x", "a\rb"), Err(EventError::MultilineData)));
    }

    #[test]
    fn bad_names_rejected() {
        assert!(matches!(Event::new("", "x"), Err(EventError::InvalidName(_))));
        assert!(matches!(Event::new("a:b", "x"), Err(EventError::InvalidName(_))));
        assert!(matches!(Event::new("a\nb", "x"), Err(EventError::InvalidName(_))));
    }

    #[test]
    fn spaced_json_line() {
        #[derive(Serialize)]
        struct Sample<'a> {
            a: u8,
            b: &'a str,
            c: Vec<u8>,
        }
        let line = to_line(&Sample {
            a: 1,
            b: "x\ny",
            c: vec![1, 2],
        })
        .unwrap();
        assert_eq!(line, r#"{"a": 1, "b": "x\ny", "c": [1, 2]}"#);
    }
}
