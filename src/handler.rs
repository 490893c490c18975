//! The one route this server answers.
//!
//! `GET /events` (any case) opens an event stream; every other path gets an
//! empty `404`. Matching is a plain comparison against the request path, the
//! query string is not part of it.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::http::{Request, Response, StatusCode};
use crate::realtime::schedule::DEFAULT_FLIGHT;
use crate::realtime::{Connection, EventError, EventStream, LocalClock, Schedule, WallClock};

/// Path of the event stream.
pub const STREAM_PATH: &str = "/events";

/// Serves [`STREAM_PATH`] as a server-sent event stream.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use flightwire::{Config, Server, StreamHandler};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let handler = Arc::new(StreamHandler::new(&config)?);
///     let server = Server::bind(config.bind_addr()).await?;
///     server.run(move |req| {
///         let handler = Arc::clone(&handler);
///         async move { handler.handle(&req) }
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct StreamHandler {
    schedule: Schedule,
    allow_origin: Option<String>,
    clock: Arc<dyn WallClock>,
}

impl StreamHandler {
    /// Builds the handler for the flight arrival schedule, applying the
    /// cross-origin and server-close settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns an [`EventError`] if the schedule's payloads cannot be built.
    pub fn new(config: &Config) -> Result<Self, EventError> {
        let schedule =
            Schedule::flight_arrival(DEFAULT_FLIGHT)?.with_close_after(config.close_after);
        Ok(Self {
            schedule,
            allow_origin: config.allow_origin.clone(),
            clock: Arc::new(LocalClock),
        })
    }

    /// Replaces the schedule every new stream follows.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Replaces the clock heartbeat payloads are read from.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Routes `request`: an event stream for [`STREAM_PATH`], `404` otherwise.
    ///
    /// Opening the stream starts its timers right away, so this must run
    /// inside a tokio runtime.
    pub fn handle(&self, request: &Request) -> Response {
        if !request.path().eq_ignore_ascii_case(STREAM_PATH) {
            debug!(path = %request.path(), "no such resource");
            return Response::new(StatusCode::NotFound);
        }

        let (mut connection, frames) = Connection::new();
        connection.start(&self.schedule, Arc::clone(&self.clock));
        info!(
            connection_id = %connection.id(),
            method = %request.method(),
            path = %request.path(),
            "event stream opened"
        );

        let mut response = Response::new(StatusCode::Ok)
            .header("Connection", "keep-alive")
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-store");
        if let Some(origin) = &self.allow_origin {
            response.add_header("Access-Control-Allow-Origin", origin.as_str());
        }
        response.stream(EventStream::new(connection, frames))
    }
}
