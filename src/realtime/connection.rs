//! One client's event stream: its sink, its lifecycle, and its timers.
//!
//! A [`Connection`] moves through `Idle → Streaming → Closed`. Each timer it
//! starts holds an [`EventWriter`] and re-checks that the stream is open
//! immediately before every write; closing additionally aborts every timer
//! task so nothing lingers after the client is gone.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use super::clock::WallClock;
use super::event::Event;
use super::schedule::Schedule;

/// Server-generated identifier of one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, no timers running yet.
    Idle,
    /// Headers sent; timers may write.
    Streaming,
    /// Finalized by either side. Terminal.
    Closed,
}

#[derive(Debug)]
struct Shared {
    state: ConnectionState,
    sink: Option<UnboundedSender<Bytes>>,
}

/// Cloneable write handle held by a connection's timers.
///
/// All writes go through one mutex so the three frames of a message are
/// never interleaved with another timer's frames.
#[derive(Debug, Clone)]
pub struct EventWriter {
    id: ConnectionId,
    shared: Arc<Mutex<Shared>>,
}

impl EventWriter {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The connection this writer belongs to.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns `true` while the stream is accepting writes.
    pub fn is_open(&self) -> bool {
        let shared = self.lock();
        shared.state == ConnectionState::Streaming
            && shared.sink.as_ref().is_some_and(|sink| !sink.is_closed())
    }

    /// Writes `event` if the stream is open. Returns whether it was written.
    ///
    /// A sink whose reader has gone away closes the connection on the spot.
    pub fn send(&self, event: &Event) -> bool {
        let mut shared = self.lock();
        if shared.state != ConnectionState::Streaming {
            return false;
        }
        let delivered = shared.sink.as_ref().is_some_and(|sink| {
            event
                .frames()
                .into_iter()
                .all(|frame| sink.send(frame).is_ok())
        });
        if !delivered {
            shared.state = ConnectionState::Closed;
            shared.sink = None;
        }
        delivered
    }

    /// Finalizes the stream: no further writes, and the reader sees the end
    /// of the body. Returns `false` if it was already finalized.
    pub fn finish(&self) -> bool {
        let mut shared = self.lock();
        if shared.state == ConnectionState::Closed {
            return false;
        }
        shared.state = ConnectionState::Closed;
        shared.sink = None;
        true
    }

    fn state(&self) -> ConnectionState {
        self.lock().state
    }

    fn begin(&self) -> bool {
        let mut shared = self.lock();
        if shared.state != ConnectionState::Idle {
            return false;
        }
        shared.state = ConnectionState::Streaming;
        true
    }
}

/// One client's stream connection.
///
/// Owns the cancellable timer tasks started by [`Connection::start`].
/// Dropping a connection closes it.
///
/// # Examples
///
/// ```
/// use flightwire::realtime::{Connection, ConnectionState, Event};
///
/// let (mut connection, mut frames) = Connection::new();
/// assert_eq!(connection.state(), ConnectionState::Idle);
///
/// connection.open();
/// assert!(connection.send(&Event::new("ping", "1").unwrap()));
/// assert_eq!(&frames.try_recv().unwrap()[..], b"event: ping\n");
///
/// assert!(connection.close());
/// assert!(!connection.close());
/// assert!(!connection.send(&Event::new("ping", "2").unwrap()));
/// ```
#[derive(Debug)]
pub struct Connection {
    writer: EventWriter,
    timers: Vec<JoinHandle<()>>,
}

impl Connection {
    /// Creates an idle connection and the receiving end of its sink.
    pub fn new() -> (Self, UnboundedReceiver<Bytes>) {
        let (sink, frames) = mpsc::unbounded_channel();
        let writer = EventWriter {
            id: ConnectionId::new(),
            shared: Arc::new(Mutex::new(Shared {
                state: ConnectionState::Idle,
                sink: Some(sink),
            })),
        };
        (
            Self {
                writer,
                timers: Vec::new(),
            },
            frames,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.writer.id
    }

    pub fn state(&self) -> ConnectionState {
        self.writer.state()
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_open()
    }

    /// A write handle sharing this connection's sink and open flag.
    pub fn writer(&self) -> EventWriter {
        self.writer.clone()
    }

    /// Moves `Idle → Streaming` without scheduling anything.
    /// Returns `false` if the connection was not idle.
    pub fn open(&mut self) -> bool {
        self.writer.begin()
    }

    /// Opens the stream and starts one timer task per scheduled action.
    ///
    /// Delays count from this call. Must be called inside a tokio runtime.
    /// Does nothing unless the connection is idle.
    pub fn start(&mut self, schedule: &Schedule, clock: Arc<dyn WallClock>) {
        if !self.open() {
            debug!(connection_id = %self.id(), "start ignored: connection not idle");
            return;
        }
        let started = Instant::now();
        let span = info_span!("connection", connection_id = %self.id());

        if let Some(period) = schedule.heartbeat_period() {
            let task = heartbeat(self.writer(), started, period, clock);
            self.timers.push(tokio::spawn(task.instrument(span.clone())));
        }

        for scheduled in schedule.events() {
            let task = one_shot(self.writer(), started + scheduled.delay, scheduled.event.clone());
            self.timers.push(tokio::spawn(task.instrument(span.clone())));
        }

        if let Some(delay) = schedule.close_after() {
            let task = server_close(self.writer(), started + delay);
            self.timers.push(tokio::spawn(task.instrument(span)));
        }
    }

    /// Writes `event` now if the stream is open.
    pub fn send(&self, event: &Event) -> bool {
        self.writer.send(event)
    }

    /// Number of timer tasks that have neither fired for good nor been cancelled.
    pub fn pending_timers(&self) -> usize {
        self.timers.iter().filter(|t| !t.is_finished()).count()
    }

    /// Cancels every timer and finalizes the stream.
    ///
    /// Returns `false` if the connection was already closed; closing twice
    /// is a no-op.
    pub fn close(&mut self) -> bool {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        self.writer.finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn heartbeat(
    writer: EventWriter,
    started: Instant,
    period: Duration,
    clock: Arc<dyn WallClock>,
) {
    let mut ticks = time::interval_at(started + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        let event = Event::heartbeat(clock.time_of_day());
        if !writer.send(&event) {
            break;
        }
        debug!(event = event.name(), data = event.data(), "sent heartbeat");
    }
}

async fn one_shot(writer: EventWriter, deadline: Instant, event: Event) {
    time::sleep_until(deadline).await;
    if writer.send(&event) {
        info!(event = event.name(), data = event.data(), "sent event");
    }
}

async fn server_close(writer: EventWriter, deadline: Instant) {
    time::sleep_until(deadline).await;
    let event = Event::closed_connection();
    if writer.send(&event) && writer.finish() {
        info!(event = event.name(), "server ended stream");
    }
}

/// The streaming body of a response: a [`Connection`] plus the receiving
/// end of its sink.
///
/// The server pulls frames with [`next_frame`](Self::next_frame) and calls
/// [`close`](Self::close) once either side is done.
#[derive(Debug)]
pub struct EventStream {
    connection: Connection,
    frames: UnboundedReceiver<Bytes>,
}

impl EventStream {
    pub fn new(connection: Connection, frames: UnboundedReceiver<Bytes>) -> Self {
        Self { connection, frames }
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Waits for the next frame. `None` once the stream has been finalized
    /// and every frame written before that has been drained.
    ///
    /// Cancel-safe.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Closes the underlying connection. Idempotent.
    pub fn close(&mut self) -> bool {
        self.connection.close()
    }
}
