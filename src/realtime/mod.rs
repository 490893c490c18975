//! Server-sent events: message framing, payloads, schedules, and the
//! per-client connection that ties them to a response body.

pub mod clock;
pub mod connection;
pub mod event;
pub mod flight;
pub mod schedule;

pub use clock::{FixedClock, LocalClock, WallClock};
pub use connection::{Connection, ConnectionId, ConnectionState, EventStream, EventWriter};
pub use event::{Event, EventError, Payload};
pub use flight::{FlightRemoval, FlightState, FlightStateUpdate};
pub use schedule::{Schedule, ScheduledEvent};
