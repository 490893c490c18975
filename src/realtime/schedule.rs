//! What a stream emits, and when, relative to the moment it opens.

use std::time::Duration;

use super::event::{Event, EventError};
use super::flight::{FlightRemoval, FlightState, FlightStateUpdate};

/// Period of the `heartbeat` event.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(53);

/// The flight announced by the default arrival schedule.
pub const DEFAULT_FLIGHT: &str = "I768";

/// A one-shot event fired `delay` after the stream opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub delay: Duration,
    pub event: Event,
}

/// The timed plan applied to every new connection.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use flightwire::realtime::{Event, Schedule};
///
/// let schedule = Schedule::new()
///     .heartbeat(Duration::from_secs(30))
///     .at(Duration::from_secs(1), Event::new("hello", "world").unwrap());
/// assert_eq!(schedule.heartbeat_period(), Some(Duration::from_secs(30)));
/// assert_eq!(schedule.events().len(), 1);
/// assert_eq!(schedule.close_after(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    heartbeat: Option<Duration>,
    events: Vec<ScheduledEvent>,
    close_after: Option<Duration>,
}

impl Schedule {
    /// An empty schedule: no heartbeat, no events, never closes.
    pub fn new() -> Self {
        Self::default()
    }

    /// The arrival sequence for `flight`: a heartbeat every
    /// [`HEARTBEAT_PERIOD`], `landing` at +5s, `landed` at +10s and the
    /// removal notice at +15s.
    ///
    /// # Errors
    ///
    /// Returns an [`EventError`] if a payload cannot be serialized.
    pub fn flight_arrival(flight: &str) -> Result<Self, EventError> {
        let update = |state| {
            Event::from_payload(&FlightStateUpdate {
                flight: flight.to_owned(),
                state,
            })
        };

        Ok(Self::new()
            .heartbeat(HEARTBEAT_PERIOD)
            .at(Duration::from_secs(5), update(FlightState::Landing)?)
            .at(Duration::from_secs(10), update(FlightState::Landed)?)
            .at(
                Duration::from_secs(15),
                Event::from_payload(&FlightRemoval {
                    flight: flight.to_owned(),
                })?,
            ))
    }

    /// Sets the heartbeat period. A zero period disables the heartbeat.
    #[must_use]
    pub fn heartbeat(mut self, period: Duration) -> Self {
        self.heartbeat = (!period.is_zero()).then_some(period);
        self
    }

    /// Adds a one-shot event fired `delay` after the stream opens.
    #[must_use]
    pub fn at(mut self, delay: Duration, event: Event) -> Self {
        self.events.push(ScheduledEvent { delay, event });
        self
    }

    /// Ends the stream `delay` after it opens, preceded by a
    /// `closedConnection` event. `None` keeps the stream open until the
    /// client leaves.
    #[must_use]
    pub fn with_close_after(mut self, delay: Option<Duration>) -> Self {
        self.close_after = delay;
        self
    }

    pub fn heartbeat_period(&self) -> Option<Duration> {
        self.heartbeat
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn close_after(&self) -> Option<Duration> {
        self.close_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flight_arrival_plan() {
        let schedule = Schedule::flight_arrival(DEFAULT_FLIGHT).unwrap();
        assert_eq!(schedule.heartbeat_period(), Some(Duration::from_secs(53)));
        assert_eq!(schedule.close_after(), None);

        let plan: Vec<_> = schedule
            .events()
            .iter()
            .map(|s| (s.delay.as_secs(), s.event.name(), s.event.data()))
            .collect();
        assert_eq!(
            plan,
            vec![
                (5, "flightStateUpdate", r#"{"flight": "I768", "state": "landing"}"#),
                (10, "flightStateUpdate", r#"{"flight": "I768", "state": "landed"}"#),
                (15, "flightRemoval", r#"{"flight": "I768"}"#),
            ]
        );
    }

    #[test]
    fn zero_heartbeat_disables_it() {
        let schedule = Schedule::new().heartbeat(Duration::ZERO);
        assert_eq!(schedule.heartbeat_period(), None);
    }
}
