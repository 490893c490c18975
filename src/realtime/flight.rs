//! Flight status payloads pushed to arrival boards.

use serde::Serialize;

use super::event::Payload;

/// Name of the state-transition event.
pub const FLIGHT_STATE_UPDATE: &str = "flightStateUpdate";

/// Name of the event that takes a flight off the board.
pub const FLIGHT_REMOVAL: &str = "flightRemoval";

/// Arrival states, in the order a flight moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightState {
    Landing,
    Landed,
}

/// `{"flight": "<id>", "state": "<status>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightStateUpdate {
    pub flight: String,
    pub state: FlightState,
}

impl Payload for FlightStateUpdate {
    fn event_name(&self) -> &'static str {
        FLIGHT_STATE_UPDATE
    }
}

/// `{"flight": "<id>"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightRemoval {
    pub flight: String,
}

impl Payload for FlightRemoval {
    fn event_name(&self) -> &'static str {
        FLIGHT_REMOVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::Event;

    #[test]
    fn state_update_payload_is_literal() {
        let landing = Event::from_payload(&FlightStateUpdate {
            flight: "I768".to_owned(),
            state: FlightState::Landing,
        })
        .unwrap();
        assert_eq!(landing.name(), "flightStateUpdate");
        assert_eq!(landing.data(), r#"{"flight": "I768", "state": "landing"}"#);

        let landed = Event::from_payload(&FlightStateUpdate {
            flight: "I768".to_owned(),
            state: FlightState::Landed,
        })
        .unwrap();
        assert_eq!(landed.data(), r#"{"flight": "I768", "state": "landed"}"#);
    }

    #[test]
    fn removal_payload_is_literal() {
        let removal = Event::from_payload(&FlightRemoval {
            flight: "I768".to_owned(),
        })
        .unwrap();
        assert_eq!(removal.name(), "flightRemoval");
        assert_eq!(removal.data(), r#"{"flight": "I768"}"#);
    }
}
