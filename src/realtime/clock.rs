//! Wall-clock source for heartbeat payloads.
//!
//! Timer delays run on `tokio::time` and follow its (pausable) clock; only
//! the time-of-day printed inside a heartbeat comes from here.

use chrono::{Local, NaiveTime};

/// Reports the current local time of day.
pub trait WallClock: Send + Sync + 'static {
    fn time_of_day(&self) -> NaiveTime;
}

/// The host's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl WallClock for LocalClock {
    fn time_of_day(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveTime);

impl WallClock for FixedClock {
    fn time_of_day(&self) -> NaiveTime {
        self.0
    }
}
