use chrono::{Duration, NaiveDateTime};

/// Result of feeding a timestamp to an `EventClock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    InOrder,
    /// The timestamp is earlier than the latest one seen, by `behind`.
    Regressed { behind: Duration },
}

/// Tracks the latest event time seen and flags timestamps that go backwards.
#[derive(Debug, Clone, Default)]
pub struct EventClock {
    latest: Option<NaiveDateTime>,
}

impl EventClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ts: NaiveDateTime) -> Observation {
        match self.latest {
            Some(max) if ts < max => Observation::Regressed { behind: max - ts },
            _ => {
                self.latest = Some(ts);
                Observation::InOrder
            }
        }
    }

    pub fn latest(&self) -> Option<NaiveDateTime> {
        self.latest
    }
}
