//! tally-ops: trailing-window operators built on top of tally-core.
//!
//! - `WindowAggregator`: running sum and count over a trailing time span
//! - `MovingAverage`: the `Operator` that feeds each event through an aggregator
//! - `MovingAverageExt`: lazy iterator adapters for use without an executor

use tally_core::{Average, Event, Operator, Result};
use tracing::instrument;

pub mod time;
pub mod window;
pub use time::{EventClock, Observation};
pub use window::{MovingAverageExt, MovingAverages, TryMovingAverages, WindowAggregator};

/// Emits, for every event, the average duration of the events within the trailing window.
///
/// Example
/// ```no_run
/// use tally_ops::MovingAverage;
/// let op = MovingAverage::minutes(10)?;
/// # let _ = op;
/// # Ok::<(), tally_core::Error>(())
/// ```
pub struct MovingAverage {
    window: WindowAggregator,
    clock: EventClock,
}

impl MovingAverage {
    pub fn new(window: WindowAggregator) -> Self {
        Self { window, clock: EventClock::new() }
    }

    pub fn minutes(minutes: i64) -> Result<Self> {
        Ok(Self::new(WindowAggregator::from_minutes(minutes)?))
    }

    pub fn window(&self) -> &WindowAggregator {
        &self.window
    }
}

impl Operator for MovingAverage {
    #[instrument(name = "moving_average_on_element", skip_all)]
    fn on_element(&mut self, event: Event) -> Result<Average> {
        if let Observation::Regressed { behind } = self.clock.observe(event.timestamp) {
            tracing::warn!(
                timestamp = %event.timestamp,
                behind_ms = behind.num_milliseconds(),
                "event timestamp went backwards; window averages are unreliable from here"
            );
        }
        let evicted = self.window.add(&event);
        if evicted > 0 {
            tracing::debug!(evicted, retained = self.window.len(), "evicted expired entries");
            tally_core::metrics::EVICTED.inc_by(evicted as u64);
        }
        tally_core::metrics::WINDOW_ENTRIES.set(self.window.len() as i64);
        Ok(Average::for_event(&event, self.window.current_average()))
    }
}

pub mod prelude {
    pub use super::{EventClock, MovingAverage, MovingAverageExt, WindowAggregator};
}
