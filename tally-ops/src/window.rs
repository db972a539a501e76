use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime};
use tally_core::{Average, Error, Event, Result};

/// Running average over the events whose timestamps fall within a trailing span
/// of the most recently added one.
///
/// The window is half-open: an entry is evicted as soon as
/// `latest - entry.timestamp >= span`. Events must be added in non-decreasing
/// timestamp order; this is not checked here.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    span: Duration,
    entries: VecDeque<(NaiveDateTime, f64)>,
    total_duration: RunningTotal,
}

/// Neumaier-compensated sum. Removing a large value leaves no rounding error
/// behind in the total of the small ones still retained.
#[derive(Debug, Clone, Copy, Default)]
struct RunningTotal {
    sum: f64,
    compensation: f64,
}

impl RunningTotal {
    fn add(&mut self, x: f64) {
        let t = self.sum + x;
        if t.is_finite() {
            if self.sum.abs() >= x.abs() {
                self.compensation += (self.sum - t) + x;
            } else {
                self.compensation += (x - t) + self.sum;
            }
        }
        self.sum = t;
    }

    fn sub(&mut self, x: f64) {
        self.add(-x);
    }

    fn value(&self) -> f64 {
        self.sum + self.compensation
    }
}

impl WindowAggregator {
    pub fn new(span: Duration) -> Result<Self> {
        if span <= Duration::zero() {
            return Err(Error::invalid_config(format!("window span must be positive, got {span}")));
        }
        Ok(Self { span, entries: VecDeque::new(), total_duration: RunningTotal::default() })
    }

    pub fn from_minutes(minutes: i64) -> Result<Self> {
        let span = Duration::try_minutes(minutes).ok_or_else(|| {
            Error::invalid_config(format!("window of {minutes} minutes is out of range"))
        })?;
        Self::new(span)
    }

    /// Appends the event, then evicts from the front everything that fell out of the span.
    /// Returns how many entries were evicted.
    pub fn add(&mut self, event: &Event) -> usize {
        self.entries.push_back((event.timestamp, event.duration));
        self.total_duration.add(event.duration);

        let latest = event.timestamp;
        let mut evicted = 0;
        while let Some(&(oldest, duration)) = self.entries.front() {
            if latest - oldest < self.span {
                break;
            }
            self.entries.pop_front();
            self.total_duration.sub(duration);
            evicted += 1;
        }
        evicted
    }

    /// `total / count`, or `0.0` for an empty window.
    pub fn current_average(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.total_duration.value() / self.entries.len() as f64
    }

    /// Adds `event` and returns the output record for it.
    pub fn step(&mut self, event: &Event) -> Average {
        self.add(event);
        Average::for_event(event, self.current_average())
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration.value()
    }

    /// Retained `(timestamp, duration)` pairs, oldest first.
    pub fn entries(&self) -> impl ExactSizeIterator<Item = &(NaiveDateTime, f64)> + '_ {
        self.entries.iter()
    }
}

/// Lazily maps a sequence of events to one `Average` per event.
pub struct MovingAverages<I> {
    events: I,
    window: WindowAggregator,
}

impl<I> MovingAverages<I> {
    pub fn new(events: I, window: WindowAggregator) -> Self {
        Self { events, window }
    }

    pub fn window(&self) -> &WindowAggregator {
        &self.window
    }
}

impl<I: Iterator<Item = Event>> Iterator for MovingAverages<I> {
    type Item = Average;

    fn next(&mut self) -> Option<Average> {
        let event = self.events.next()?;
        Some(self.window.step(&event))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}

/// Like `MovingAverages`, over fallible events. Yields the first error, then ends.
pub struct TryMovingAverages<I> {
    events: I,
    window: WindowAggregator,
    failed: bool,
}

impl<I: Iterator<Item = Result<Event>>> Iterator for TryMovingAverages<I> {
    type Item = Result<Average>;

    fn next(&mut self) -> Option<Result<Average>> {
        if self.failed {
            return None;
        }
        match self.events.next()? {
            Ok(event) => Some(Ok(self.window.step(&event))),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl<I> std::iter::FusedIterator for TryMovingAverages<I> where
    I: std::iter::FusedIterator<Item = Result<Event>>
{
}

pub trait MovingAverageExt: Iterator + Sized {
    fn moving_averages(self, window: WindowAggregator) -> MovingAverages<Self>
    where
        Self: Iterator<Item = Event>,
    {
        MovingAverages::new(self, window)
    }

    fn try_moving_averages(self, window: WindowAggregator) -> TryMovingAverages<Self>
    where
        Self: Iterator<Item = Result<Event>>,
    {
        TryMovingAverages { events: self, window, failed: false }
    }
}

impl<I: Iterator> MovingAverageExt for I {}
