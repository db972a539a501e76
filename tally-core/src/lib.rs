//! tally-core: fundamental types, seams and the sequential executor.
//!
//! Provides the pieces every tally pipeline is built from:
//! - `Event` (input) and `Average` (output), with their text formats
//! - Traits: `Source`, `Operator`, `Sink`
//! - `Executor`, which pulls one event at a time and pushes it through to the sink
//!
//! Quick example:
//! ```no_run
//! use tally_core::{Average, Event, Executor, Operator, Result, Sink, Source};
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! struct Empty;
//! #[async_trait::async_trait]
//! impl Source for Empty {
//!     async fn next_event(&mut self) -> Result<Option<Event>> { Ok(None) }
//! }
//!
//! struct Echo;
//! impl Operator for Echo {
//!     fn on_element(&mut self, event: Event) -> Result<Average> {
//!         Ok(Average::for_event(&event, event.duration))
//!     }
//! }
//!
//! struct Discard;
//! #[async_trait::async_trait]
//! impl Sink for Discard {
//!     async fn on_element(&mut self, _record: Average) -> Result<()> { Ok(()) }
//! }
//!
//! let mut exec = Executor::new();
//! exec.source(Empty).operator(Echo).sink(Discard);
//! exec.run().await?;
//! # Ok(()) }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod record;

use std::time::Instant;

pub use error::{Error, Result};
pub use record::{Average, Event};

/// Pull-based event source. `Ok(None)` marks the end of input.
#[async_trait::async_trait]
pub trait Source: Send {
    async fn next_event(&mut self) -> Result<Option<Event>>;
}

/// Turns each event into exactly one output record.
pub trait Operator: Send {
    fn on_element(&mut self, event: Event) -> Result<Average>;
}

#[async_trait::async_trait]
pub trait Sink: Send {
    async fn on_element(&mut self, record: Average) -> Result<()>;
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub records: u64,
}

/// Drives a source through one operator into a sink, one event at a time.
///
/// Nothing is read ahead: the next event is pulled only after the previous
/// output record has been handed to the sink.
pub struct Executor {
    source: Option<Box<dyn Source>>,
    operator: Option<Box<dyn Operator>>,
    sink: Option<Box<dyn Sink>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self { source: None, operator: None, sink: None }
    }

    pub fn source<S: Source + 'static>(&mut self, s: S) -> &mut Self {
        self.source = Some(Box::new(s));
        self
    }

    pub fn operator<O: Operator + 'static>(&mut self, o: O) -> &mut Self {
        self.operator = Some(Box::new(o));
        self
    }

    pub fn sink<K: Sink + 'static>(&mut self, s: K) -> &mut Self {
        self.sink = Some(Box::new(s));
        self
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut source = self.source.take().ok_or_else(|| Error::invalid_config("no source"))?;
        let mut op = self.operator.take().ok_or_else(|| Error::invalid_config("no operator"))?;
        let mut sink = self.sink.take().ok_or_else(|| Error::invalid_config("no sink"))?;

        let mut summary = RunSummary::default();
        while let Some(event) = source.next_event().await? {
            metrics::RECORDS.with_label_values(&["read"]).inc();

            let started = Instant::now();
            let out = op.on_element(event)?;
            metrics::OP_PROC_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1_000.0);

            sink.on_element(out).await?;
            metrics::RECORDS.with_label_values(&["emit"]).inc();
            summary.records += 1;
        }
        sink.flush().await?;
        tracing::info!(records = summary.records, "executor drained source");
        Ok(summary)
    }
}

pub mod prelude {
    pub use super::{Average, Error, Event, Executor, Operator, Result, RunSummary, Sink, Source};
}
