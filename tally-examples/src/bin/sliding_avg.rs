//! 10-minute trailing average of delivery durations, printed as JSON lines.
//! Run:
//!   cargo run -p tally-examples --bin sliding_avg -- tally-examples/data/events.jsonl
//! Input JSONL fields: timestamp ("%Y-%m-%d %H:%M:%S%.f"), duration (number)

use anyhow::Result;
use tally_core::Executor;
use tally_io::{FileSink, FileSource};
use tally_ops::MovingAverage;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let input = std::env::args().nth(1).unwrap_or_else(|| {
        let p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("data")
            .join("events.jsonl");
        p.to_string_lossy().to_string()
    });

    let mut exec = Executor::new();
    exec.source(FileSource::jsonl(input).await?)
        .operator(MovingAverage::minutes(10)?)
        .sink(FileSink::stdout());

    exec.run().await?;
    Ok(())
}
