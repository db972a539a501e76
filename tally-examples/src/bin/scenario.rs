//! The two-minute window walkthrough, driven through the iterator adapter with no I/O.
//! Prints 10, 15 and 25: the third event pushes the first one out of the window.

use anyhow::Result;
use tally_core::record::parse_event_time;
use tally_core::Event;
use tally_ops::{MovingAverageExt, WindowAggregator};

fn main() -> Result<()> {
    let events = [
        ("2024-01-01 00:00:00.0", 10.0),
        ("2024-01-01 00:01:00.0", 20.0),
        ("2024-01-01 00:02:30.0", 30.0),
    ]
    .into_iter()
    .map(|(ts, d)| -> Result<Event> { Ok(Event::new(parse_event_time(ts)?, d)) })
    .collect::<Result<Vec<_>>>()?;

    for avg in events.into_iter().moving_averages(WindowAggregator::from_minutes(2)?) {
        println!("{} -> {}", avg.minute, avg.average);
    }
    Ok(())
}
