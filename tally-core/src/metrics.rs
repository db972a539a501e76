use once_cell::sync::Lazy;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

fn register<C: prometheus::core::Collector + Clone + 'static>(c: C) -> C {
    REGISTRY.register(Box::new(c.clone())).unwrap();
    c
}

pub static RECORDS: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("tally_records_total", "Records passing through the executor"),
            &["stage"],
        )
        .unwrap(),
    )
});

pub static EVICTED: Lazy<IntCounter> = Lazy::new(|| {
    register(
        IntCounter::new("tally_evicted_records_total", "Entries evicted from the trailing window")
            .unwrap(),
    )
});

pub static WINDOW_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    register(
        IntGauge::new("tally_window_entries", "Entries currently held in the trailing window")
            .unwrap(),
    )
});

pub static BYTES_WRITTEN: Lazy<IntCounterVec> = Lazy::new(|| {
    register(
        IntCounterVec::new(
            Opts::new("tally_bytes_written_total", "Total bytes written by sink"),
            &["sink"],
        )
        .unwrap(),
    )
});

pub static OP_PROC_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    register(
        Histogram::with_opts(
            HistogramOpts::new(
                "tally_operator_process_latency_ms",
                "Operator on_element processing latency (ms)",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0]),
        )
        .unwrap(),
    )
});

pub fn render_prometheus() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer).ok();
    String::from_utf8(buffer).unwrap_or_default()
}
