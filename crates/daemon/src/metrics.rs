//! Prometheus metrics export.
//!
//! There is no listener; after every tick the text exposition is written to
//! a file for the node exporter's textfile collector.

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntGauge, Registry, TextEncoder};
use std::fs;
use std::io;
use std::path::Path;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Unix time of the last completed tick.
pub static LAST_TICK_TIMESTAMP: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "plotherd_last_tick_timestamp_seconds",
        "Unix time of the last completed scheduler tick",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(LAST_TICK_TIMESTAMP.clone()))
        .unwrap();

    // Core metrics (jobs, archive, scheduler)
    for metric in plotherd_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Replaces `path` with the current exposition. The file is written next to
/// the target and renamed so the collector never reads a partial file.
pub fn write_textfile(path: &Path) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, encode_metrics())?;
    fs::rename(&tmp, path)
}
