//! Parse metrics using metrics-rs.
//!
//! The library only emits through the `metrics` facade. The CLI installs
//! [`CliRecorder`] when `--metrics` is given and prints what was collected.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;

use crate::source::SourceEnd;
use crate::stream::StreamDiagnostics;

/// Register metric descriptions. Call once at startup.
pub fn init() {
    describe_counter!(
        "tracecomp_lines_total",
        Unit::Count,
        "Transcript lines consumed"
    );
    describe_counter!(
        "tracecomp_records_total",
        Unit::Count,
        "Commit records emitted, by kind (extracted, synthesized)"
    );
    describe_counter!(
        "tracecomp_noise_lines_total",
        Unit::Count,
        "Prompt, echo, exception and blank lines dropped"
    );
    describe_counter!(
        "tracecomp_malformed_lines_total",
        Unit::Count,
        "Retained lines skipped in lenient mode"
    );
    describe_counter!(
        "tracecomp_regions_total",
        Unit::Count,
        "Excluded regions encountered"
    );
    describe_counter!(
        "tracecomp_source_end_total",
        Unit::Count,
        "Live transcripts ended, by reason"
    );
    describe_gauge!(
        "tracecomp_parse_seconds",
        Unit::Seconds,
        "Wall-clock time of the last parse"
    );
    describe_histogram!(
        "tracecomp_region_length",
        Unit::Count,
        "Placeholders emitted per excluded region"
    );
}

/// Record the counters of a finished parse.
pub fn record_parse(diag: &StreamDiagnostics, elapsed: Duration) {
    counter!("tracecomp_lines_total").increment(diag.total_lines);
    counter!("tracecomp_records_total", "kind" => "extracted").increment(diag.retained_lines);
    counter!("tracecomp_records_total", "kind" => "synthesized")
        .increment(diag.suppressed_in_region);
    counter!("tracecomp_noise_lines_total").increment(diag.noise_lines);
    counter!("tracecomp_malformed_lines_total").increment(diag.malformed_skipped);
    counter!("tracecomp_regions_total").increment(diag.regions.len() as u64);
    for region in &diag.regions {
        histogram!("tracecomp_region_length").record(region.suppressed as f64);
    }
    gauge!("tracecomp_parse_seconds").set(elapsed.as_secs_f64());
}

/// Record how a live transcript ended.
pub fn record_source_end(end: SourceEnd) {
    let reason = match end {
        SourceEnd::Exhausted => "exhausted",
        SourceEnd::Cancelled => "cancelled",
        SourceEnd::TimedOut => "timed_out",
    };
    counter!("tracecomp_source_end_total", "reason" => reason).increment(1);
}

// ============================================================================
// CLI recorder
// ============================================================================

#[derive(Default)]
struct Storage {
    counters: RwLock<BTreeMap<String, u64>>,
    gauges: RwLock<BTreeMap<String, f64>>,
    histograms: RwLock<BTreeMap<String, Vec<f64>>>,
}

struct Handle {
    key: String,
    storage: Arc<Storage>,
}

impl metrics::CounterFn for Handle {
    fn increment(&self, value: u64) {
        *self.storage.counters.write().entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        self.storage.counters.write().insert(self.key.clone(), value);
    }
}

impl metrics::GaugeFn for Handle {
    fn increment(&self, value: f64) {
        *self.storage.gauges.write().entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self.storage.gauges.write().entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.storage.gauges.write().insert(self.key.clone(), value);
    }
}

impl metrics::HistogramFn for Handle {
    fn record(&self, value: f64) {
        self.storage
            .histograms
            .write()
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}

/// In-memory recorder for printing a summary at exit.
#[derive(Default)]
pub struct CliRecorder {
    storage: Arc<Storage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the global recorder. Returns `None` if one is already set.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let storage = Arc::clone(&self.storage);
        metrics::set_global_recorder(self).ok()?;
        Some(CliRecorderHandle { storage })
    }

    fn handle(&self, key: &Key) -> Arc<Handle> {
        Arc::new(Handle {
            key: key_to_string(key),
            storage: Arc::clone(&self.storage),
        })
    }
}

fn key_to_string(key: &Key) -> String {
    let labels: Vec<String> = key
        .labels()
        .map(|l| format!("{}={}", l.key(), l.value()))
        .collect();
    if labels.is_empty() {
        key.name().to_string()
    } else {
        format!("{}{{{}}}", key.name(), labels.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}

/// Access to what an installed [`CliRecorder`] collected.
pub struct CliRecorderHandle {
    storage: Arc<Storage>,
}

impl CliRecorderHandle {
    pub fn counter(&self, key: &str) -> Option<u64> {
        self.storage.counters.read().get(key).copied()
    }

    pub fn gauge(&self, key: &str) -> Option<f64> {
        self.storage.gauges.read().get(key).copied()
    }

    /// Print collected metrics to stderr, keys sorted.
    pub fn print_summary(&self) {
        let counters = self.storage.counters.read();
        let gauges = self.storage.gauges.read();
        let histograms = self.storage.histograms.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            eprintln!("No metrics collected.");
            return;
        }

        eprintln!();
        eprintln!("## Metrics Summary");
        for (key, value) in counters.iter() {
            eprintln!("  {key}: {value}");
        }
        for (key, value) in gauges.iter() {
            eprintln!("  {key}: {value:.6}");
        }
        for (key, values) in histograms.iter().filter(|(_, v)| !v.is_empty()) {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let avg = values.iter().sum::<f64>() / values.len() as f64;
            eprintln!(
                "  {key}: count={}, min={min:.0}, max={max:.0}, avg={avg:.2}",
                values.len()
            );
        }
    }
}
