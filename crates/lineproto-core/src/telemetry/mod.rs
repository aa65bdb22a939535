//! Process-wide counters, gauges and histograms for the ingestion path.
//!
//! Recording is a no-op unless the `telemetry` feature is enabled, so the
//! hot path pays nothing in default builds. Profiling events (feature
//! `profiling`) are emitted through `tracing`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub mod ingest;
pub mod profile;
pub mod tags;

pub use ingest::{DefaultIngestTelemetry, IngestTelemetry};

/// Histogram summary captured in telemetry snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub total: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Point-in-time copy of every recorded metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
}

impl TelemetrySnapshot {
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(name).copied()
    }

    pub fn histogram(&self, name: &str) -> Option<HistogramSnapshot> {
        self.histograms.get(name).copied()
    }
}

/// Increments a named counter by `value`.
///
/// Labels document the call site; the in-process registry keys on name only.
#[inline]
pub fn increment_counter(name: &'static str, value: u64, _labels: &[(&str, &str)]) {
    #[cfg(feature = "telemetry")]
    registry::update(|metrics| metrics.count(name, value));

    let _ = (name, value);
}

/// Records a histogram sample.
#[inline]
pub fn record_histogram(name: &'static str, value: u64, _labels: &[(&str, &str)]) {
    #[cfg(feature = "telemetry")]
    registry::update(|metrics| metrics.observe(name, value));

    let _ = (name, value);
}

/// Sets a gauge to an absolute value.
#[inline]
pub fn set_gauge(name: &'static str, value: u64, _labels: &[(&str, &str)]) {
    #[cfg(feature = "telemetry")]
    registry::update(|metrics| {
        metrics.gauges.insert(name, value);
    });

    let _ = (name, value);
}

/// Adds `delta` to a gauge.
#[inline]
pub fn add_gauge(name: &'static str, delta: u64, _labels: &[(&str, &str)]) {
    #[cfg(feature = "telemetry")]
    registry::update(|metrics| {
        let gauge = metrics.gauges.entry(name).or_insert(0);
        *gauge = gauge.saturating_add(delta);
    });

    let _ = (name, delta);
}

/// Subtracts `delta` from a gauge, flooring at zero.
#[inline]
pub fn sub_gauge_saturating(name: &'static str, delta: u64, _labels: &[(&str, &str)]) {
    #[cfg(feature = "telemetry")]
    registry::update(|metrics| {
        let gauge = metrics.gauges.entry(name).or_insert(0);
        *gauge = gauge.saturating_sub(delta);
    });

    let _ = (name, delta);
}

/// Returns a snapshot of everything recorded so far.
pub fn snapshot() -> TelemetrySnapshot {
    #[cfg(feature = "telemetry")]
    {
        registry::read(registry::Metrics::snapshot)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        TelemetrySnapshot::default()
    }
}

/// Clears all recorded metrics.
pub fn reset() {
    #[cfg(feature = "telemetry")]
    registry::update(|metrics| *metrics = registry::Metrics::default());
}

#[cfg(feature = "telemetry")]
mod registry {
    use std::collections::BTreeMap;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    use super::{HistogramSnapshot, TelemetrySnapshot};

    #[derive(Debug, Clone, Copy, Default)]
    struct Summary {
        count: u64,
        total: u64,
        min: u64,
        max: u64,
    }

    #[derive(Debug, Default)]
    pub(super) struct Metrics {
        counters: BTreeMap<&'static str, u64>,
        pub(super) gauges: BTreeMap<&'static str, u64>,
        histograms: BTreeMap<&'static str, Summary>,
    }

    impl Metrics {
        pub(super) fn count(&mut self, name: &'static str, value: u64) {
            let counter = self.counters.entry(name).or_insert(0);
            *counter = counter.saturating_add(value);
        }

        pub(super) fn observe(&mut self, name: &'static str, value: u64) {
            let summary = self.histograms.entry(name).or_default();
            if summary.count == 0 {
                summary.min = value;
                summary.max = value;
            } else {
                summary.min = summary.min.min(value);
                summary.max = summary.max.max(value);
            }
            summary.count = summary.count.saturating_add(1);
            summary.total = summary.total.saturating_add(value);
        }

        pub(super) fn snapshot(&self) -> TelemetrySnapshot {
            let owned = |map: &BTreeMap<&'static str, u64>| -> BTreeMap<String, u64> {
                map.iter()
                    .map(|(name, value)| ((*name).to_owned(), *value))
                    .collect()
            };

            TelemetrySnapshot {
                counters: owned(&self.counters),
                gauges: owned(&self.gauges),
                histograms: self
                    .histograms
                    .iter()
                    .map(|(name, summary)| {
                        let mean = if summary.count == 0 {
                            0.0
                        } else {
                            summary.total as f64 / summary.count as f64
                        };
                        (
                            (*name).to_owned(),
                            HistogramSnapshot {
                                count: summary.count,
                                total: summary.total,
                                min: summary.min,
                                max: summary.max,
                                mean,
                            },
                        )
                    })
                    .collect(),
            }
        }
    }

    fn lock() -> MutexGuard<'static, Metrics> {
        static METRICS: OnceLock<Mutex<Metrics>> = OnceLock::new();
        let metrics = METRICS.get_or_init(|| Mutex::new(Metrics::default()));
        match metrics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(super) fn update(apply: impl FnOnce(&mut Metrics)) {
        apply(&mut lock());
    }

    pub(super) fn read<T>(view: impl FnOnce(&Metrics) -> T) -> T {
        view(&lock())
    }
}
