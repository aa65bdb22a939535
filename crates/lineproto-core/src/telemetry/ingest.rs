use std::time::Duration;

use crate::error::IngestError;
use crate::ingest::IngestSummary;
use crate::protocol::ParseError;
use crate::telemetry;
use crate::telemetry::profile;
use crate::telemetry::tags;

const PROFILE_TAG_STACK_INGEST: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_INGEST];

/// Observer of per-line and per-request ingestion outcomes.
///
/// Malformed lines never abort a batch; this hook is where they become
/// visible to counters, logs, or a caller-supplied collector.
pub trait IngestTelemetry: Send + Sync {
    fn on_line_parsed(&self);
    fn on_line_skipped(&self);
    /// `line` is 1-based; `content` is only valid for the duration of the call.
    fn on_line_failed(&self, line: u64, error: ParseError, content: &[u8]);
    fn on_request_finished(
        &self,
        summary: &IngestSummary,
        elapsed: Duration,
        error: Option<&IngestError>,
    );
}

/// Reports ingestion outcomes to the telemetry registry and `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultIngestTelemetry;

impl IngestTelemetry for DefaultIngestTelemetry {
    fn on_line_parsed(&self) {
        telemetry::increment_counter(
            tags::METRIC_INGEST_LINE_PARSED_COUNT,
            1,
            &[("subsystem", "ingest"), ("result", "parsed")],
        );
    }

    fn on_line_skipped(&self) {
        telemetry::increment_counter(
            tags::METRIC_INGEST_LINE_SKIPPED_COUNT,
            1,
            &[("subsystem", "ingest"), ("result", "skipped")],
        );
    }

    fn on_line_failed(&self, line: u64, error: ParseError, content: &[u8]) {
        telemetry::increment_counter(
            tags::METRIC_INGEST_LINE_FAILED_COUNT,
            1,
            &[
                ("subsystem", "ingest"),
                ("result", "failed"),
                ("kind", error.as_str()),
            ],
        );
        tracing::debug!(
            target: "lineproto::ingest",
            line,
            kind = error.as_str(),
            content = %String::from_utf8_lossy(&content[..content.len().min(256)]),
            "dropping malformed line"
        );
    }

    fn on_request_finished(
        &self,
        summary: &IngestSummary,
        elapsed: Duration,
        error: Option<&IngestError>,
    ) {
        let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        let result = if error.is_some() { "error" } else { "ok" };

        telemetry::increment_counter(
            tags::METRIC_INGEST_REQUEST_COUNT,
            1,
            &[("subsystem", "ingest"), ("op", "request"), ("result", result)],
        );
        telemetry::record_histogram(
            tags::METRIC_INGEST_REQUEST_LATENCY_US,
            elapsed_us,
            &[("subsystem", "ingest"), ("op", "request")],
        );
        telemetry::record_histogram(
            tags::METRIC_INGEST_BATCH_SIZE,
            summary.parsed,
            &[("subsystem", "ingest"), ("op", "request")],
        );

        if let Some(error) = error {
            telemetry::increment_counter(
                tags::METRIC_INGEST_REQUEST_ERROR_COUNT,
                1,
                &[("subsystem", "ingest"), ("op", "request"), ("result", "error")],
            );
            tracing::warn!(
                target: "lineproto::ingest",
                lines = summary.lines,
                parsed = summary.parsed,
                %error,
                "ingest request ended with a stream error"
            );
        }
        if summary.failed > 0 {
            tracing::debug!(
                target: "lineproto::ingest",
                lines = summary.lines,
                failed = summary.failed,
                "ingest request dropped malformed lines"
            );
        }

        profile::event(
            tags::PROFILE_INGEST,
            &PROFILE_TAG_STACK_INGEST,
            "request",
            result,
            elapsed_us,
            "ingest request completed",
        );
    }
}

/// Forwards every callback to both observers.
#[derive(Debug, Clone, Copy)]
pub struct Tee<A, B>(pub A, pub B);

impl<A: IngestTelemetry, B: IngestTelemetry> IngestTelemetry for Tee<A, B> {
    fn on_line_parsed(&self) {
        self.0.on_line_parsed();
        self.1.on_line_parsed();
    }

    fn on_line_skipped(&self) {
        self.0.on_line_skipped();
        self.1.on_line_skipped();
    }

    fn on_line_failed(&self, line: u64, error: ParseError, content: &[u8]) {
        self.0.on_line_failed(line, error, content);
        self.1.on_line_failed(line, error, content);
    }

    fn on_request_finished(
        &self,
        summary: &IngestSummary,
        elapsed: Duration,
        error: Option<&IngestError>,
    ) {
        self.0.on_request_finished(summary, elapsed, error);
        self.1.on_request_finished(summary, elapsed, error);
    }
}
