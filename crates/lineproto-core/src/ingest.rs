//! Request-level ingestion: body decoding, line iteration and outcome
//! bookkeeping on top of the reader pool and the line parser.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use flate2::read::MultiGzDecoder;
use serde::Serialize;

use crate::buffer::{BoxedSource, ReaderPool};
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::protocol::{LineParser, ParseError, precision_multiplier};
use crate::telemetry::{DefaultIngestTelemetry, IngestTelemetry};
use crate::types::{Metric, ParseOutcome, Result};

/// Parameters of one ingestion request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestRequest {
    /// Target database, copied onto every metric.
    pub namespace: String,
    /// Timestamp unit of the body (`ns`, `us`, `ms`, `s`, `m`, `h`).
    pub precision: Option<String>,
    /// Value of the `Content-Encoding` header.
    pub content_encoding: Option<String>,
}

impl IngestRequest {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn with_precision(mut self, precision: impl Into<String>) -> Self {
        self.precision = Some(precision.into());
        self
    }

    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    /// Builds a request from a `db=...&precision=...` query string.
    ///
    /// Unknown keys are ignored. Values are taken verbatim, without
    /// percent-decoding.
    pub fn from_query(query: &str, content_encoding: Option<&str>) -> Self {
        let mut request = Self {
            content_encoding: content_encoding.map(str::to_owned),
            ..Self::default()
        };
        for pair in query.trim_start_matches('?').split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "db" => request.namespace = value.to_owned(),
                "precision" if !value.is_empty() => request.precision = Some(value.to_owned()),
                _ => {}
            }
        }
        request
    }

    pub fn is_gzip(&self) -> bool {
        self.content_encoding
            .as_deref()
            .is_some_and(|encoding| encoding.trim().eq_ignore_ascii_case("gzip"))
    }
}

/// One rejected line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    /// 1-based line number within the (decompressed) body.
    pub line: u64,
    pub error: ParseError,
}

/// Per-request line accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub lines: u64,
    pub parsed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub failures_by_kind: BTreeMap<ParseError, u64>,
    /// The first failures in line order, capped by `max_reported_failures`.
    pub failures: Vec<LineFailure>,
}

impl IngestSummary {
    /// Folds another summary into this one, keeping at most `max_failures` records.
    pub fn merge(&mut self, other: &IngestSummary, max_failures: usize) {
        self.lines += other.lines;
        self.parsed += other.parsed;
        self.skipped += other.skipped;
        self.failed += other.failed;
        for (kind, count) in &other.failures_by_kind {
            *self.failures_by_kind.entry(*kind).or_insert(0) += count;
        }
        let room = max_failures.saturating_sub(self.failures.len());
        self.failures
            .extend(other.failures.iter().take(room).copied());
    }

    /// Failures counted but not kept as records.
    pub fn unreported_failures(&self) -> u64 {
        self.failed.saturating_sub(self.failures.len() as u64)
    }

    fn record_failure(&mut self, line: u64, error: ParseError, max_failures: usize) {
        self.failed += 1;
        *self.failures_by_kind.entry(error).or_insert(0) += 1;
        if self.failures.len() < max_failures {
            self.failures.push(LineFailure { line, error });
        }
    }
}

/// Everything one request produced.
///
/// `metrics` holds every line parsed before the stream ended, including when
/// it ended with `error`.
#[derive(Debug)]
pub struct IngestBatch {
    pub metrics: Vec<Metric>,
    pub summary: IngestSummary,
    pub error: Option<IngestError>,
}

impl IngestBatch {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Discards partial output when the stream failed.
    pub fn into_result(self) -> Result<(Vec<Metric>, IngestSummary)> {
        match self.error {
            Some(error) => Err(error),
            None => Ok((self.metrics, self.summary)),
        }
    }
}

/// Turns request bodies into metric batches.
///
/// Cheap to clone; clones share the reader pool and telemetry sink.
#[derive(Clone)]
pub struct Ingestor {
    pool: Arc<ReaderPool<BoxedSource>>,
    parser: LineParser,
    telemetry: Arc<dyn IngestTelemetry>,
    max_reported_failures: usize,
}

impl Ingestor {
    /// Creates an ingestor with its own pool sized from `config`.
    pub fn new(config: &IngestConfig) -> Self {
        Self {
            pool: Arc::new(ReaderPool::from_config(config)),
            parser: LineParser::new(config.max_tags).with_field_capture(config.capture_fields),
            telemetry: Arc::new(DefaultIngestTelemetry),
            max_reported_failures: config.max_reported_failures,
        }
    }

    /// Uses `pool` instead of the ingestor's own.
    pub fn with_pool(mut self, pool: Arc<ReaderPool<BoxedSource>>) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn IngestTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_parser(mut self, parser: LineParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn pool(&self) -> &Arc<ReaderPool<BoxedSource>> {
        &self.pool
    }

    pub fn parser(&self) -> &LineParser {
        &self.parser
    }

    /// Reads `body` to the end and parses every line.
    ///
    /// Malformed lines are counted and skipped. A read or decompression
    /// failure stops the request and lands in [`IngestBatch::error`].
    pub fn ingest<B>(&self, body: B, request: &IngestRequest) -> IngestBatch
    where
        B: Read + Send + 'static,
    {
        let started_at = Instant::now();
        let gzip = request.is_gzip();
        let source: BoxedSource = if gzip {
            Box::new(MultiGzDecoder::new(body))
        } else {
            Box::new(body)
        };
        let multiplier = precision_multiplier(request.precision.as_deref());

        let mut metrics = Vec::new();
        let mut summary = IngestSummary::default();
        let mut reader = self.pool.acquire(source);

        while reader.advance() {
            summary.lines += 1;
            match self
                .parser
                .parse_line(reader.current(), &request.namespace, multiplier)
            {
                ParseOutcome::Parsed(metric) => {
                    summary.parsed += 1;
                    metrics.push(metric);
                    self.telemetry.on_line_parsed();
                }
                ParseOutcome::Skip => {
                    summary.skipped += 1;
                    self.telemetry.on_line_skipped();
                }
                ParseOutcome::Fail(error) => {
                    let line = reader.line_number();
                    summary.record_failure(line, error, self.max_reported_failures);
                    self.telemetry.on_line_failed(line, error, reader.current());
                }
            }
        }

        let error = reader.take_error().map(|err| {
            let context = if gzip {
                "corrupted gzip data"
            } else {
                "failed to read request body"
            };
            IngestError::from(err).with_context(context)
        });
        drop(reader);

        self.telemetry
            .on_request_finished(&summary, started_at.elapsed(), error.as_ref());

        IngestBatch {
            metrics,
            summary,
            error,
        }
    }
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(&IngestConfig::default())
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("pool", &self.pool)
            .field("parser", &self.parser)
            .field("max_reported_failures", &self.max_reported_failures)
            .finish_non_exhaustive()
    }
}
