pub mod buffer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod protocol;
pub mod telemetry;
pub mod types;

pub use buffer::{BoxedSource, PoolMetricsSnapshot, PooledLineReader, ReaderPool};
pub use config::{IngestConfig, ReaderConfig};
pub use error::IngestError;
pub use ingest::{IngestBatch, IngestRequest, IngestSummary, Ingestor, LineFailure};
pub use io::ChunkedLineReader;
pub use protocol::{Clock, FixedClock, LineParser, ParseError, Precision, SystemClock};
pub use telemetry::ingest::{DefaultIngestTelemetry, IngestTelemetry, Tee};
pub use types::{Field, Metric, ParseOutcome, Result, Tags};
