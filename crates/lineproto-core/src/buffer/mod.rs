//! Reuse of line readers across ingestion requests.

pub mod pool;

pub use pool::{BoxedSource, PoolMetricsSnapshot, PooledLineReader, ReaderPool};
