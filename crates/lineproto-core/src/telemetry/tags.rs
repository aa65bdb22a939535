/// Profiling target for reader pool operations.
pub const PROFILE_POOL: &str = "lineproto.profile.pool";
/// Profiling target for chunked reader refills.
pub const PROFILE_READER: &str = "lineproto.profile.reader";
/// Profiling target for request-level ingestion.
pub const PROFILE_INGEST: &str = "lineproto.profile.ingest";

/// Global system-level tag shared by all profiling events.
pub const TAG_SYSTEM: &str = "system";
/// Logical tag for reader pool events.
pub const TAG_POOL: &str = "pool";
/// Logical tag for chunked reader events.
pub const TAG_READER: &str = "reader";
/// Logical tag for ingestion events.
pub const TAG_INGEST: &str = "ingest";

pub const METRIC_POOL_ACQUIRE_CREATED_COUNT: &str = "lineproto.pool.acquire.created.count";
pub const METRIC_POOL_ACQUIRE_RECYCLED_COUNT: &str = "lineproto.pool.acquire.recycled.count";
pub const METRIC_POOL_RECYCLE_OK_COUNT: &str = "lineproto.pool.recycle.ok.count";
pub const METRIC_POOL_RECYCLE_DROPPED_COUNT: &str = "lineproto.pool.recycle.dropped.count";
pub const METRIC_POOL_RECYCLE_SHRUNK_COUNT: &str = "lineproto.pool.recycle.shrunk.count";
pub const METRIC_POOL_ACQUIRE_LATENCY_US: &str = "lineproto.pool.acquire.latency_us";
pub const METRIC_POOL_ESTIMATED_BYTES: &str = "lineproto.pool.estimated_bytes";

pub const METRIC_READER_FILL_COUNT: &str = "lineproto.reader.fill.count";
pub const METRIC_READER_FILL_BYTES: &str = "lineproto.reader.fill.bytes";
pub const METRIC_READER_GROW_COUNT: &str = "lineproto.reader.grow.count";
pub const METRIC_READER_ERROR_COUNT: &str = "lineproto.reader.error.count";

pub const METRIC_INGEST_REQUEST_COUNT: &str = "lineproto.ingest.request.count";
pub const METRIC_INGEST_REQUEST_ERROR_COUNT: &str = "lineproto.ingest.request.error.count";
pub const METRIC_INGEST_REQUEST_LATENCY_US: &str = "lineproto.ingest.request.latency_us";
pub const METRIC_INGEST_LINE_PARSED_COUNT: &str = "lineproto.ingest.line.parsed.count";
pub const METRIC_INGEST_LINE_SKIPPED_COUNT: &str = "lineproto.ingest.line.skipped.count";
pub const METRIC_INGEST_LINE_FAILED_COUNT: &str = "lineproto.ingest.line.failed.count";
pub const METRIC_INGEST_BATCH_SIZE: &str = "lineproto.ingest.batch.size";
