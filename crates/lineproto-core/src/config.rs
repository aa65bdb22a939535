use serde::{Deserialize, Serialize};

/// Lines carrying this many tags or more are rejected.
pub const DEFAULT_MAX_TAGS: usize = 32;
pub const DEFAULT_INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 4 * 1024 * 1024;
pub const DEFAULT_MAX_POOLED_READERS: usize = 256;
pub const DEFAULT_MAX_REPORTED_FAILURES: usize = 100;

/// Tunables for the ingestion path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Tag-count ceiling per line.
    pub max_tags: usize,
    /// Scratch capacity of a freshly created reader.
    pub initial_buffer_capacity: usize,
    /// Longest line a reader accepts before failing the request.
    pub max_line_bytes: usize,
    /// Readers whose buffer grew past this are shrunk before going back to the pool.
    pub max_retained_capacity: usize,
    /// Idle readers kept by the pool.
    pub max_pooled_readers: usize,
    /// Line failures recorded verbatim in a batch summary; the rest are only counted.
    pub max_reported_failures: usize,
    /// Keep raw field pairs on parsed metrics.
    pub capture_fields: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_tags: DEFAULT_MAX_TAGS,
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER_CAPACITY,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_retained_capacity: DEFAULT_MAX_RETAINED_CAPACITY,
            max_pooled_readers: DEFAULT_MAX_POOLED_READERS,
            max_reported_failures: DEFAULT_MAX_REPORTED_FAILURES,
            capture_fields: false,
        }
    }
}

/// Sizing of pooled readers, derived from [`IngestConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    pub initial_capacity: usize,
    pub max_line_bytes: usize,
    pub max_retained_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        IngestConfig::default().reader()
    }
}

impl IngestConfig {
    pub fn reader(&self) -> ReaderConfig {
        ReaderConfig {
            initial_capacity: self.initial_buffer_capacity.max(1),
            max_line_bytes: self.max_line_bytes.max(1),
            max_retained_capacity: self
                .max_retained_capacity
                .max(self.initial_buffer_capacity.max(1)),
        }
    }
}
