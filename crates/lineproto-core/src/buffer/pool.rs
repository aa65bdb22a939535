use std::fmt;
use std::io::Read;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::config::{DEFAULT_MAX_POOLED_READERS, IngestConfig, ReaderConfig};
use crate::io::ChunkedLineReader;
use crate::telemetry;
use crate::telemetry::profile;
use crate::telemetry::tags;

const PROFILE_TAG_STACK_POOL: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_POOL];

/// Type-erased request body accepted by the shared pool.
pub type BoxedSource = Box<dyn Read + Send>;

/// A pool of reusable [`ChunkedLineReader`]s.
///
/// Acquiring binds an idle reader (or a new one) to a source; dropping the
/// returned guard unbinds it and hands it back. Safe to share between
/// threads without further locking. The pool keeps at most `max_readers`
/// idle instances and silently drops the rest.
///
/// # Example
/// ```
/// use lineproto_core::ReaderPool;
///
/// let pool: ReaderPool<&[u8]> = ReaderPool::new(Default::default(), 4);
/// {
///     let mut reader = pool.acquire(&b"cpu v=1\n"[..]);
///     assert!(reader.advance());
///     assert_eq!(reader.current(), b"cpu v=1");
/// } // released here
/// assert_eq!(pool.available(), 1);
/// ```
pub struct ReaderPool<R = BoxedSource> {
    recycler: Sender<ChunkedLineReader<R>>,
    receiver: Receiver<ChunkedLineReader<R>>,
    reader_config: ReaderConfig,
    max_readers: usize,
    metrics: Arc<PoolMetricsInner>,
}

impl<R: Read> ReaderPool<R> {
    /// Creates a pool retaining up to `max_readers` idle readers.
    pub fn new(reader_config: ReaderConfig, max_readers: usize) -> Self {
        let (tx, rx) = bounded(max_readers.max(1));
        Self {
            recycler: tx,
            receiver: rx,
            reader_config,
            max_readers,
            metrics: Arc::new(PoolMetricsInner::default()),
        }
    }

    /// Builds a pool sized by an [`IngestConfig`].
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.reader(), config.max_pooled_readers)
    }

    /// A pool that never retains readers; every acquisition builds a new one.
    pub fn unpooled(reader_config: ReaderConfig) -> Self {
        Self::new(reader_config, 0)
    }

    /// Returns an idle reader bound to `source`, or a new one.
    pub fn acquire(&self, source: R) -> PooledLineReader<R> {
        let started_at = Instant::now();
        let (result, reader) = match self.receiver.try_recv() {
            Ok(mut reader) => {
                reader.reset(source);
                self.metrics.recycled.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_POOL_ACQUIRE_RECYCLED_COUNT,
                    1,
                    &[("subsystem", "pool"), ("op", "acquire"), ("result", "recycled")],
                );
                telemetry::sub_gauge_saturating(
                    tags::METRIC_POOL_ESTIMATED_BYTES,
                    reader.capacity() as u64,
                    &[("subsystem", "pool"), ("op", "acquire")],
                );
                ("recycled", reader)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                telemetry::increment_counter(
                    tags::METRIC_POOL_ACQUIRE_CREATED_COUNT,
                    1,
                    &[("subsystem", "pool"), ("op", "acquire"), ("result", "created")],
                );
                (
                    "created",
                    ChunkedLineReader::from_source(source, self.reader_config),
                )
            }
        };

        let elapsed_us = profile::elapsed_us(started_at);
        telemetry::record_histogram(
            tags::METRIC_POOL_ACQUIRE_LATENCY_US,
            elapsed_us,
            &[("subsystem", "pool"), ("op", "acquire")],
        );
        profile::event(
            tags::PROFILE_POOL,
            &PROFILE_TAG_STACK_POOL,
            "acquire",
            result,
            elapsed_us,
            "reader acquire completed",
        );
        #[cfg(feature = "profiling")]
        if profile::is_tag_stack_enabled(&PROFILE_TAG_STACK_POOL) {
            tracing::debug!(
                target: tags::PROFILE_POOL,
                op = "acquire",
                result,
                reader_id = reader.id(),
                generation = reader.generation(),
                reader_capacity = reader.capacity(),
                "reader acquire completed"
            );
        }

        PooledLineReader {
            generation: reader.generation(),
            reader,
            recycler: (self.max_readers > 0).then(|| self.recycler.clone()),
            max_retained_capacity: self.reader_config.max_retained_capacity,
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Idle readers currently held.
    pub fn available(&self) -> usize {
        self.receiver.len()
    }

    pub fn max_readers(&self) -> usize {
        self.max_readers
    }

    pub fn reader_config(&self) -> ReaderConfig {
        self.reader_config
    }

    /// Returns a snapshot of the pool counters.
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            created: self.metrics.created.load(Ordering::Relaxed),
            recycled: self.metrics.recycled.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
            shrunk: self.metrics.shrunk.load(Ordering::Relaxed),
        }
    }
}

impl ReaderPool<BoxedSource> {
    /// The process-wide pool, created with default sizing on first use.
    pub fn shared() -> Arc<ReaderPool<BoxedSource>> {
        static SHARED: OnceLock<Arc<ReaderPool<BoxedSource>>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| {
            Arc::new(ReaderPool::new(
                ReaderConfig::default(),
                DEFAULT_MAX_POOLED_READERS,
            ))
        }))
    }
}

impl<R> fmt::Debug for ReaderPool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderPool")
            .field("reader_config", &self.reader_config)
            .field("max_readers", &self.max_readers)
            .field("available", &self.receiver.len())
            .finish()
    }
}

/// A snapshot of reader pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolMetricsSnapshot {
    /// Readers constructed because none was idle.
    pub created: usize,
    /// Acquisitions served by an idle reader.
    pub recycled: usize,
    /// Released readers discarded because the pool was full or disabled.
    pub dropped: usize,
    /// Released readers whose buffer was shrunk before reuse.
    pub shrunk: usize,
}

#[derive(Debug, Default)]
struct PoolMetricsInner {
    created: AtomicUsize,
    recycled: AtomicUsize,
    dropped: AtomicUsize,
    shrunk: AtomicUsize,
}

/// A reader checked out of a [`ReaderPool`].
///
/// Dereferences to the [`ChunkedLineReader`]. Dropping it unbinds the source
/// and returns the reader to the pool, on every exit path including unwinding.
/// A reader whose generation changed while checked out is not recycled.
pub struct PooledLineReader<R> {
    reader: ChunkedLineReader<R>,
    generation: u64,
    recycler: Option<Sender<ChunkedLineReader<R>>>,
    max_retained_capacity: usize,
    metrics: Arc<PoolMetricsInner>,
}

impl<R> Deref for PooledLineReader<R> {
    type Target = ChunkedLineReader<R>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<R> DerefMut for PooledLineReader<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

impl<R> fmt::Debug for PooledLineReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledLineReader")
            .field("reader_id", &self.reader.id())
            .field("generation", &self.reader.generation())
            .field("pooled", &self.recycler.is_some())
            .finish()
    }
}

impl<R> Drop for PooledLineReader<R> {
    fn drop(&mut self) {
        let mut reader = std::mem::replace(&mut self.reader, ChunkedLineReader::detached());
        // a holder that reset the reader through DerefMut gets it discarded
        let rebound = reader.generation() != self.generation;
        drop(reader.unbind());
        if reader.shrink_to(self.max_retained_capacity) {
            self.metrics.shrunk.fetch_add(1, Ordering::Relaxed);
            telemetry::increment_counter(
                tags::METRIC_POOL_RECYCLE_SHRUNK_COUNT,
                1,
                &[("subsystem", "pool"), ("op", "recycle"), ("result", "shrunk")],
            );
        }
        let capacity = reader.capacity();

        let recycled = match &self.recycler {
            Some(_) if rebound => false,
            Some(recycler) => match recycler.try_send(reader) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
            },
            None => false,
        };

        if recycled {
            telemetry::increment_counter(
                tags::METRIC_POOL_RECYCLE_OK_COUNT,
                1,
                &[("subsystem", "pool"), ("op", "recycle"), ("result", "recycled")],
            );
            telemetry::add_gauge(
                tags::METRIC_POOL_ESTIMATED_BYTES,
                capacity as u64,
                &[("subsystem", "pool"), ("op", "recycle")],
            );
        } else {
            self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
            telemetry::increment_counter(
                tags::METRIC_POOL_RECYCLE_DROPPED_COUNT,
                1,
                &[("subsystem", "pool"), ("op", "recycle"), ("result", "dropped")],
            );
        }

        profile::event(
            tags::PROFILE_POOL,
            &PROFILE_TAG_STACK_POOL,
            "recycle",
            if recycled { "recycled" } else { "dropped" },
            0,
            "reader released",
        );
    }
}
