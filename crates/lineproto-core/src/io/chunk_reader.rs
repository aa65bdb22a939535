use std::io::{self, Read};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};

use memchr::memchr;

use crate::config::ReaderConfig;
use crate::telemetry;
use crate::telemetry::profile;
use crate::telemetry::tags;

const PROFILE_TAG_STACK_READER: [&str; 2] = [tags::TAG_SYSTEM, tags::TAG_READER];

static NEXT_READER_ID: AtomicU64 = AtomicU64::new(1);

/// Splits a byte source into `\n`-terminated lines.
///
/// Bytes are pulled from the source into one scratch buffer that is reused
/// line after line and grows only when a single line does not fit. A line
/// returned by [`current`](Self::current) borrows that buffer, so it is gone
/// by the next [`advance`](Self::advance).
///
/// # Example
/// ```
/// use lineproto_core::ChunkedLineReader;
///
/// let mut reader = ChunkedLineReader::new(16);
/// reader.reset(&b"cpu v=1\nmem v=2"[..]);
/// let mut lines = Vec::new();
/// while reader.advance() {
///     lines.push(reader.current().to_vec());
/// }
/// assert_eq!(lines, [b"cpu v=1".to_vec(), b"mem v=2".to_vec()]);
/// assert!(reader.last_error().is_none());
/// ```
#[derive(Debug)]
pub struct ChunkedLineReader<R> {
    source: Option<R>,
    buf: Vec<u8>,
    /// First byte not yet handed out as part of a line.
    start: usize,
    /// Bytes in `buf[..end]` came from the current source.
    end: usize,
    /// Bytes in `buf[start..scan_from]` are known to contain no newline.
    scan_from: usize,
    line: Range<usize>,
    line_number: u64,
    eof: bool,
    error: Option<io::Error>,
    config: ReaderConfig,
    id: u64,
    generation: u64,
}

impl<R> ChunkedLineReader<R> {
    /// Creates an unbound reader with `capacity` bytes of scratch space.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(ReaderConfig {
            initial_capacity: capacity.max(1),
            ..ReaderConfig::default()
        })
    }

    pub fn with_config(config: ReaderConfig) -> Self {
        Self {
            source: None,
            buf: vec![0; config.initial_capacity.max(1)],
            start: 0,
            end: 0,
            scan_from: 0,
            line: 0..0,
            line_number: 0,
            eof: false,
            error: None,
            config,
            id: NEXT_READER_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        }
    }

    /// Creates a bound reader.
    pub fn from_source(source: R, config: ReaderConfig) -> Self {
        let mut reader = Self::with_config(config);
        reader.reset(source);
        reader
    }

    /// Binds a new source, discarding everything left from the previous one.
    ///
    /// Only the scratch capacity survives.
    pub fn reset(&mut self, source: R) {
        self.clear();
        self.source = Some(source);
    }

    /// Alias of [`reset`](Self::reset) for a reader that was never bound.
    pub fn bind(&mut self, source: R) {
        self.reset(source);
    }

    /// Detaches and returns the source, clearing all reader state.
    pub fn unbind(&mut self) -> Option<R> {
        self.clear();
        self.source.take()
    }

    fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
        self.scan_from = 0;
        self.line = 0..0;
        self.line_number = 0;
        self.eof = false;
        self.error = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// The line found by the last successful [`advance`](Self::advance),
    /// without its terminator.
    pub fn current(&self) -> &[u8] {
        &self.buf[self.line.clone()]
    }

    /// 1-based number of the current line within the bound source.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// The source failure that stopped reading, if any. A clean end of
    /// stream leaves this empty.
    pub fn last_error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn is_bound(&self) -> bool {
        self.source.is_some()
    }

    /// Current scratch size in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Shrinks the scratch buffer back to `limit` bytes when it grew past it.
    ///
    /// Only valid on a reader with no buffered data.
    pub(crate) fn shrink_to(&mut self, limit: usize) -> bool {
        if self.buf.len() <= limit || self.end > 0 {
            return false;
        }
        self.buf.truncate(limit.max(1));
        self.buf.shrink_to_fit();
        true
    }

    /// Process-unique identity of this reader instance.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of times this reader has been reset.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// A placeholder that owns no allocation; used when a pooled reader is
    /// moved out of its guard.
    pub(crate) fn detached() -> Self {
        Self {
            source: None,
            buf: Vec::new(),
            start: 0,
            end: 0,
            scan_from: 0,
            line: 0..0,
            line_number: 0,
            eof: true,
            error: None,
            config: ReaderConfig::default(),
            id: 0,
            generation: 0,
        }
    }

    fn emit(&mut self, mut line: Range<usize>) {
        if line.end > line.start && self.buf[line.end - 1] == b'\r' {
            line.end -= 1;
        }
        self.line = line;
        self.line_number += 1;
    }

    fn latch_overlong(&mut self) {
        let error = io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "line {} exceeds {} bytes",
                self.line_number + 1,
                self.config.max_line_bytes
            ),
        );
        self.latch(error);
    }

    fn latch(&mut self, error: io::Error) {
        telemetry::increment_counter(
            tags::METRIC_READER_ERROR_COUNT,
            1,
            &[("subsystem", "reader"), ("op", "fill"), ("result", "error")],
        );
        self.line = 0..0;
        self.eof = true;
        self.error = Some(error);
    }

    fn grow(&mut self) {
        let current = self.buf.len();
        let target = current
            .saturating_mul(2)
            .min(self.config.max_line_bytes.saturating_add(1))
            .max(current + 1);
        self.buf.resize(target, 0);

        telemetry::increment_counter(
            tags::METRIC_READER_GROW_COUNT,
            1,
            &[("subsystem", "reader"), ("op", "grow")],
        );
        profile::event(
            tags::PROFILE_READER,
            &PROFILE_TAG_STACK_READER,
            "grow",
            "ok",
            0,
            "reader scratch buffer grown",
        );
        #[cfg(feature = "profiling")]
        if profile::is_tag_stack_enabled(&PROFILE_TAG_STACK_READER) {
            tracing::debug!(
                target: tags::PROFILE_READER,
                op = "grow",
                reader_id = self.id,
                from = current,
                to = target,
                "reader scratch buffer grown"
            );
        }
    }
}

impl<R: Read> ChunkedLineReader<R> {
    /// Moves to the next line, reading from the source as needed.
    ///
    /// Returns false once the source is exhausted or failed. A last line
    /// without a trailing newline is still returned once.
    pub fn advance(&mut self) -> bool {
        if self.source.is_none() || self.error.is_some() {
            self.line = 0..0;
            return false;
        }

        loop {
            if let Some(offset) = memchr(b'\n', &self.buf[self.scan_from..self.end]) {
                let newline = self.scan_from + offset;
                if newline - self.start > self.config.max_line_bytes {
                    self.latch_overlong();
                    return false;
                }
                self.emit(self.start..newline);
                self.start = newline + 1;
                self.scan_from = self.start;
                return true;
            }
            self.scan_from = self.end;

            let pending = self.end - self.start;
            if pending > self.config.max_line_bytes {
                self.latch_overlong();
                return false;
            }

            if self.eof {
                if pending > 0 {
                    self.emit(self.start..self.end);
                    self.start = self.end;
                    return true;
                }
                self.line = 0..0;
                return false;
            }

            if let Err(error) = self.fill() {
                self.latch(error);
                return false;
            }
        }
    }

    /// Compacts pending bytes to the front, grows if full, and reads once.
    fn fill(&mut self) -> io::Result<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.scan_from -= self.start;
            self.start = 0;
        }

        if self.end == self.buf.len() {
            self.grow();
        }

        let Some(source) = self.source.as_mut() else {
            self.eof = true;
            return Ok(());
        };

        loop {
            match source.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(read) => {
                    self.end += read;
                    telemetry::increment_counter(
                        tags::METRIC_READER_FILL_COUNT,
                        1,
                        &[("subsystem", "reader"), ("op", "fill")],
                    );
                    telemetry::record_histogram(
                        tags::METRIC_READER_FILL_BYTES,
                        read as u64,
                        &[("subsystem", "reader"), ("op", "fill")],
                    );
                    return Ok(());
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }
        }
    }
}
