use std::collections::HashSet;
use std::io::{self, Read};
use std::sync::{Arc, Mutex};
use std::thread;

use lineproto_core::{ReaderConfig, ReaderPool};

fn small_config() -> ReaderConfig {
    ReaderConfig {
        initial_capacity: 16,
        max_line_bytes: 1024,
        max_retained_capacity: 64,
    }
}

fn drain<R: Read>(reader: &mut lineproto_core::ChunkedLineReader<R>) -> Vec<Vec<u8>> {
    let mut lines = Vec::new();
    while reader.advance() {
        lines.push(reader.current().to_vec());
    }
    lines
}

#[test]
fn acquire_release_cycle_reuses_readers() {
    let pool: ReaderPool<&[u8]> = ReaderPool::new(small_config(), 2);
    assert_eq!(pool.max_readers(), 2);

    let first_id = {
        let mut reader = pool.acquire(b"a v=1\nb v=2\n");
        assert_eq!(drain(&mut reader).len(), 2);
        reader.id()
    };

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 1);
    assert_eq!(metrics.recycled, 0);
    assert_eq!(pool.available(), 1);

    {
        let mut reader = pool.acquire(b"c v=3");
        assert_eq!(reader.id(), first_id);
        assert_eq!(drain(&mut reader), vec![b"c v=3".to_vec()]);
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 1);
    assert_eq!(metrics.recycled, 1);
    assert_eq!(metrics.dropped, 0);
}

#[test]
fn full_pool_counts_dropped_reader() {
    let pool: ReaderPool<&[u8]> = ReaderPool::new(small_config(), 1);

    let first = pool.acquire(b"");
    let second = pool.acquire(b"");
    drop(first);
    drop(second);

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 2);
    assert_eq!(metrics.dropped, 1);
    assert_eq!(pool.available(), 1);
}

#[test]
fn unpooled_never_retains() {
    let pool: ReaderPool<&[u8]> = ReaderPool::unpooled(small_config());
    for _ in 0..3 {
        let mut reader = pool.acquire(b"x v=1\n");
        assert!(reader.advance());
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.created, 3);
    assert_eq!(metrics.recycled, 0);
    assert_eq!(metrics.dropped, 3);
    assert_eq!(pool.available(), 0);
}

#[test]
fn reused_reader_never_leaks_previous_source() {
    let pool: ReaderPool<Box<dyn Read + Send>> = ReaderPool::new(small_config(), 1);

    {
        let failing = io::Cursor::new(b"first,secret=1 v=1\npartial-line-without-newl".to_vec())
            .chain(FailingReader);
        let mut reader = pool.acquire(Box::new(failing));
        assert_eq!(drain(&mut reader), vec![b"first,secret=1 v=1".to_vec()]);
        assert!(reader.last_error().is_some());
    }

    let mut reader = pool.acquire(Box::new(io::Cursor::new(b"second v=2".to_vec())));
    assert!(reader.last_error().is_none());
    assert_eq!(reader.line_number(), 0);
    assert_eq!(reader.current(), b"");

    let lines = drain(&mut reader);
    assert_eq!(lines, vec![b"second v=2".to_vec()]);
    assert!(reader.last_error().is_none());
    assert_eq!(pool.metrics().recycled, 1);
}

#[test]
fn grown_buffers_are_shrunk_before_reuse() {
    let long_line = vec![b'x'; 500];
    let pool: ReaderPool<&[u8]> = ReaderPool::new(small_config(), 1);

    {
        let mut reader = pool.acquire(&long_line);
        assert!(reader.advance());
        assert_eq!(reader.current().len(), 500);
        assert!(reader.capacity() > 64);
    }

    let reader = pool.acquire(b"");
    assert!(reader.capacity() <= 64);
    drop(reader);
    assert_eq!(pool.metrics().shrunk, 1);
}

#[test]
fn reader_reset_while_checked_out_is_discarded() {
    let pool: ReaderPool<&[u8]> = ReaderPool::new(small_config(), 4);
    {
        let mut reader = pool.acquire(b"a v=1");
        reader.reset(b"b v=2");
        assert!(reader.advance());
        assert_eq!(reader.current(), b"b v=2");
    }
    assert_eq!(pool.available(), 0);
    assert_eq!(pool.metrics().dropped, 1);
}

#[test]
fn guard_releases_on_unwind() {
    let pool: Arc<ReaderPool<&'static [u8]>> = Arc::new(ReaderPool::new(small_config(), 2));
    let worker_pool = Arc::clone(&pool);

    let joined = thread::spawn(move || {
        let mut reader = worker_pool.acquire(b"a v=1\n");
        reader.advance();
        panic!("worker failed mid-request");
    })
    .join();

    assert!(joined.is_err());
    assert_eq!(pool.available(), 1);
}

#[test]
fn concurrent_acquire_never_shares_a_live_reader() -> Result<(), Box<dyn std::error::Error>> {
    let pool: Arc<ReaderPool<&'static [u8]>> = Arc::new(ReaderPool::new(small_config(), 4));
    let live = Arc::new(Mutex::new(HashSet::new()));
    let mut handles = Vec::new();

    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        let live = Arc::clone(&live);
        handles.push(thread::spawn(move || -> Result<(), String> {
            for _ in 0..500 {
                let mut reader = pool.acquire(b"m v=1\nm v=2\n");
                let id = reader.id();
                let inserted = live
                    .lock()
                    .map_err(|_| "live set poisoned".to_owned())?
                    .insert(id);
                if !inserted {
                    return Err(format!("reader {id} handed out twice"));
                }

                let mut count = 0;
                while reader.advance() {
                    count += 1;
                }
                if count != 2 {
                    return Err(format!("reader {id} yielded {count} lines"));
                }

                live.lock()
                    .map_err(|_| "live set poisoned".to_owned())?
                    .remove(&id);
            }
            Ok(())
        }));
    }

    for handle in handles {
        handle
            .join()
            .map_err(|_| io::Error::other("worker thread panicked"))??;
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.created + metrics.recycled, 8 * 500);
    assert!(pool.available() <= 4);
    Ok(())
}

#[test]
fn shared_pool_is_a_single_instance() {
    let a = ReaderPool::shared();
    let b = ReaderPool::shared();
    assert!(Arc::ptr_eq(&a, &b));
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
    }
}
