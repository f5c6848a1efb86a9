//! Chunked loader tests.

use std::io::Cursor;

use crate::chunked::bload_and_refresh;
use crate::state::ChunkAllocator;
use crate::ImageError;

/// Allocator that refuses any buffer above a byte cap and records every
/// request it sees.
struct CappedAllocator {
    cap: usize,
    requests: Vec<usize>,
    oom_calls: usize,
}

impl CappedAllocator {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            requests: Vec::new(),
            oom_calls: 0,
        }
    }
}

impl ChunkAllocator for CappedAllocator {
    fn try_alloc(&mut self, bytes: usize) -> Option<Vec<u8>> {
        self.requests.push(bytes);
        if bytes <= self.cap {
            Some(vec![0u8; bytes])
        } else {
            None
        }
    }

    fn out_of_memory(&mut self, _bytes: usize) {
        self.oom_calls += 1;
    }
}

fn records(count: u8, size: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..count {
        data.extend(std::iter::repeat_n(i, size));
    }
    data
}

#[test]
fn single_allocation_when_memory_allows() {
    let mut src = Cursor::new(records(4, 8));
    let mut alloc = CappedAllocator::new(1024);
    let mut seen = Vec::new();
    bload_and_refresh(&mut src, &mut alloc, 4, 8, &mut |buf, index| {
        assert!(buf.iter().all(|&b| b == index as u8));
        seen.push(index);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, [0, 1, 2, 3]);
    assert_eq!(alloc.requests, [32]);
}

#[test]
fn buffer_halves_until_it_fits() {
    let mut src = Cursor::new(records(8, 4));
    // Room for two records per chunk.
    let mut alloc = CappedAllocator::new(8);
    let mut seen = Vec::new();
    bload_and_refresh(&mut src, &mut alloc, 8, 4, &mut |buf, index| {
        assert_eq!(buf, [index as u8; 4]);
        seen.push(index);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, [0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(alloc.requests, [32, 16, 8]);
    assert_eq!(alloc.oom_calls, 0);
}

#[test]
fn degrades_to_one_record_at_a_time() {
    let mut src = Cursor::new(records(5, 4));
    let mut alloc = CappedAllocator::new(4);
    let mut seen = Vec::new();
    bload_and_refresh(&mut src, &mut alloc, 5, 4, &mut |_, index| {
        seen.push(index);
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, [0, 1, 2, 3, 4]);
    assert_eq!(*alloc.requests.last().unwrap(), 4);
}

#[test]
fn total_failure_reports_out_of_memory_once() {
    let mut src = Cursor::new(records(4, 8));
    let mut alloc = CappedAllocator::new(0);
    let result = bload_and_refresh(&mut src, &mut alloc, 4, 8, &mut |_, _| Ok(()));
    assert!(matches!(result, Err(ImageError::OutOfMemory)));
    assert_eq!(alloc.oom_calls, 1);
    // Halved down to a single record before giving up.
    assert_eq!(*alloc.requests.last().unwrap(), 8);
}

#[test]
fn zero_records_reads_nothing() {
    let mut src = Cursor::new(Vec::new());
    let mut alloc = CappedAllocator::new(0);
    bload_and_refresh(&mut src, &mut alloc, 0, 8, &mut |_, _| {
        panic!("no records to visit")
    })
    .unwrap();
    assert!(alloc.requests.is_empty());
    assert_eq!(alloc.oom_calls, 0);
}

#[test]
fn short_source_is_an_error() {
    let mut src = Cursor::new(records(2, 8));
    let mut alloc = CappedAllocator::new(1024);
    let result = bload_and_refresh(&mut src, &mut alloc, 4, 8, &mut |_, _| Ok(()));
    assert!(matches!(result, Err(ImageError::Io(_))));
}
