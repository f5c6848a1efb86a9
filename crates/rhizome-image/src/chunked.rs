//! Chunked bulk record loader.
//!
//! Every construct codec loads its fixed-size record arrays through this
//! one routine. Reading the whole array in a single buffer can fail under
//! tight memory, so the buffer size adapts: start with all remaining
//! objects, halve on allocation failure, down to one object at a time.
//! Only when even a single object's buffer cannot be allocated does the
//! load abort, after handing the failure to the allocator's
//! out-of-memory hook exactly once.

use std::io::Read;

use crate::io::ImageSource;
use crate::state::ChunkAllocator;
use crate::{ImageError, ImageResult};

/// Read `object_count` records of `object_size` bytes from `src`,
/// invoking `update(record_bytes, index)` once per record in strict
/// ascending index order.
pub fn bload_and_refresh(
    src: &mut dyn ImageSource,
    alloc: &mut dyn ChunkAllocator,
    object_count: usize,
    object_size: usize,
    update: &mut dyn FnMut(&[u8], usize) -> ImageResult<()>,
) -> ImageResult<()> {
    if object_count == 0 || object_size == 0 {
        return Ok(());
    }

    let mut objs_max_read = object_count;
    let mut buffer = loop {
        match alloc.try_alloc(objs_max_read * object_size) {
            Some(buf) => break buf,
            None if objs_max_read > 1 => objs_max_read /= 2,
            None => {
                alloc.out_of_memory(object_size);
                return Err(ImageError::OutOfMemory);
            }
        }
    };

    let mut done = 0;
    while done < object_count {
        let n = objs_max_read.min(object_count - done);
        let chunk = &mut buffer[..n * object_size];
        src.read_exact(chunk)?;

        for i in 0..n {
            let record = &chunk[i * object_size..(i + 1) * object_size];
            update(record, done + i)?;
        }
        done += n;
    }

    Ok(())
}
