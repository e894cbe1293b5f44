// src/pool.rs
//
// Byte buffer pool.
//
// Buffers are handed out by acquire() where encoded bytes are produced (file
// reads, encoder output) and handed back by release() where they are dropped
// (the buffer an Image replaces after a successful transform). The pool is
// bounded both in count and in per-buffer capacity so a single huge image
// cannot pin memory forever.

use parking_lot::Mutex;
use tracing::trace;

/// Capacity of a freshly allocated buffer when the caller asks for less.
pub const DEFAULT_BUFFER_CAPACITY: usize = 32 * 1024;

/// Maximum number of idle buffers kept.
pub const DEFAULT_MAX_BUFFERS: usize = 16;

/// Buffers larger than this are dropped instead of being kept.
pub const DEFAULT_MAX_CAPACITY: usize = 64 * 1024 * 1024;

#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<Vec<u8>>>,
    max_buffers: usize,
    max_capacity: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_BUFFERS, DEFAULT_MAX_CAPACITY)
    }

    pub fn with_limits(max_buffers: usize, max_capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_buffers)),
            max_buffers,
            max_capacity,
        }
    }

    /// Take an empty buffer with at least `min_capacity` bytes of capacity.
    ///
    /// Reuses the smallest idle buffer that is large enough; otherwise
    /// allocates.
    pub fn acquire(&self, min_capacity: usize) -> Vec<u8> {
        let reused = {
            let mut idle = self.idle.lock();
            let best = idle
                .iter()
                .enumerate()
                .filter(|(_, buf)| buf.capacity() >= min_capacity)
                .min_by_key(|(_, buf)| buf.capacity())
                .map(|(idx, _)| idx);
            best.map(|idx| idle.swap_remove(idx))
        };

        match reused {
            Some(mut buf) => {
                trace!(target: "image_dsl::pool", capacity = buf.capacity(), "reuse");
                buf.clear();
                buf
            }
            None => {
                let capacity = min_capacity.max(DEFAULT_BUFFER_CAPACITY);
                trace!(target: "image_dsl::pool", capacity, "allocate");
                Vec::with_capacity(capacity)
            }
        }
    }

    /// Return a buffer. Returns false when the buffer was dropped instead
    /// (pool full or buffer above the capacity cap).
    pub fn release(&self, mut buf: Vec<u8>) -> bool {
        if buf.capacity() == 0 || buf.capacity() > self.max_capacity {
            return false;
        }
        let mut idle = self.idle.lock();
        if idle.len() >= self.max_buffers {
            return false;
        }
        buf.clear();
        idle.push(buf);
        true
    }

    /// Number of idle buffers.
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_buffers(&self) -> usize {
        self.max_buffers
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }
}
