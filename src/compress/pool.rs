// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Shared free list of byte buffers.
//!
//! The compressor churns through two sizable allocations per entry (the raw
//! page and its compressed form). With tens of thousands of entries that is
//! a lot of allocator traffic for buffers that are all roughly the same
//! size, so workers draw from a pool and the writer returns buffers once
//! their bytes are on disk. The pool lives for one pipeline stage and dies
//! with it; nothing is process-global.

use parking_lot::Mutex;

pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    initial_capacity: usize,
}

impl BufferPool {
    /// `initial_capacity` sizes buffers created on a pool miss.
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            initial_capacity,
        }
    }

    /// Take a cleared buffer, allocating if the free list is empty.
    pub fn get(&self) -> Vec<u8> {
        match self.free.lock().pop() {
            Some(buf) => buf,
            None => Vec::with_capacity(self.initial_capacity),
        }
    }

    /// Return a buffer for reuse. The contents are discarded, the capacity
    /// is kept.
    pub fn put(&self, mut buf: Vec<u8>) {
        buf.clear();
        self.free.lock().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_capacity() {
        let pool = BufferPool::new(16);

        let mut buf = pool.get();
        buf.extend_from_slice(&[1u8; 1024]);
        let cap = buf.capacity();
        pool.put(buf);

        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= cap);
    }

    #[test]
    fn allocates_on_miss() {
        let pool = BufferPool::new(64);
        let a = pool.get();
        let b = pool.get();
        assert!(a.capacity() >= 64);
        assert!(b.capacity() >= 64);
    }
}
