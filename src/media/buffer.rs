//! Bounded FIFO jitter buffer for encoded frames
//!
//! One per media type per stream. When full, pushing drops the oldest frame
//! so the buffer always holds the most recent `capacity` frames.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::protocol::FrameRecord;

/// Bounded drop-oldest queue of frames
pub struct JitterBuffer {
    queue: ArrayQueue<FrameRecord>,
    pushed: AtomicU64,
    dropped: AtomicU64,
}

impl JitterBuffer {
    /// Create a new buffer; `capacity` must be non-zero
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append a frame, returning the oldest frame if it had to be dropped
    pub fn push(&self, frame: FrameRecord) -> Option<FrameRecord> {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        let displaced = self.queue.force_push(frame);
        if displaced.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        displaced
    }

    /// Take the oldest frame
    pub fn pop(&self) -> Option<FrameRecord> {
        self.queue.pop()
    }

    /// Discard every buffered frame
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Get statistics
    pub fn stats(&self) -> JitterBufferStats {
        JitterBufferStats {
            level: self.len(),
            capacity: self.capacity(),
            pushed: self.pushed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Jitter buffer statistics
#[derive(Debug, Clone)]
pub struct JitterBufferStats {
    pub level: usize,
    pub capacity: usize,
    pub pushed: u64,
    pub dropped: u64,
}
