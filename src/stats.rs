//! Process-wide byte counters for buffer operations
//!
//! Every copy, XOR and region multiply performed by the engine adds its byte count
//! here. [`get_stats`] returns the totals and resets them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static XOR_BYTES: AtomicU64 = AtomicU64::new(0);
static COPY_BYTES: AtomicU64 = AtomicU64::new(0);
static MULTIPLY_BYTES: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub xor_bytes: u64,
    pub copy_bytes: u64,
    pub multiply_bytes: u64,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "XOR: {} bytes, copy: {} bytes, multiply: {} bytes",
            self.xor_bytes, self.copy_bytes, self.multiply_bytes
        )
    }
}

/// Read and reset the counters
pub fn get_stats() -> Stats {
    Stats {
        xor_bytes: XOR_BYTES.swap(0, Ordering::Relaxed),
        copy_bytes: COPY_BYTES.swap(0, Ordering::Relaxed),
        multiply_bytes: MULTIPLY_BYTES.swap(0, Ordering::Relaxed),
    }
}

#[inline]
pub(crate) fn add_xor(bytes: usize) {
    XOR_BYTES.fetch_add(bytes as u64, Ordering::Relaxed);
}

#[inline]
pub(crate) fn add_copy(bytes: usize) {
    COPY_BYTES.fetch_add(bytes as u64, Ordering::Relaxed);
}

#[inline]
pub(crate) fn add_multiply(bytes: usize) {
    MULTIPLY_BYTES.fetch_add(bytes as u64, Ordering::Relaxed);
}
