//! Allocation-tracking memory probe.
//!
//! [`TrackingAllocator`] wraps the system allocator and keeps a running
//! live-byte count plus a high-water mark. The binary that wants memory
//! numbers installs it as its `#[global_allocator]`; [`AllocProbe`] then
//! reports peak growth between a reset and a read. Without the allocator
//! installed the counters never move and the probe reports zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static MARK: AtomicUsize = AtomicUsize::new(0);

pub struct TrackingAllocator;

impl TrackingAllocator {
    pub const fn new() -> Self {
        TrackingAllocator
    }
}

impl Default for TrackingAllocator {
    fn default() -> Self {
        TrackingAllocator::new()
    }
}

#[allow(unsafe_code)]
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new_ptr
    }
}

fn record_alloc(size: usize) {
    let live = LIVE.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(live, Ordering::Relaxed);
}

fn record_dealloc(size: usize) {
    LIVE.fetch_sub(size, Ordering::Relaxed);
}

/// Rebases the high-water mark to the current live count.
pub fn reset_peak() {
    let live = LIVE.load(Ordering::Relaxed);
    MARK.store(live, Ordering::Relaxed);
    PEAK.store(live, Ordering::Relaxed);
}

/// Peak allocation growth since the last [`reset_peak`], in bytes.
pub fn peak_since_reset_bytes() -> usize {
    let peak = PEAK.load(Ordering::Relaxed);
    let mark = MARK.load(Ordering::Relaxed);
    peak.saturating_sub(mark)
}

pub trait MemProbe {
    fn reset(&self);
    fn peak_kib(&self) -> f64;
}

/// Probe over the [`TrackingAllocator`] counters.
#[derive(Debug, Default, Clone)]
pub struct AllocProbe;

impl MemProbe for AllocProbe {
    fn reset(&self) {
        reset_peak();
    }

    fn peak_kib(&self) -> f64 {
        peak_since_reset_bytes() as f64 / 1024.0
    }
}

#[cfg(test)]
#[global_allocator]
static TEST_ALLOC: TrackingAllocator = TrackingAllocator::new();
