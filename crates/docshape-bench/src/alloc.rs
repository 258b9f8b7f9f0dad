use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::time::Duration;

use docshape_core::{Phase, PhaseObserver};

static ALLOCATED: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static TOTAL_ALLOCS: AtomicUsize = AtomicUsize::new(0);

pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            let size = layout.size();
            let current = ALLOCATED.fetch_add(size, Relaxed) + size;
            PEAK.fetch_max(current, Relaxed);
            TOTAL_ALLOCS.fetch_add(1, Relaxed);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        ALLOCATED.fetch_sub(layout.size(), Relaxed);
        unsafe { System.dealloc(ptr, layout) };
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AllocStats {
    pub live_bytes: usize,
    pub peak_bytes: usize,
    pub total_allocs: usize,
}

/// Restarts peak tracking from the bytes live right now. Live bytes are
/// never zeroed since frees of earlier allocations are still to come.
pub fn reset_peak() {
    PEAK.store(ALLOCATED.load(Relaxed), Relaxed);
    TOTAL_ALLOCS.store(0, Relaxed);
}

pub fn snapshot() -> AllocStats {
    AllocStats {
        live_bytes: ALLOCATED.load(Relaxed),
        peak_bytes: PEAK.load(Relaxed),
        total_allocs: TOTAL_ALLOCS.load(Relaxed),
    }
}

pub struct PhaseAlloc {
    pub phase: Phase,
    pub elapsed: Duration,
    /// Peak growth above the bytes live when the phase started.
    pub peak_growth: usize,
    pub total_allocs: usize,
}

/// Samples the allocator around each population phase.
#[derive(Default)]
pub struct AllocObserver {
    baseline: usize,
    pub phases: Vec<PhaseAlloc>,
}

impl PhaseObserver for AllocObserver {
    fn phase_started(&mut self, _phase: Phase) {
        reset_peak();
        self.baseline = snapshot().live_bytes;
    }

    fn phase_finished(&mut self, phase: Phase, elapsed: Duration) {
        let stats = snapshot();
        self.phases.push(PhaseAlloc {
            phase,
            elapsed,
            peak_growth: stats.peak_bytes.saturating_sub(self.baseline),
            total_allocs: stats.total_allocs,
        });
    }
}
