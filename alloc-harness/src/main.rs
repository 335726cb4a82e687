// =============================================================================
// alloc-harness — Allocation Trace Driver
// =============================================================================
//
// Builds a `BufferRegion` (this binary's own `RegionProvider`, independent of
// the test-only one inside `heap-alloc`), then drives a short allocation
// trace that deliberately interleaves frees so both splitting and all three
// coalescing cases fire at least once, logging a summary at the end.
//
// =============================================================================

use std::ptr::NonNull;

use heap_alloc::{Allocator, RegionProvider};

/// A grow-only region backed by a single, fixed-capacity byte buffer.
///
/// Reserves its capacity exactly once and never reallocates, so addresses
/// handed out by `grow` stay valid for the buffer's lifetime — the contract
/// `RegionProvider` requires.
struct BufferRegion {
    buffer: Vec<u8>,
    used: usize,
}

impl BufferRegion {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity],
            used: 0,
        }
    }
}

impl RegionProvider for BufferRegion {
    fn grow(&mut self, bytes: usize) -> Option<NonNull<u8>> {
        let new_used = self.used.checked_add(bytes)?;
        if new_used > self.buffer.len() {
            return None;
        }
        // SAFETY: `self.used` never exceeds `self.buffer.len()`, and the
        // buffer is never reallocated after construction.
        let base = unsafe { NonNull::new_unchecked(self.buffer.as_mut_ptr().add(self.used)) };
        self.used = new_used;
        Some(base)
    }
}

fn main() {
    env_logger::init();

    let mut allocator = Allocator::new(BufferRegion::new(4096));
    allocator.init().expect("region should have room for init padding");

    log::info!("allocating three blocks");
    let a = allocator.allocate(24).expect("allocate a");
    let b = allocator.allocate(40).expect("allocate b");
    let c = allocator.allocate(16).expect("allocate c");

    log::info!("freeing b, then a, then c to exercise all three coalescing cases");
    allocator.free(Some(b));
    allocator.free(Some(a));
    allocator.free(Some(c));
    allocator
        .check_heap()
        .expect("heap should be consistent after coalescing");

    log::info!("allocating into the merged free block, expecting a split");
    let d = allocator.allocate(8).expect("allocate d");

    log::info!("resizing d to a larger request");
    let e = allocator.resize(Some(d), 256).expect("resize d");

    log::info!("zero_allocate of a small array");
    let f = allocator.zero_allocate(4, 8).expect("zero_allocate f");
    // SAFETY: `f` is a live payload with at least 32 bytes.
    let all_zero = (0..32).all(|i| unsafe { f.as_ptr().add(i).read() } == 0);
    assert!(all_zero, "zero_allocate must zero its payload");

    allocator.free(Some(e));
    allocator.free(Some(f));
    allocator
        .check_heap()
        .expect("heap should be consistent at the end of the trace");

    log::info!("trace completed, heap is consistent");
}
