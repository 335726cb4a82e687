// =============================================================================
// Fixed-Capacity Test Region
// =============================================================================
//
// A deterministic `RegionProvider` for tests and the harness binary: reserves
// a fixed-capacity buffer up front via `std::alloc` directly, not `Vec<u8>`,
// whose reallocation on growth would invalidate addresses this crate has
// promised stay valid forever. Growing past capacity reports exhaustion
// instead of panicking, so tests can exercise the exhaustion path too.
//
// =============================================================================

use core::ptr::NonNull;
use std::alloc::{alloc_zeroed, dealloc, Layout};

use crate::block::ALIGNMENT;
use crate::region::RegionProvider;

pub struct FixedRegion {
    base: NonNull<u8>,
    layout: Layout,
    capacity: usize,
    used: usize,
}

impl FixedRegion {
    pub fn new(capacity: usize) -> Self {
        let layout = Layout::from_size_align(capacity, ALIGNMENT).expect("valid layout");
        // SAFETY: `layout` has nonzero size (callers always pass a positive
        // capacity) and was just validated by `from_size_align`.
        let raw = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(raw).expect("backing allocation failed");
        Self {
            base,
            layout,
            capacity,
            used: 0,
        }
    }
}

impl RegionProvider for FixedRegion {
    fn grow(&mut self, bytes: usize) -> Option<NonNull<u8>> {
        let new_used = self.used.checked_add(bytes)?;
        if new_used > self.capacity {
            return None;
        }
        // SAFETY: `self.used` is always within `[0, self.capacity]`, so this
        // stays within the single allocation backing `self.base`.
        let previous_end = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.used)) };
        self.used = new_used;
        Some(previous_end)
    }
}

impl Drop for FixedRegion {
    fn drop(&mut self) {
        // SAFETY: `self.base` and `self.layout` are exactly the pair handed
        // back by `alloc_zeroed` in `new`.
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}
