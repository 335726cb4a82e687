// =============================================================================
// Allocator Facade
// =============================================================================
//
// `Allocator<R>` owns the three pieces of state the rest of this crate's
// modules operate on (`free_list`, `heap_first`, `heap_last`) plus the
// `RegionProvider` that backs the heap area. Every public method here is a
// thin orchestration of `block`/`freelist`/`placement`/`coalesce` — none of
// those modules know about each other, and this is the only place that does.
//
// =============================================================================

use core::ptr::NonNull;

use crate::block::{self, ALIGNMENT, MIN_BLOCK_SIZE, WORD_SIZE};
use crate::coalesce;
use crate::freelist::FreeList;
use crate::placement;
use crate::region::RegionProvider;

/// Failure reason for `Allocator::init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocInitError {
    /// The region provider refused to grow by the leading alignment padding.
    RegionExhausted,
}

/// A consistency-check failure reported by `Allocator::check_heap`.
///
/// This is a diagnostic aid, not part of the hot path — it is never called
/// by `allocate`/`free`/`resize`/`zero_allocate` themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapCheckError {
    /// A block's size is not `ALIGNMENT`-aligned or is below `MIN_BLOCK_SIZE`.
    InvalidBlockSize { block: NonNull<u8>, size: usize },
    /// A block's header size and footer size disagree.
    HeaderFooterMismatch { block: NonNull<u8> },
    /// Two physically adjacent blocks are both free.
    AdjacentFreeBlocks { block: NonNull<u8> },
    /// A block marked allocated was found as a member of the free list.
    AllocatedBlockInFreeList { block: NonNull<u8> },
    /// The free list's member count does not match the number of physically
    /// free blocks (also catches a cyclic free list).
    FreeListCountMismatch {
        list_count: usize,
        physical_free_count: usize,
    },
}

/// An explicit free-list, boundary-tag allocator over a single, contiguous,
/// grow-only region supplied by `R`.
///
/// `Allocator<R>` is deliberately not `Sync`: it holds raw pointers into the
/// region and every method takes `&mut self`. Concurrent access is a
/// non-goal; wrap it in your own synchronization if you need that.
pub struct Allocator<R: RegionProvider> {
    region: R,
    free_list: FreeList,
    heap_first: Option<NonNull<u8>>,
    heap_last: Option<NonNull<u8>>,
}

impl<R: RegionProvider> Allocator<R> {
    /// Builds an allocator over `region`. Call `init` before the first
    /// `allocate`/`free`/`resize`/`zero_allocate`.
    pub const fn new(region: R) -> Self {
        Self {
            region,
            free_list: FreeList::new(),
            heap_first: None,
            heap_last: None,
        }
    }

    /// Resets allocator state and reserves the leading padding that puts the
    /// first block's payload on an `ALIGNMENT` boundary.
    ///
    /// # Errors
    /// Returns `AllocInitError::RegionExhausted` if the region provider
    /// refuses to grow by the padding amount.
    pub fn init(&mut self) -> Result<(), AllocInitError> {
        self.free_list = FreeList::new();
        self.heap_first = None;
        self.heap_last = None;

        let padding = ALIGNMENT - WORD_SIZE;
        match self.region.grow(padding) {
            Some(_) => {
                log::debug!("reserved {padding} leading bytes for alignment");
                Ok(())
            }
            None => {
                log::warn!("region exhausted reserving initial alignment padding");
                Err(AllocInitError::RegionExhausted)
            }
        }
    }

    /// Rounds a requested byte count up to the block size that must be
    /// carved or grown for it: header + payload + footer, aligned, clamped
    /// to the minimum block size.
    fn block_size_for(n: usize) -> usize {
        let raw = block::round_up(WORD_SIZE + n + WORD_SIZE, ALIGNMENT);
        raw.max(MIN_BLOCK_SIZE)
    }

    /// Allocates at least `n` bytes, returning the payload address or `None`
    /// if the region cannot be grown to satisfy the request.
    ///
    /// `n == 0` is not special-cased: it rounds up to a minimum-size block,
    /// matching the source allocator's behavior rather than returning `None`.
    pub fn allocate(&mut self, n: usize) -> Option<NonNull<u8>> {
        let need = Self::block_size_for(n);

        // SAFETY: every block reachable from `self.free_list` is a live free
        // block — the invariant this whole type maintains.
        if let Some(block) = unsafe { placement::find_fit(&mut self.free_list, need) } {
            let was_heap_last = self.heap_last == Some(block);
            // SAFETY: `block` was just unlinked by `find_fit` and has size
            // >= `need`.
            let placed = unsafe { placement::split(block, need) };
            if let Some((remainder, _)) = placed.remainder {
                // SAFETY: `split` just wrote a live free block at `remainder`.
                unsafe { self.free_list.insert(remainder) };
                if was_heap_last {
                    self.heap_last = Some(remainder);
                }
            }
            // SAFETY: `placed.allocated` is a live, just-allocated block.
            return Some(unsafe { block::payload_ptr(placed.allocated) });
        }

        let base = self.region.grow(need)?;
        // SAFETY: the region provider just granted this span, exclusively.
        unsafe { block::write_block(base, need, true) };
        log::debug!("grew region by {need} bytes to satisfy allocation miss");

        if self.heap_first.is_none() {
            self.heap_first = Some(base);
        }
        self.heap_last = Some(base);
        // SAFETY: `base` is the block just written above.
        Some(unsafe { block::payload_ptr(base) })
    }

    /// Frees the block backing `payload`. `payload == None` is a no-op.
    ///
    /// # Safety (by contract, not enforced)
    /// `payload` must be `None` or a payload address previously returned by
    /// `allocate`/`resize`/`zero_allocate` on this same allocator, not
    /// already freed. Violating this is undefined behavior — the core does
    /// not and cannot detect it.
    pub fn free(&mut self, payload: Option<NonNull<u8>>) {
        let Some(payload) = payload else { return };

        // SAFETY: by this method's contract, `payload` came from a prior
        // allocation on this allocator.
        let block = unsafe { block::block_from_payload(payload) };
        let heap_first = self
            .heap_first
            .expect("free called before any block was ever allocated");
        let heap_last = self
            .heap_last
            .as_mut()
            .expect("heap_first set implies heap_last is set");

        // SAFETY: `block` is a live allocated block inside `[heap_first,
        // *heap_last]`, and every free-list member is a live free block.
        unsafe { coalesce::free_and_coalesce(&mut self.free_list, heap_first, heap_last, block) };
    }

    /// Resizes the block backing `payload` to hold at least `n` bytes,
    /// preserving its leading bytes.
    ///
    /// - `payload == None` behaves like `allocate(n)`.
    /// - `n == 0` behaves like `free(payload)` and returns `None`.
    /// - On allocation failure the original block is left untouched and
    ///   valid — only a successful resize frees it.
    ///
    /// # Safety (by contract, not enforced)
    /// Same contract as `free`: `payload` must be `None` or a live payload
    /// address from this allocator.
    pub fn resize(&mut self, payload: Option<NonNull<u8>>, n: usize) -> Option<NonNull<u8>> {
        let Some(old_payload) = payload else {
            return self.allocate(n);
        };
        if n == 0 {
            self.free(Some(old_payload));
            return None;
        }

        // SAFETY: by contract, `old_payload` is a live payload address.
        let old_block = unsafe { block::block_from_payload(old_payload) };
        // SAFETY: `old_block` is a live block.
        let old_capacity = unsafe { block::size_of_block(old_block) } - 2 * WORD_SIZE;

        let new_payload = self.allocate(n)?;
        let copy_len = old_capacity.min(n);
        // SAFETY: both ranges are live, non-overlapping (the new block was
        // just carved or grown, distinct from the still-live old block),
        // and `copy_len` does not exceed either's payload capacity.
        unsafe {
            core::ptr::copy_nonoverlapping(old_payload.as_ptr(), new_payload.as_ptr(), copy_len);
        }
        self.free(Some(old_payload));
        Some(new_payload)
    }

    /// Allocates space for `count` elements of `size` bytes each, zeroed.
    /// Returns `None` on `count * size` overflow or allocation failure.
    pub fn zero_allocate(&mut self, count: usize, size: usize) -> Option<NonNull<u8>> {
        let total = count.checked_mul(size)?;
        let payload = self.allocate(total)?;
        // SAFETY: `payload` is live and its block holds at least `total`
        // payload bytes.
        unsafe { core::ptr::write_bytes(payload.as_ptr(), 0, total) };
        Some(payload)
    }

    /// Walks the physical block sequence and the free list, checking every
    /// invariant this allocator is meant to maintain. A testing aid — never
    /// called from `allocate`/`free`/`resize`/`zero_allocate`.
    ///
    /// # Errors
    /// Returns the first violated invariant found.
    pub fn check_heap(&self) -> Result<(), HeapCheckError> {
        let Some(heap_first) = self.heap_first else {
            return Ok(());
        };
        let heap_last = self
            .heap_last
            .expect("heap_first set implies heap_last is set");

        let mut cursor = heap_first;
        let mut physical_free_count = 0usize;
        let mut prev_was_free = false;
        loop {
            // SAFETY: invariant 5 (§8) guarantees the physical walk from
            // `heap_first` to `heap_last` covers only live blocks.
            let size = unsafe { block::size_of_block(cursor) };
            if size % ALIGNMENT != 0 || size < MIN_BLOCK_SIZE {
                return Err(HeapCheckError::InvalidBlockSize {
                    block: cursor,
                    size,
                });
            }
            // SAFETY: `cursor` is live with exactly `size` bytes.
            let footer_size = unsafe { block::read_footer_size(cursor, size) };
            if footer_size != size {
                return Err(HeapCheckError::HeaderFooterMismatch { block: cursor });
            }

            // SAFETY: `cursor` is live.
            let allocated = unsafe { block::is_allocated(cursor) };
            if !allocated {
                physical_free_count += 1;
                if prev_was_free {
                    return Err(HeapCheckError::AdjacentFreeBlocks { block: cursor });
                }
            }
            prev_was_free = !allocated;

            if cursor == heap_last {
                break;
            }
            // SAFETY: `cursor != heap_last`, so a live successor exists.
            cursor = unsafe { block::next_physical(cursor, size) };
        }

        let mut list_count = 0usize;
        // SAFETY: every free-list member is required to be a live free block.
        for block in unsafe { self.free_list.iter() } {
            // SAFETY: `block` is a live free-list member.
            if unsafe { block::is_allocated(block) } {
                return Err(HeapCheckError::AllocatedBlockInFreeList { block });
            }
            list_count += 1;
            if list_count > physical_free_count {
                return Err(HeapCheckError::FreeListCountMismatch {
                    list_count,
                    physical_free_count,
                });
            }
        }
        if list_count != physical_free_count {
            return Err(HeapCheckError::FreeListCountMismatch {
                list_count,
                physical_free_count,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_region::FixedRegion;

    fn new_allocator(capacity: usize) -> Allocator<FixedRegion> {
        let mut allocator = Allocator::new(FixedRegion::new(capacity));
        allocator.init().expect("init should not exhaust a fresh region");
        allocator
    }

    #[test]
    fn init_then_one_allocation() {
        let mut a = new_allocator(4096);
        let p = a.allocate(24).expect("allocation should succeed");
        assert_eq!(p.as_ptr() as usize % ALIGNMENT, 0);
        // SAFETY: `p` is a live payload from the allocator above.
        let block = unsafe { block::block_from_payload(p) };
        assert_eq!(unsafe { block::size_of_block(block) }, 48);
        assert_eq!(a.heap_first, a.heap_last);
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn reuse_without_split_below_minimum_remainder() {
        let mut a = new_allocator(4096);
        let block_a = a.allocate(24).expect("a");
        a.free(Some(block_a));
        let b = a.allocate(8).expect("b");
        assert_eq!(b, block_a, "b should reuse a's exact block, not grow");
        // SAFETY: `b` is a live payload.
        let block = unsafe { block::block_from_payload(b) };
        assert_eq!(unsafe { block::size_of_block(block) }, 48);
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn split_occurs_after_coalescing_makes_room() {
        let mut a = new_allocator(4096);
        let pa = a.allocate(24).expect("a");
        let pb = a.allocate(24).expect("b");
        a.free(Some(pa));
        a.free(Some(pb));
        // a and b are physically adjacent (both grown fresh, nothing between
        // them), so freeing both coalesces into one 96-byte free block.

        let pc = a.allocate(8).expect("c");
        // SAFETY: `pc` is a live payload.
        let block_c = unsafe { block::block_from_payload(pc) };
        assert_eq!(unsafe { block::size_of_block(block_c) }, 32);
        assert_eq!(pc, pa, "c should be carved from the front of the merged block");

        // The 64-byte remainder should be the sole free-list entry.
        assert_eq!(unsafe { a.free_list.iter() }.count(), 1);
        let remainder = a.free_list.head().expect("split should leave a remainder");
        assert_eq!(unsafe { block::size_of_block(remainder) }, 64);
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn coalesce_all_three_cases() {
        let mut a = new_allocator(4096);
        let pa = a.allocate(24).expect("a");
        let pb = a.allocate(24).expect("b");
        let pc = a.allocate(24).expect("c");

        a.free(Some(pb));
        assert_eq!(unsafe { a.free_list.iter() }.count(), 1);

        a.free(Some(pa));
        assert_eq!(unsafe { a.free_list.iter() }.count(), 1);
        // SAFETY: a's block base is still valid; it absorbed b.
        let merged_ab = unsafe { block::block_from_payload(pa) };
        assert_eq!(unsafe { block::size_of_block(merged_ab) }, 96);

        a.free(Some(pc));
        assert_eq!(unsafe { a.free_list.iter() }.count(), 1);
        let merged_abc = unsafe { block::block_from_payload(pa) };
        assert_eq!(unsafe { block::size_of_block(merged_abc) }, 144);
        assert_eq!(a.heap_last, Some(merged_abc));
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn resize_grow_preserves_prefix_and_frees_original() {
        let mut a = new_allocator(4096);
        let p = a.allocate(16).expect("p");
        // SAFETY: `p`'s block holds at least 16 payload bytes.
        unsafe {
            for i in 0..16u8 {
                p.as_ptr().add(i as usize).write(i);
            }
        }

        let q = a.resize(Some(p), 64).expect("resize should succeed");
        // SAFETY: `q` holds at least 16 payload bytes, copied from `p`.
        for i in 0..16u8 {
            assert_eq!(unsafe { q.as_ptr().add(i as usize).read() }, i);
        }

        // The old block should now be reusable.
        let reused = a.allocate(8).expect("old block should be free again");
        assert_eq!(reused, p);
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn resize_failure_preserves_original() {
        // Capacity has no room left for the bigger request after init's
        // padding and one small allocation — the grow for 4096 bytes fails.
        let mut a = new_allocator(64);
        let p = a.allocate(16).expect("p");
        let result = a.resize(Some(p), 4096);
        assert!(result.is_none());
        // `p` must still be valid and untouched.
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn resize_null_is_allocate() {
        let mut a = new_allocator(4096);
        let p = a.resize(None, 16).expect("resize(None, n) should allocate");
        assert_eq!(p.as_ptr() as usize % ALIGNMENT, 0);
    }

    #[test]
    fn resize_to_zero_frees_and_returns_none() {
        let mut a = new_allocator(4096);
        let p = a.allocate(16).expect("p");
        assert!(a.resize(Some(p), 0).is_none());
        let reused = a.allocate(8).expect("freed block should be reusable");
        assert_eq!(reused, p);
    }

    #[test]
    fn zero_allocate_zeroes_payload() {
        let mut a = new_allocator(4096);
        let p = a.zero_allocate(4, 8).expect("zero_allocate should succeed");
        for i in 0..32 {
            // SAFETY: the block backing `p` holds at least 32 payload bytes.
            assert_eq!(unsafe { p.as_ptr().add(i).read() }, 0);
        }
    }

    #[test]
    fn zero_allocate_overflow_returns_none() {
        let mut a = new_allocator(4096);
        assert!(a.zero_allocate(usize::MAX, 2).is_none());
    }

    #[test]
    fn free_of_null_is_a_no_op() {
        let mut a = new_allocator(4096);
        a.free(None);
        assert!(a.check_heap().is_ok());
    }

    #[test]
    fn allocate_zero_returns_minimum_block() {
        let mut a = new_allocator(4096);
        let p = a.allocate(0).expect("allocate(0) should succeed");
        // SAFETY: `p` is a live payload.
        let block = unsafe { block::block_from_payload(p) };
        assert_eq!(unsafe { block::size_of_block(block) }, MIN_BLOCK_SIZE);
    }

    #[test]
    fn allocation_fails_cleanly_on_region_exhaustion() {
        // Room for init's padding and exactly one 48-byte block; a second
        // allocation has nowhere left to grow into.
        let mut a = new_allocator(8 + 48);
        assert!(a.allocate(24).is_some());
        assert!(a.allocate(24).is_none());
    }
}
