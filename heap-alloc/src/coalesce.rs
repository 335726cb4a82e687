// =============================================================================
// Coalescing
// =============================================================================
//
// Constant-time merge of a newly freed block with its physically adjacent
// neighbors, found via boundary tags (no free-list search needed — the
// previous block's size comes straight from the footer word just before
// this block's header; the next block's base is just `block + size`).
//
// Four cases, by which neighbor (if any) is already free:
//
//   neither free  -> block becomes a new free-list entry
//   next free     -> next is absorbed into block; the merged block is the
//                     new free-list entry (next's old entry is removed)
//   prev free     -> block is absorbed into prev *in place*; prev keeps its
//                     existing free-list position, nothing is unlinked or
//                     reinserted
//   both free     -> next is absorbed into prev; prev again keeps its
//                     existing position; only next's free-list entry is
//                     removed
//
// The "keep prev in place" cases matter: extending a block that is already
// in the free list never needs a list mutation, only a header/footer
// rewrite. Only a block changing from *not free* to *free* (the merged
// survivor from a next-absorption, or a block with no free neighbor at
// all) needs inserting.
//
// =============================================================================

use core::ptr::NonNull;

use crate::block;
use crate::freelist::FreeList;

/// Recovers a freed block's physical neighbors and merges it with whichever
/// are already free, maintaining the free list and `heap_last` as it goes.
///
/// # Safety
/// - `block` must be the base of a live, currently-allocated block inside
///   the heap area bounded by `heap_first` and `*heap_last`.
/// - Every free block reachable from `list`'s head must be live.
pub unsafe fn free_and_coalesce(
    list: &mut FreeList,
    heap_first: NonNull<u8>,
    heap_last: &mut NonNull<u8>,
    block: NonNull<u8>,
) {
    let size = unsafe { block::size_of_block(block) };

    let prev = if block == heap_first {
        None
    } else {
        // SAFETY: `block != heap_first`, so a live predecessor exists.
        let candidate = unsafe { block::prev_physical(block) };
        if unsafe { block::is_allocated(candidate) } {
            None
        } else {
            Some(candidate)
        }
    };

    let next = if block == *heap_last {
        None
    } else {
        // SAFETY: `block != *heap_last`, so a live successor exists.
        let candidate = unsafe { block::next_physical(block, size) };
        if unsafe { block::is_allocated(candidate) } {
            None
        } else {
            Some(candidate)
        }
    };

    match (prev, next) {
        (None, None) => unsafe {
            block::write_block(block, size, false);
            list.insert(block);
        },
        (None, Some(next)) => unsafe {
            list.remove(next);
            let merged_size = size + block::size_of_block(next);
            if *heap_last == next {
                *heap_last = block;
            }
            block::write_block(block, merged_size, false);
            list.insert(block);
        },
        (Some(prev), None) => unsafe {
            let merged_size = block::size_of_block(prev) + size;
            if *heap_last == block {
                *heap_last = prev;
            }
            block::write_block(prev, merged_size, false);
        },
        (Some(prev), Some(next)) => unsafe {
            list.remove(next);
            let merged_size = block::size_of_block(prev) + size + block::size_of_block(next);
            if *heap_last == block || *heap_last == next {
                *heap_last = prev;
            }
            block::write_block(prev, merged_size, false);
        },
    }
}
