// =============================================================================
// Block Layout
// =============================================================================
//
// Every block is a contiguous span inside the heap area:
//
//   [ header (1 word) | payload ... | footer (1 word) ]
//
// The header encodes the block's total size (header + payload + footer) in
// its high bits and an allocated flag in the low bit — sizes are always
// `ALIGNMENT`-aligned (>= 16), so that low bit is never part of the size.
// The footer duplicates the size only, which is what lets `prev_physical`
// find the previous block in O(1): read the word immediately before this
// block's header, treat it as the previous block's footer, and subtract
// that size from this block's base address.
//
// A free block's first two payload words are reinterpreted as the explicit
// free list's `prev`/`next` links (see `freelist.rs`). Which interpretation
// applies is keyed entirely by the header's allocated bit — there is no
// typed union, because the interpretation does not outlive the transition
// between allocated and free.
//
// All functions here operate on a block's base address (the address of its
// header) as a `NonNull<u8>`. None of them are safe to call unless that
// address genuinely points at a live block header inside a heap area this
// crate manages — that contract is carried by the `# Safety` docs.
//
// =============================================================================

use core::mem::size_of;
use core::ptr::NonNull;

/// Machine word size, in bytes.
pub const WORD_SIZE: usize = size_of::<usize>();

/// Every payload address handed to a caller is a multiple of this.
pub const ALIGNMENT: usize = 2 * WORD_SIZE;

/// Header + two free-list pointers + footer, rounded up to `ALIGNMENT`.
/// Computed once from the target's pointer size — never hard-coded.
pub const MIN_BLOCK_SIZE: usize = round_up(WORD_SIZE + 2 * WORD_SIZE + WORD_SIZE, ALIGNMENT);

const ALLOCATED_BIT: usize = 0b1;

/// Rounds `value` up to the nearest multiple of `align` (`align` a power of two).
pub const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

/// The header/footer word for a block of `size` bytes, with the allocated
/// flag set as given. `size` must already be `ALIGNMENT`-aligned.
const fn pack(size: usize, allocated: bool) -> usize {
    size | (allocated as usize)
}

const fn unpack_size(word: usize) -> usize {
    word & !ALLOCATED_BIT
}

const fn unpack_allocated(word: usize) -> bool {
    word & ALLOCATED_BIT != 0
}

/// Pointer to a block's header word, given its base address.
fn header_ptr(base: NonNull<u8>) -> *mut usize {
    base.as_ptr().cast::<usize>()
}

/// Pointer to a block's footer word, given its base address and total size.
///
/// # Safety
/// `base` must be the base of a live block of exactly `size` bytes.
unsafe fn footer_ptr(base: NonNull<u8>, size: usize) -> *mut usize {
    unsafe { base.as_ptr().add(size - WORD_SIZE).cast::<usize>() }
}

/// Reads a block's total size from its header.
///
/// # Safety
/// `base` must be the base of a live block.
pub unsafe fn size_of_block(base: NonNull<u8>) -> usize {
    unsafe { unpack_size(header_ptr(base).read()) }
}

/// Reads a block's allocated flag from its header.
///
/// # Safety
/// `base` must be the base of a live block.
pub unsafe fn is_allocated(base: NonNull<u8>) -> bool {
    unsafe { unpack_allocated(header_ptr(base).read()) }
}

/// Reads a block's size as recorded in its footer, independent of the
/// header. Used only by `check_heap` to verify the two agree.
///
/// # Safety
/// `base` must be the base of a live block of exactly `size` bytes.
pub unsafe fn read_footer_size(base: NonNull<u8>, size: usize) -> usize {
    unsafe { footer_ptr(base, size).read() }
}

/// Writes a block's header and footer, marking it with `allocated`.
///
/// # Safety
/// `base .. base + size` must be writable heap-area bytes, and `size` must
/// be `ALIGNMENT`-aligned and at least `MIN_BLOCK_SIZE`.
pub unsafe fn write_block(base: NonNull<u8>, size: usize, allocated: bool) {
    debug_assert_eq!(size % ALIGNMENT, 0);
    debug_assert!(size >= MIN_BLOCK_SIZE);
    unsafe {
        header_ptr(base).write(pack(size, allocated));
        footer_ptr(base, size).write(size);
    }
}

/// Updates only the allocated flag, leaving the size untouched.
///
/// # Safety
/// `base` must be the base of a live block.
pub unsafe fn set_allocated(base: NonNull<u8>, allocated: bool) {
    unsafe {
        let size = size_of_block(base);
        header_ptr(base).write(pack(size, allocated));
        // The footer carries no flag, but rewriting it is cheap and keeps
        // header/footer trivially equal for `check_heap`.
        footer_ptr(base, size).write(size);
    }
}

/// The payload address of a block, one word past its base.
///
/// `ALIGNMENT`-aligned as long as `base` itself is offset so that payloads
/// land on `ALIGNMENT` boundaries — `Allocator::init` arranges this once,
/// up front, by reserving leading padding before the first block.
///
/// # Safety
/// `base` must be the base of a live block.
pub unsafe fn payload_ptr(base: NonNull<u8>) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(base.as_ptr().add(WORD_SIZE)) }
}

/// Recovers a block's base address from a payload address previously
/// returned to the caller.
///
/// # Safety
/// `payload` must have been returned by this allocator's `allocate`,
/// `resize`, or `zero_allocate`.
pub unsafe fn block_from_payload(payload: NonNull<u8>) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(payload.as_ptr().sub(WORD_SIZE)) }
}

/// The address one past the end of a block — the base of its physical
/// successor, if one exists.
///
/// # Safety
/// `base` must be the base of a live block of exactly `size` bytes, and
/// `base + size` must not run past the end of the heap area.
pub unsafe fn next_physical(base: NonNull<u8>, size: usize) -> NonNull<u8> {
    unsafe { NonNull::new_unchecked(base.as_ptr().add(size)) }
}

/// The base address of a block's physical predecessor, found via the
/// boundary tag: the word immediately before `base` is the predecessor's
/// footer, which holds the predecessor's size.
///
/// # Safety
/// `base` must not be `heap_first` (there must be a live predecessor block
/// immediately before it in the heap area).
pub unsafe fn prev_physical(base: NonNull<u8>) -> NonNull<u8> {
    unsafe {
        let prev_footer = base.as_ptr().sub(WORD_SIZE).cast::<usize>();
        let prev_size = prev_footer.read();
        NonNull::new_unchecked(base.as_ptr().sub(prev_size))
    }
}
