// =============================================================================
// Region Interface
// =============================================================================
//
// A thin contract over a grow-only contiguous byte region — the "brk-style"
// primitive the allocator consumes but does not implement. The allocator
// never shrinks the region, never moves previously returned addresses, and
// never touches bytes outside what it has grown into.
//
// =============================================================================

use core::ptr::NonNull;

/// A grow-only contiguous byte region.
///
/// Implementors must uphold:
/// - the region is flat and contiguous: the byte immediately after address
///   `A` returned by one `grow` call is the first byte of the next `grow`
///   call's span, with no gaps;
/// - addresses already returned remain valid for the lifetime of the
///   provider — the region never shrinks and never moves;
/// - `grow` either extends the region by exactly `bytes` and returns the
///   previous end (the base of the newly grown span), or signals
///   exhaustion by returning `None`.
pub trait RegionProvider {
    /// Grows the region by `bytes` and returns the previous end (the base
    /// address of the newly available span), or `None` if the region
    /// cannot be grown by that amount.
    fn grow(&mut self, bytes: usize) -> Option<NonNull<u8>>;
}
