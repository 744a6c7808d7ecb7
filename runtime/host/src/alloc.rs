//! Aligned host allocation.
//!
//! Wraps `posix_memalign`/`free` rather than the Rust allocator because the
//! ABI's `aligned_free` receives only the pointer -- there is no size or
//! alignment to rebuild a `Layout` from at release time.

use core::ptr::{self, NonNull};

/// Default alignment for host buffers, wide enough for any SIMD load the
/// generated code may issue.
pub const HOST_ALIGNMENT: usize = 64;

/// Allocates `size` bytes aligned to `align`.
///
/// Returns `None` if the underlying allocator denies the request or the
/// requested size is zero. `align` is rounded up to pointer size, which
/// `posix_memalign` requires as a minimum.
#[must_use]
pub fn aligned_alloc(size: usize, align: usize) -> Option<NonNull<u8>> {
    if size == 0 {
        return None;
    }
    let align = align.max(size_of::<*mut libc::c_void>()).next_power_of_two();
    let mut raw: *mut libc::c_void = ptr::null_mut();
    // SAFETY: `raw` is a valid out-pointer and `align` satisfies the
    // power-of-two, pointer-size-multiple requirement.
    let rc = unsafe { libc::posix_memalign(&mut raw, align, size) };
    if rc != 0 {
        return None;
    }
    NonNull::new(raw.cast::<u8>())
}

/// Releases a pointer returned by [`aligned_alloc`].
///
/// # Safety
///
/// `ptr` must have been returned by [`aligned_alloc`] and not freed since.
pub unsafe fn aligned_free(ptr: NonNull<u8>) {
    // SAFETY: posix_memalign memory is released with free().
    unsafe { libc::free(ptr.as_ptr().cast::<libc::c_void>()) }
}
