//! Memory symbols: allocation, release, copy, and the unimplemented views.

use libc::c_void;

use helios_core::runtime;
use helios_platform_api::RuntimeError;

use crate::{ok_or_fatal, resolve_device};

/// Allocates `size` bytes of device memory on the masked device.
#[unsafe(no_mangle)]
pub extern "C" fn helios_alloc(dev: u32, size: i64) -> *mut c_void {
    let dev = resolve_device(dev);
    ok_or_fatal(runtime().alloc(dev, size)).as_ptr().cast()
}

/// Allocates pinned host-visible memory associated with the masked device.
#[unsafe(no_mangle)]
pub extern "C" fn helios_alloc_host(dev: u32, size: i64) -> *mut c_void {
    let dev = resolve_device(dev);
    ok_or_fatal(runtime().alloc_host(dev, size)).as_ptr().cast()
}

/// Allocates unified-address memory where the platform supports it.
#[unsafe(no_mangle)]
pub extern "C" fn helios_alloc_unified(dev: u32, size: i64) -> *mut c_void {
    let dev = resolve_device(dev);
    ok_or_fatal(runtime().alloc_unified(dev, size)).as_ptr().cast()
}

/// Translates a host alias of a unified allocation to its device address.
///
/// # Safety
///
/// `ptr` must be a pointer previously returned by [`helios_alloc_unified`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_get_device_ptr(dev: u32, ptr: *mut c_void) -> *mut c_void {
    let dev = resolve_device(dev);
    ok_or_fatal(runtime().get_device_ptr(dev, ptr.cast())).as_ptr().cast()
}

/// Frees a device allocation. The device argument is advisory; ownership is
/// looked up in the allocation table.
///
/// # Safety
///
/// `ptr` must be a pointer previously returned by a `helios_alloc*` call
/// and not released since.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_release(_dev: u32, ptr: *mut c_void) {
    ok_or_fatal(runtime().release(ptr.cast()));
}

/// Frees a pinned host allocation.
///
/// # Safety
///
/// `ptr` must be a pointer previously returned by [`helios_alloc_host`] and
/// not released since.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_release_host(_dev: u32, ptr: *mut c_void) {
    ok_or_fatal(runtime().release_host(ptr.cast()));
}

/// Copies `size` bytes from `src + src_off` to `dst + dst_off`.
///
/// Both pointers must be runtime allocations; routing between address
/// spaces follows the copy router. The device arguments are advisory.
///
/// # Safety
///
/// Both pointers must be live runtime allocations and the two byte ranges
/// must not overlap.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_copy(
    _src_dev: u32,
    src: *const c_void,
    src_off: i64,
    _dst_dev: u32,
    dst: *mut c_void,
    dst_off: i64,
    size: i64,
) {
    ok_or_fatal(runtime().copy(src.cast(), src_off, dst.cast(), dst_off, size));
}

/// Host-visible views of device memory are deliberately unimplemented.
#[unsafe(no_mangle)]
pub extern "C" fn helios_map(_ptr: *mut c_void, _offset: i64, _size: i64) -> *mut c_void {
    helios_core::fatal(&RuntimeError::BackendFailure(String::from(
        "map is not implemented",
    )))
}

/// Counterpart of [`helios_map`]; equally unimplemented.
#[unsafe(no_mangle)]
pub extern "C" fn helios_unmap(_view: *mut c_void) {
    helios_core::fatal(&RuntimeError::BackendFailure(String::from(
        "unmap is not implemented",
    )))
}

/// Host-side aligned allocation, independent of the allocation table.
#[unsafe(no_mangle)]
pub extern "C" fn helios_aligned_malloc(size: usize, align: usize) -> *mut c_void {
    match helios_host::alloc::aligned_alloc(size, align) {
        Some(ptr) => ptr.as_ptr().cast(),
        None => std::ptr::null_mut(),
    }
}

/// Frees a pointer from [`helios_aligned_malloc`]. Null is a no-op.
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by [`helios_aligned_malloc`]
/// that has not been freed since.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_aligned_free(ptr: *mut c_void) {
    if let Some(ptr) = std::ptr::NonNull::new(ptr.cast::<u8>()) {
        // SAFETY: Caller contract: the pointer came from aligned_malloc.
        unsafe { helios_host::alloc::aligned_free(ptr) }
    }
}
