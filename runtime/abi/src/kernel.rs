//! Kernel symbols: atomic configure-and-launch, synchronize.

use std::ffi::CStr;

use libc::{c_char, c_void};

use helios_core::runtime;
use helios_platform_api::{ArgKind, Dim3, KernelArg, KernelKey, RuntimeError};

use crate::{ok_or_fatal, resolve_device};

/// Reads a required, NUL-terminated ABI string.
///
/// # Safety
///
/// `ptr` must be null (fatal) or a valid NUL-terminated string.
unsafe fn abi_str(ptr: *const c_char, what: &str) -> String {
    if ptr.is_null() {
        helios_core::fatal(&RuntimeError::BackendFailure(format!("null {what}")));
    }
    // SAFETY: Checked non-null; caller guarantees NUL termination.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Reads a `[x, y, z]` extent array.
///
/// # Safety
///
/// `ptr` must point to three readable `u32`s.
unsafe fn abi_dim3(ptr: *const u32) -> Dim3 {
    // SAFETY: Caller contract: three-element array.
    let dims = unsafe { std::slice::from_raw_parts(ptr, 3) };
    Dim3::new(dims[0], dims[1], dims[2])
}

/// Configures and launches a kernel in one call.
///
/// Loads `module`/`entry` (cached per device), sets the grid and block
/// extents, binds `num_args` positional arguments (copying each argument's
/// bytes out of the caller's buffers), and dispatches. The configuration
/// persists on the device afterwards, as with any other launch.
///
/// # Safety
///
/// `module` and `entry` must be NUL-terminated strings; `grid` and `block`
/// must point to three `u32`s each; `args`, `arg_sizes`, and `arg_kinds`
/// must be `num_args`-element arrays, with `args[i]` readable for
/// `arg_sizes[i]` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn helios_launch_kernel(
    dev: u32,
    module: *const c_char,
    entry: *const c_char,
    grid: *const u32,
    block: *const u32,
    args: *mut *mut c_void,
    arg_sizes: *const u32,
    arg_kinds: *const u8,
    num_args: u32,
) {
    let dev = resolve_device(dev);
    let rt = runtime();

    // SAFETY: Caller contract for strings and extent arrays.
    let (module, entry, grid, block) = unsafe {
        (
            abi_str(module, "kernel module path"),
            abi_str(entry, "kernel entry name"),
            abi_dim3(grid),
            abi_dim3(block),
        )
    };

    ok_or_fatal(rt.load_kernel(dev, KernelKey::new(module, entry)));
    ok_or_fatal(rt.set_grid_size(dev, grid));
    ok_or_fatal(rt.set_block_size(dev, block));

    // Indexed reads rather than slices: the three arrays may be null when
    // num_args is 0.
    for index in 0..num_args as usize {
        // SAFETY: Caller contract: three parallel num_args-element arrays.
        let (value, size, raw_kind) =
            unsafe { (*args.add(index), *arg_sizes.add(index), *arg_kinds.add(index)) };
        let Some(kind) = ArgKind::from_raw(raw_kind) else {
            helios_core::fatal(&RuntimeError::BackendFailure(format!(
                "unknown argument kind {raw_kind} in slot {index}"
            )));
        };
        // SAFETY: Caller contract: args[i] is readable for arg_sizes[i] bytes.
        let arg = unsafe { KernelArg::from_raw(value.cast(), size as usize, kind) };
        ok_or_fatal(rt.set_arg(dev, index, arg));
    }

    ok_or_fatal(rt.launch_kernel(dev));
}

/// Blocks until all prior work on the masked device has completed.
#[unsafe(no_mangle)]
pub extern "C" fn helios_synchronize(dev: u32) {
    let dev = resolve_device(dev);
    ok_or_fatal(runtime().synchronize(dev));
}
