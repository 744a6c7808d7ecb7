//! The platform capability trait.
//!
//! One implementation per supported accelerator family, plus the mandatory
//! host platform. The runtime core holds platforms as trait objects and
//! translates dense device ids into platform-local indices before every
//! call, so implementations only ever see their own devices.

use core::ptr::NonNull;

use crate::device::PlatformKind;
use crate::error::RuntimeError;
use crate::launch::{Dim3, KernelArg, KernelKey};

/// Capability surface of one compute platform.
///
/// All device indices are platform-local (`0..dev_count()`); the registry
/// guarantees they are in range. Likewise, every pointer passed back into a
/// platform was previously returned by that same platform -- the allocation
/// table guarantees foreign pointers never cross this boundary.
pub trait Platform: Send + Sync {
    /// Human-readable platform name, e.g. `"CPU"` or `"CUDA"`.
    fn name(&self) -> &str;

    /// The platform family this implementation drives.
    fn kind(&self) -> PlatformKind;

    /// Number of devices this platform exposes. At least 1 for the host.
    fn dev_count(&self) -> usize;

    /// Allocates `size` bytes of device memory.
    ///
    /// Fails with [`RuntimeError::OutOfMemory`] if the driver denies the
    /// request. The returned pointer is opaque to the runtime and passed
    /// back verbatim.
    fn alloc(&self, local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError>;

    /// Allocates pinned host-visible memory associated with device `local`.
    ///
    /// Platforms without a distinct pinned path fall back to [`Platform::alloc`].
    fn alloc_host(&self, local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        self.alloc(local, size)
    }

    /// Allocates unified-address memory visible from host and device.
    ///
    /// Platforms without unified addressing fall back to [`Platform::alloc`].
    fn alloc_unified(&self, local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        self.alloc(local, size)
    }

    /// Translates a host alias of a unified allocation to its device address.
    ///
    /// The identity translation is correct wherever host and device share an
    /// address space.
    fn get_device_ptr(
        &self,
        _local: usize,
        host_ptr: NonNull<u8>,
    ) -> Result<NonNull<u8>, RuntimeError> {
        Ok(host_ptr)
    }

    /// Releases an allocation previously returned by [`Platform::alloc`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this platform's `alloc` (or
    /// `alloc_unified`) for device `local` and not released since.
    unsafe fn release(&self, local: usize, ptr: NonNull<u8>);

    /// Releases a pinned host allocation from [`Platform::alloc_host`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this platform's `alloc_host` and not
    /// released since.
    unsafe fn release_host(&self, local: usize, ptr: NonNull<u8>) {
        // SAFETY: Forwarded contract; the default alloc_host is alloc.
        unsafe { self.release(local, ptr) }
    }

    /// Copies `bytes` bytes between two allocations on this platform.
    ///
    /// # Safety
    ///
    /// Both pointers must originate from this platform and stay valid for
    /// `bytes` bytes; the ranges must not overlap.
    unsafe fn copy(
        &self,
        src_local: usize,
        src: NonNull<u8>,
        dst_local: usize,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError>;

    /// Copies `bytes` bytes from host memory into a device allocation.
    ///
    /// # Safety
    ///
    /// `src` must be valid host memory and `dst` a live allocation of this
    /// platform, both for `bytes` bytes.
    unsafe fn copy_from_host(
        &self,
        src: NonNull<u8>,
        dst_local: usize,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError>;

    /// Copies `bytes` bytes from a device allocation into host memory.
    ///
    /// # Safety
    ///
    /// `src` must be a live allocation of this platform and `dst` valid host
    /// memory, both for `bytes` bytes.
    unsafe fn copy_to_host(
        &self,
        src_local: usize,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError>;

    /// Sets the grid extent for the next launch on device `local`.
    fn set_grid_size(&self, local: usize, grid: Dim3);

    /// Sets the block extent for the next launch on device `local`.
    fn set_block_size(&self, local: usize, block: Dim3);

    /// Binds argument slot `index` for the next launch. Last write wins.
    fn set_arg(&self, local: usize, index: usize, arg: KernelArg);

    /// Establishes the current kernel for device `local`.
    ///
    /// Idempotent: repeated loads of the same `(module, entry)` pair hit the
    /// per-device cache and do not re-read the module file.
    fn load_kernel(&self, local: usize, key: KernelKey) -> Result<(), RuntimeError>;

    /// Dispatches the currently configured kernel with the currently bound
    /// grid, block, and arguments.
    ///
    /// Fails with [`RuntimeError::NoKernelLoaded`] or
    /// [`RuntimeError::MissingArgument`] on incomplete configuration. The
    /// configuration is left intact for subsequent launches.
    fn launch_kernel(&self, local: usize) -> Result<(), RuntimeError>;

    /// Blocks until all prior work on device `local` has completed.
    fn synchronize(&self, local: usize) -> Result<(), RuntimeError>;
}

/// Shared handles dispatch like the platform they wrap, so an embedder can
/// register a platform with the runtime and keep its own handle to it.
impl<P: Platform + ?Sized> Platform for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> PlatformKind {
        (**self).kind()
    }

    fn dev_count(&self) -> usize {
        (**self).dev_count()
    }

    fn alloc(&self, local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        (**self).alloc(local, size)
    }

    fn alloc_host(&self, local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        (**self).alloc_host(local, size)
    }

    fn alloc_unified(&self, local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        (**self).alloc_unified(local, size)
    }

    fn get_device_ptr(
        &self,
        local: usize,
        host_ptr: NonNull<u8>,
    ) -> Result<NonNull<u8>, RuntimeError> {
        (**self).get_device_ptr(local, host_ptr)
    }

    unsafe fn release(&self, local: usize, ptr: NonNull<u8>) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).release(local, ptr) }
    }

    unsafe fn release_host(&self, local: usize, ptr: NonNull<u8>) {
        // SAFETY: Forwarded contract.
        unsafe { (**self).release_host(local, ptr) }
    }

    unsafe fn copy(
        &self,
        src_local: usize,
        src: NonNull<u8>,
        dst_local: usize,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // SAFETY: Forwarded contract.
        unsafe { (**self).copy(src_local, src, dst_local, dst, bytes) }
    }

    unsafe fn copy_from_host(
        &self,
        src: NonNull<u8>,
        dst_local: usize,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // SAFETY: Forwarded contract.
        unsafe { (**self).copy_from_host(src, dst_local, dst, bytes) }
    }

    unsafe fn copy_to_host(
        &self,
        src_local: usize,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // SAFETY: Forwarded contract.
        unsafe { (**self).copy_to_host(src_local, src, dst, bytes) }
    }

    fn set_grid_size(&self, local: usize, grid: Dim3) {
        (**self).set_grid_size(local, grid);
    }

    fn set_block_size(&self, local: usize, block: Dim3) {
        (**self).set_block_size(local, block);
    }

    fn set_arg(&self, local: usize, index: usize, arg: KernelArg) {
        (**self).set_arg(local, index, arg);
    }

    fn load_kernel(&self, local: usize, key: KernelKey) -> Result<(), RuntimeError> {
        (**self).load_kernel(local, key)
    }

    fn launch_kernel(&self, local: usize) -> Result<(), RuntimeError> {
        (**self).launch_kernel(local)
    }

    fn synchronize(&self, local: usize) -> Result<(), RuntimeError> {
        (**self).synchronize(local)
    }
}
