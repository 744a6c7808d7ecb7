//! The host CPU platform.

use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::Mutex;

use helios_platform_api::{
    Dim3, KernelArg, KernelKey, LaunchConfig, Platform, PlatformKind, RuntimeError,
};

use crate::alloc::{HOST_ALIGNMENT, aligned_alloc, aligned_free};

/// The mandatory fallback platform backing device id 0.
///
/// Allocation is aligned host memory, copies are plain `memcpy`, and kernel
/// dispatch is validated but otherwise a no-op: host kernels are linked into
/// the client binary and never routed through the runtime. The launch state
/// machine is still fully tracked so configuration errors surface on the
/// host exactly as they would on an accelerator.
pub struct HostPlatform {
    launch: Mutex<LaunchConfig>,
    loaded: Mutex<HashSet<KernelKey>>,
}

impl HostPlatform {
    /// Creates the host platform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            launch: Mutex::new(LaunchConfig::new()),
            loaded: Mutex::new(HashSet::new()),
        }
    }

    fn launch_state(&self) -> std::sync::MutexGuard<'_, LaunchConfig> {
        self.launch.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HostPlatform {
    fn name(&self) -> &str {
        "CPU"
    }

    fn kind(&self) -> PlatformKind {
        PlatformKind::Host
    }

    fn dev_count(&self) -> usize {
        1
    }

    fn alloc(&self, _local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        let bytes = usize::try_from(size).map_err(|_| RuntimeError::OutOfMemory { size })?;
        aligned_alloc(bytes, HOST_ALIGNMENT).ok_or(RuntimeError::OutOfMemory { size })
    }

    unsafe fn release(&self, _local: usize, ptr: NonNull<u8>) {
        // SAFETY: The caller guarantees `ptr` came from this platform's
        // alloc, which is aligned_alloc.
        unsafe { aligned_free(ptr) }
    }

    unsafe fn copy(
        &self,
        _src_local: usize,
        src: NonNull<u8>,
        _dst_local: usize,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // SAFETY: The caller guarantees both ranges are live, disjoint host
        // allocations of at least `bytes` bytes.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), bytes) }
        Ok(())
    }

    unsafe fn copy_from_host(
        &self,
        src: NonNull<u8>,
        dst_local: usize,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // Host-to-host: the same memcpy as an intra-platform copy.
        // SAFETY: Forwarded caller contract.
        unsafe { self.copy(0, src, dst_local, dst, bytes) }
    }

    unsafe fn copy_to_host(
        &self,
        src_local: usize,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // SAFETY: Forwarded caller contract.
        unsafe { self.copy(src_local, src, 0, dst, bytes) }
    }

    fn set_grid_size(&self, _local: usize, grid: Dim3) {
        self.launch_state().set_grid(grid);
    }

    fn set_block_size(&self, _local: usize, block: Dim3) {
        self.launch_state().set_block(block);
    }

    fn set_arg(&self, _local: usize, index: usize, arg: KernelArg) {
        self.launch_state().set_arg(index, arg);
    }

    fn load_kernel(&self, _local: usize, key: KernelKey) -> Result<(), RuntimeError> {
        let mut loaded = self.loaded.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if loaded.insert(key.clone()) {
            log::debug!("host: loaded kernel {}:{}", key.module, key.entry);
        } else {
            log::debug!("host: kernel cache hit for {}:{}", key.module, key.entry);
        }
        self.launch_state().set_kernel(key);
        Ok(())
    }

    fn launch_kernel(&self, _local: usize) -> Result<(), RuntimeError> {
        let state = self.launch_state();
        let bound = state.bound()?;
        log::debug!(
            "host: launch of {} is a no-op ({} args, grid {:?})",
            bound.kernel.entry,
            bound.args.len(),
            bound.grid,
        );
        Ok(())
    }

    fn synchronize(&self, _local: usize) -> Result<(), RuntimeError> {
        // Host work is synchronous; nothing to drain.
        Ok(())
    }
}
