//! The runtime: device registry, allocation table, and dispatch.
//!
//! A [`Runtime`] owns its platforms and every allocation made through them.
//! Dense device ids are assigned at construction in registration order;
//! the host platform registers first, so id 0 is always the host. All
//! pointer-accepting entry points resolve through the allocation table
//! before any platform sees the pointer.
//!
//! Lock discipline: the allocation-table mutex is acquired before any
//! platform call that needs it, and platforms take only their own
//! per-device locks underneath. Never the reverse.

use std::io;
use std::ptr::NonNull;
use std::sync::Mutex;

use helios_platform_api::{
    DeviceId, DeviceMask, Dim3, KernelArg, KernelKey, Platform, PlatformKind, RuntimeError,
};

use crate::copy::{self, CopyRoute};
use crate::table::{Allocation, AllocationTable};
use crate::time::Clock;

/// One registered `(platform, local index)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Device {
    /// Index into the platform vector.
    platform: usize,
    /// Platform-local device index, `< dev_count()`.
    local: usize,
}

/// Assembles a [`Runtime`], host platform first.
///
/// Optional accelerator platforms are appended in call order; the
/// `HELIOS_PLATFORMS` environment variable can reorder or drop them at
/// startup without a rebuild.
pub struct RuntimeBuilder {
    platforms: Vec<Box<dyn Platform>>,
}

impl RuntimeBuilder {
    /// Creates a builder seeded with the mandatory host platform.
    #[must_use]
    pub fn new() -> Self {
        Self {
            platforms: vec![Box::new(helios_host::HostPlatform::new())],
        }
    }

    /// Registers an accelerator platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Box<dyn Platform>) -> Self {
        self.platforms.push(platform);
        self
    }

    /// Builds the runtime, honouring `HELIOS_PLATFORMS` if set.
    #[must_use]
    pub fn build(self) -> Runtime {
        let order = std::env::var("HELIOS_PLATFORMS").ok();
        self.build_with_order(order.as_deref())
    }

    /// Builds with an explicit selection order (`None` keeps call order).
    ///
    /// The order string is a comma-separated list of platform names
    /// (`"cuda,opencl"`). Listed platforms register in list order; unlisted
    /// non-host platforms are dropped; unknown names are ignored with a
    /// warning. The host platform always registers first regardless.
    #[must_use]
    pub fn build_with_order(self, order: Option<&str>) -> Runtime {
        let platforms = match order {
            None => self.platforms,
            Some(list) => Self::select(self.platforms, list),
        };

        let mut devices = Vec::new();
        for (index, platform) in platforms.iter().enumerate() {
            for local in 0..platform.dev_count() {
                devices.push(Device {
                    platform: index,
                    local,
                });
            }
            log::debug!(
                "registered platform {} with {} device(s)",
                platform.name(),
                platform.dev_count(),
            );
        }

        Runtime {
            platforms,
            devices,
            table: Mutex::new(AllocationTable::new()),
        }
    }

    /// Applies a `HELIOS_PLATFORMS` selection to the non-host platforms.
    fn select(platforms: Vec<Box<dyn Platform>>, list: &str) -> Vec<Box<dyn Platform>> {
        let mut pool: Vec<Option<Box<dyn Platform>>> = platforms.into_iter().map(Some).collect();
        let mut selected = Vec::with_capacity(pool.len());
        // Host stays pinned at index 0.
        selected.push(pool[0].take().expect("builder always seeds the host platform"));

        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some(kind) = PlatformKind::from_name(name) else {
                log::warn!("HELIOS_PLATFORMS: unknown platform name '{name}' ignored");
                continue;
            };
            if kind == PlatformKind::Host {
                continue;
            }
            for slot in &mut pool {
                if slot.as_ref().is_some_and(|p| p.kind() == kind) {
                    selected.push(slot.take().expect("checked is_some above"));
                }
            }
        }

        for dropped in pool.into_iter().flatten() {
            log::debug!("HELIOS_PLATFORMS: platform {} not selected", dropped.name());
        }
        selected
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The platform-abstraction and device-memory/dispatch layer.
pub struct Runtime {
    platforms: Vec<Box<dyn Platform>>,
    devices: Vec<Device>,
    table: Mutex<AllocationTable>,
}

impl Runtime {
    /// Starts assembling a runtime.
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Number of registered devices across all platforms.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of live allocations in the table.
    #[must_use]
    pub fn live_allocations(&self) -> usize {
        self.table().len()
    }

    /// Resolves an ABI device mask to the dense device id.
    pub fn resolve(&self, mask: DeviceMask) -> Result<DeviceId, RuntimeError> {
        let unknown = || RuntimeError::UnknownDevice(DeviceId(mask.0 as usize));
        let kind = mask.kind().ok_or_else(unknown)?;
        let local = mask.local_index();
        let mut base = 0;
        for platform in &self.platforms {
            if platform.kind() == kind {
                if local < platform.dev_count() {
                    return Ok(DeviceId(base + local));
                }
                return Err(unknown());
            }
            base += platform.dev_count();
        }
        Err(unknown())
    }

    /// Prints the available platforms and their device counts.
    pub fn display_info(&self, out: &mut impl io::Write) -> io::Result<()> {
        writeln!(out, "Available platforms:")?;
        for platform in &self.platforms {
            writeln!(out, "    * {}: {} device(s)", platform.name(), platform.dev_count())?;
        }
        Ok(())
    }

    /// Allocates `size` bytes of device memory on `dev`.
    pub fn alloc(&self, dev: DeviceId, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        self.alloc_with(dev, size, |p, local, size| p.alloc(local, size))
    }

    /// Allocates pinned host-visible memory associated with `dev`.
    pub fn alloc_host(&self, dev: DeviceId, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        self.alloc_with(dev, size, |p, local, size| p.alloc_host(local, size))
    }

    /// Allocates unified-address memory on `dev` where supported.
    pub fn alloc_unified(&self, dev: DeviceId, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        self.alloc_with(dev, size, |p, local, size| p.alloc_unified(local, size))
    }

    fn alloc_with(
        &self,
        dev: DeviceId,
        size: i64,
        do_alloc: impl Fn(&dyn Platform, usize, i64) -> Result<NonNull<u8>, RuntimeError>,
    ) -> Result<NonNull<u8>, RuntimeError> {
        let device = self.device(dev)?;
        let mut table = self.table();
        let ptr = do_alloc(self.platforms[device.platform].as_ref(), device.local, size)?;
        table.insert(ptr, Allocation { dev, size });
        log::debug!("alloc {size} bytes on device {dev} -> {ptr:p}");
        Ok(ptr)
    }

    /// Translates a host alias of a unified allocation to its device address.
    pub fn get_device_ptr(
        &self,
        dev: DeviceId,
        host_ptr: *mut u8,
    ) -> Result<NonNull<u8>, RuntimeError> {
        let device = self.device(dev)?;
        let host_ptr = NonNull::new(host_ptr).ok_or(RuntimeError::UnknownPointer)?;
        self.table().lookup(host_ptr)?;
        self.platforms[device.platform].get_device_ptr(device.local, host_ptr)
    }

    /// Releases a device allocation.
    pub fn release(&self, ptr: *mut u8) -> Result<(), RuntimeError> {
        self.release_with(ptr, |platform, local, ptr| {
            // SAFETY: The table lookup proved this pointer is a live
            // allocation owned by exactly this platform.
            unsafe { platform.release(local, ptr) }
        })
    }

    /// Releases a pinned host allocation.
    pub fn release_host(&self, ptr: *mut u8) -> Result<(), RuntimeError> {
        self.release_with(ptr, |platform, local, ptr| {
            // SAFETY: As in `release`; the table vouches for ownership.
            unsafe { platform.release_host(local, ptr) }
        })
    }

    fn release_with(
        &self,
        ptr: *mut u8,
        do_release: impl Fn(&dyn Platform, usize, NonNull<u8>),
    ) -> Result<(), RuntimeError> {
        let ptr = NonNull::new(ptr).ok_or(RuntimeError::UnknownPointer)?;
        let mut table = self.table();
        let allocation = table.remove(ptr)?;
        let device = self.device(allocation.dev)?;
        do_release(self.platforms[device.platform].as_ref(), device.local, ptr);
        log::debug!("released {ptr:p} ({} bytes on device {})", allocation.size, allocation.dev);
        Ok(())
    }

    /// Looks up the owning device and size of a runtime pointer.
    pub fn memory_info(&self, ptr: *mut u8) -> Result<Allocation, RuntimeError> {
        let ptr = NonNull::new(ptr).ok_or(RuntimeError::UnknownPointer)?;
        self.table().lookup(ptr)
    }

    /// Copies `size` bytes between two runtime allocations with explicit
    /// byte offsets.
    ///
    /// Routing follows the copy router: intra-platform, host to device, or
    /// device to host. Two distinct accelerator platforms are rejected;
    /// staging through a host buffer is the client's responsibility.
    pub fn copy(
        &self,
        src: *const u8,
        src_offset: i64,
        dst: *mut u8,
        dst_offset: i64,
        size: i64,
    ) -> Result<(), RuntimeError> {
        let src = NonNull::new(src.cast_mut()).ok_or(RuntimeError::UnknownPointer)?;
        let dst = NonNull::new(dst).ok_or(RuntimeError::UnknownPointer)?;

        // Copies hold the table lock so they serialise with release; a
        // buffer cannot disappear mid-copy.
        let table = self.table();
        let src_alloc = table.lookup(src)?;
        let dst_alloc = table.lookup(dst)?;
        copy::check_bounds(src_offset, size, src_alloc)?;
        copy::check_bounds(dst_offset, size, dst_alloc)?;

        let src_device = self.device(src_alloc.dev)?;
        let dst_device = self.device(dst_alloc.dev)?;
        let route = copy::classify(
            src_alloc.dev,
            dst_alloc.dev,
            src_device.platform == dst_device.platform,
        )?;

        // Offsets were bounds-checked against the owning allocations.
        let bytes = size as usize;
        // SAFETY: offset stays within the allocation per check_bounds.
        let src = unsafe { NonNull::new_unchecked(src.as_ptr().offset(src_offset as isize)) };
        // SAFETY: as above for the destination.
        let dst = unsafe { NonNull::new_unchecked(dst.as_ptr().offset(dst_offset as isize)) };

        log::debug!(
            "copy {bytes} bytes: device {} -> device {} ({route:?})",
            src_alloc.dev,
            dst_alloc.dev,
        );
        match route {
            // SAFETY: Both pointers are live allocations of this platform,
            // valid for `bytes` bytes past the checked offsets.
            CopyRoute::Intra => unsafe {
                self.platforms[src_device.platform].copy(
                    src_device.local,
                    src,
                    dst_device.local,
                    dst,
                    bytes,
                )
            },
            // SAFETY: Source is a live host allocation, destination a live
            // allocation of the destination platform.
            CopyRoute::FromHost => unsafe {
                self.platforms[dst_device.platform].copy_from_host(
                    src,
                    dst_device.local,
                    dst,
                    bytes,
                )
            },
            // SAFETY: Mirror of FromHost.
            CopyRoute::ToHost => unsafe {
                self.platforms[src_device.platform].copy_to_host(
                    src_device.local,
                    src,
                    dst,
                    bytes,
                )
            },
        }
    }

    /// Sets the grid extent for the next launch on `dev`.
    pub fn set_grid_size(&self, dev: DeviceId, grid: Dim3) -> Result<(), RuntimeError> {
        let device = self.device(dev)?;
        self.platforms[device.platform].set_grid_size(device.local, grid);
        Ok(())
    }

    /// Sets the block extent for the next launch on `dev`.
    pub fn set_block_size(&self, dev: DeviceId, block: Dim3) -> Result<(), RuntimeError> {
        let device = self.device(dev)?;
        self.platforms[device.platform].set_block_size(device.local, block);
        Ok(())
    }

    /// Binds argument slot `index` for the next launch on `dev`.
    pub fn set_arg(&self, dev: DeviceId, index: usize, arg: KernelArg) -> Result<(), RuntimeError> {
        let device = self.device(dev)?;
        self.platforms[device.platform].set_arg(device.local, index, arg);
        Ok(())
    }

    /// Establishes the current kernel for `dev` (cached per device).
    pub fn load_kernel(&self, dev: DeviceId, key: KernelKey) -> Result<(), RuntimeError> {
        let device = self.device(dev)?;
        self.platforms[device.platform].load_kernel(device.local, key)
    }

    /// Dispatches the currently configured kernel on `dev`.
    ///
    /// The observed wall time of the platform call is added to the global
    /// kernel-time accumulator.
    pub fn launch_kernel(&self, dev: DeviceId) -> Result<(), RuntimeError> {
        let device = self.device(dev)?;
        let start = std::time::Instant::now();
        self.platforms[device.platform].launch_kernel(device.local)?;
        let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        Clock::add_kernel_micros(micros);
        log::debug!("launched kernel on device {dev} ({micros} us)");
        Ok(())
    }

    /// Blocks until all prior work on `dev` has completed.
    pub fn synchronize(&self, dev: DeviceId) -> Result<(), RuntimeError> {
        let device = self.device(dev)?;
        self.platforms[device.platform].synchronize(device.local)
    }

    fn device(&self, dev: DeviceId) -> Result<Device, RuntimeError> {
        self.devices
            .get(dev.0)
            .copied()
            .ok_or(RuntimeError::UnknownDevice(dev))
    }

    fn table(&self) -> std::sync::MutexGuard<'_, AllocationTable> {
        self.table.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let live = self.table().len();
        assert!(live == 0, "{live} memory block(s) have not been released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_platform_api::{ArgKind, PlatformKind};

    fn runtime() -> Runtime {
        Runtime::builder().build_with_order(None)
    }

    #[test]
    fn host_is_device_zero() {
        let rt = runtime();
        assert_eq!(rt.device_count(), 1);
        let mask = DeviceMask::new(PlatformKind::Host, 0);
        assert_eq!(rt.resolve(mask).unwrap(), DeviceId::HOST);
    }

    #[test]
    fn unregistered_platform_is_unknown_device() {
        let rt = runtime();
        let mask = DeviceMask::new(PlatformKind::Cuda, 0);
        assert!(matches!(
            rt.resolve(mask).unwrap_err(),
            RuntimeError::UnknownDevice(_)
        ));
    }

    #[test]
    fn out_of_range_dense_id_is_unknown_device() {
        let rt = runtime();
        assert_eq!(
            rt.alloc(DeviceId(9), 64).unwrap_err(),
            RuntimeError::UnknownDevice(DeviceId(9))
        );
    }

    #[test]
    fn alloc_lookup_release() {
        let rt = runtime();
        let ptr = rt.alloc(DeviceId::HOST, 256).unwrap();
        let info = rt.memory_info(ptr.as_ptr()).unwrap();
        assert_eq!(info.dev, DeviceId::HOST);
        assert_eq!(info.size, 256);
        rt.release(ptr.as_ptr()).unwrap();
        assert_eq!(
            rt.memory_info(ptr.as_ptr()).unwrap_err(),
            RuntimeError::UnknownPointer
        );
    }

    #[test]
    fn release_of_foreign_pointer_fails() {
        let rt = runtime();
        let mut local = 0_u8;
        assert_eq!(
            rt.release(std::ptr::from_mut(&mut local)).unwrap_err(),
            RuntimeError::UnknownPointer
        );
        assert_eq!(rt.release(std::ptr::null_mut()).unwrap_err(), RuntimeError::UnknownPointer);
    }

    #[test]
    fn unified_and_pinned_allocations_share_the_table() {
        let rt = runtime();
        let unified = rt.alloc_unified(DeviceId::HOST, 64).unwrap();
        let pinned = rt.alloc_host(DeviceId::HOST, 64).unwrap();
        assert_eq!(rt.live_allocations(), 2);

        // Host and device share an address space: the alias is the identity.
        let dev_ptr = rt.get_device_ptr(DeviceId::HOST, unified.as_ptr()).unwrap();
        assert_eq!(dev_ptr, unified);

        rt.release(unified.as_ptr()).unwrap();
        rt.release_host(pinned.as_ptr()).unwrap();
        assert_eq!(rt.live_allocations(), 0);
    }

    #[test]
    fn host_copy_round_trip_with_offsets() {
        let rt = runtime();
        let src = rt.alloc(DeviceId::HOST, 64).unwrap();
        let dst = rt.alloc(DeviceId::HOST, 64).unwrap();
        // SAFETY: live 64-byte host buffers.
        unsafe {
            src.as_ptr().write_bytes(0x11, 64);
            rt.copy(src.as_ptr(), 16, dst.as_ptr(), 32, 16).unwrap();
            assert_eq!(*dst.as_ptr().add(32), 0x11);
        }
        rt.release(src.as_ptr()).unwrap();
        rt.release(dst.as_ptr()).unwrap();
    }

    #[test]
    fn copy_out_of_bounds_is_rejected() {
        let rt = runtime();
        let src = rt.alloc(DeviceId::HOST, 64).unwrap();
        let dst = rt.alloc(DeviceId::HOST, 32).unwrap();
        assert!(matches!(
            rt.copy(src.as_ptr(), 0, dst.as_ptr(), 0, 64).unwrap_err(),
            RuntimeError::CopyOutOfBounds { .. }
        ));
        rt.release(src.as_ptr()).unwrap();
        rt.release(dst.as_ptr()).unwrap();
    }

    #[test]
    fn host_launch_path_validates_configuration() {
        let rt = runtime();
        assert_eq!(rt.launch_kernel(DeviceId::HOST).unwrap_err(), RuntimeError::NoKernelLoaded);
        rt.load_kernel(DeviceId::HOST, KernelKey::new("kernels.bin", "simple")).unwrap();
        rt.set_grid_size(DeviceId::HOST, Dim3::new(1024, 1, 1)).unwrap();
        rt.set_block_size(DeviceId::HOST, Dim3::new(128, 1, 1)).unwrap();
        rt.set_arg(DeviceId::HOST, 0, KernelArg::new(vec![0; 8], ArgKind::DevicePointer))
            .unwrap();
        rt.launch_kernel(DeviceId::HOST).unwrap();
        rt.synchronize(DeviceId::HOST).unwrap();
    }

    #[test]
    fn display_info_lists_platforms() {
        let rt = runtime();
        let mut out = Vec::new();
        rt.display_info(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Available platforms:"));
        assert!(text.contains("CPU: 1 device(s)"));
    }

    #[test]
    fn teardown_with_live_allocations_panics() {
        let rt = runtime();
        let ptr = rt.alloc(DeviceId::HOST, 16).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || drop(rt)));
        assert!(result.is_err());
        // The buffer itself is still valid; free it directly so the test
        // does not leak.
        // SAFETY: allocated by the host platform above, never released.
        unsafe { helios_host::alloc::aligned_free(ptr) };
    }
}
