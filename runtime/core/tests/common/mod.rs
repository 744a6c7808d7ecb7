//! In-memory fake accelerator platform for integration tests.
//!
//! Device memory is plain host memory, copies are memcpy, and two kernel
//! entry points get real semantics so launches are observable end to end:
//!
//! - `simple`: writes `out[i] = i` for each of the grid's elements
//!   (argument 0 is the output buffer).
//! - `simple_tex`: copies `in[i]` to `out[i]` (argument 0 input,
//!   argument 1 output).
//!
//! Every other entry point launches as a timed no-op.

#![allow(dead_code)] // not every test binary uses every helper

use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use helios_host::alloc::{HOST_ALIGNMENT, aligned_alloc, aligned_free};
use helios_platform_api::{
    BoundLaunch, Dim3, KernelArg, KernelKey, LaunchConfig, Platform, PlatformKind, RuntimeError,
};

/// What the platform observed at the last launch on one device.
#[derive(Debug, Clone)]
pub struct LaunchRecord {
    pub entry: String,
    pub grid: Dim3,
    pub block: Dim3,
    pub args: Vec<Vec<u8>>,
}

struct FakeDevice {
    launch: Mutex<LaunchConfig>,
    loaded: Mutex<HashSet<KernelKey>>,
    module_reads: AtomicUsize,
    launches: AtomicUsize,
    last_launch: Mutex<Option<LaunchRecord>>,
}

impl FakeDevice {
    fn new() -> Self {
        Self {
            launch: Mutex::new(LaunchConfig::new()),
            loaded: Mutex::new(HashSet::new()),
            module_reads: AtomicUsize::new(0),
            launches: AtomicUsize::new(0),
            last_launch: Mutex::new(None),
        }
    }
}

/// A fake accelerator family with host-memory-backed devices.
pub struct FakeAccelPlatform {
    kind: PlatformKind,
    name: &'static str,
    devices: Vec<FakeDevice>,
}

impl FakeAccelPlatform {
    pub fn new(kind: PlatformKind, name: &'static str, dev_count: usize) -> Self {
        Self {
            kind,
            name,
            devices: (0..dev_count).map(|_| FakeDevice::new()).collect(),
        }
    }

    /// Number of cache-missing module loads on device `local`.
    pub fn module_reads(&self, local: usize) -> usize {
        self.devices[local].module_reads.load(Ordering::Relaxed)
    }

    /// Number of completed launches on device `local`.
    pub fn launches(&self, local: usize) -> usize {
        self.devices[local].launches.load(Ordering::Relaxed)
    }

    /// The configuration observed by the most recent launch.
    pub fn last_launch(&self, local: usize) -> Option<LaunchRecord> {
        self.devices[local].last_launch.lock().unwrap().clone()
    }

    fn execute(bound: &BoundLaunch<'_>) {
        let elements = usize::try_from(bound.grid.elements()).unwrap();
        match bound.kernel.entry.as_str() {
            "simple" => {
                let out = arg_pointer(bound.args[0]);
                for i in 0..elements {
                    // SAFETY: tests size the output buffer to the grid.
                    unsafe { out.cast::<i32>().add(i).write(i as i32) };
                }
            }
            "simple_tex" => {
                let input = arg_pointer(bound.args[0]);
                let out = arg_pointer(bound.args[1]);
                for i in 0..elements {
                    // SAFETY: tests size both buffers to the grid.
                    unsafe {
                        let v = input.cast::<i32>().add(i).read();
                        out.cast::<i32>().add(i).write(v);
                    }
                }
            }
            _ => {}
        }
        // Keep launches measurably non-instant for the timing tests.
        std::thread::sleep(Duration::from_millis(2));
    }
}

/// Decodes a bound device-pointer argument back into a raw pointer.
fn arg_pointer(arg: &KernelArg) -> *mut u8 {
    let bytes: [u8; size_of::<usize>()] = arg.bytes().try_into().expect("pointer-sized argument");
    usize::from_ne_bytes(bytes) as *mut u8
}

impl Platform for FakeAccelPlatform {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> PlatformKind {
        self.kind
    }

    fn dev_count(&self) -> usize {
        self.devices.len()
    }

    fn alloc(&self, _local: usize, size: i64) -> Result<NonNull<u8>, RuntimeError> {
        let bytes = usize::try_from(size).map_err(|_| RuntimeError::OutOfMemory { size })?;
        aligned_alloc(bytes, HOST_ALIGNMENT).ok_or(RuntimeError::OutOfMemory { size })
    }

    unsafe fn release(&self, _local: usize, ptr: NonNull<u8>) {
        // SAFETY: alloc() above uses aligned_alloc.
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
        // SAFETY: forwarded caller contract; fake device memory is host memory.
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
        // SAFETY: forwarded caller contract.
        unsafe { self.copy(0, src, dst_local, dst, bytes) }
    }

    unsafe fn copy_to_host(
        &self,
        src_local: usize,
        src: NonNull<u8>,
        dst: NonNull<u8>,
        bytes: usize,
    ) -> Result<(), RuntimeError> {
        // SAFETY: forwarded caller contract.
        unsafe { self.copy(src_local, src, 0, dst, bytes) }
    }

    fn set_grid_size(&self, local: usize, grid: Dim3) {
        self.devices[local].launch.lock().unwrap().set_grid(grid);
    }

    fn set_block_size(&self, local: usize, block: Dim3) {
        self.devices[local].launch.lock().unwrap().set_block(block);
    }

    fn set_arg(&self, local: usize, index: usize, arg: KernelArg) {
        self.devices[local].launch.lock().unwrap().set_arg(index, arg);
    }

    fn load_kernel(&self, local: usize, key: KernelKey) -> Result<(), RuntimeError> {
        let device = &self.devices[local];
        if device.loaded.lock().unwrap().insert(key.clone()) {
            device.module_reads.fetch_add(1, Ordering::Relaxed);
        }
        device.launch.lock().unwrap().set_kernel(key);
        Ok(())
    }

    fn launch_kernel(&self, local: usize) -> Result<(), RuntimeError> {
        let device = &self.devices[local];
        let state = device.launch.lock().unwrap();
        let bound = state.bound()?;
        *device.last_launch.lock().unwrap() = Some(LaunchRecord {
            entry: bound.kernel.entry.clone(),
            grid: bound.grid,
            block: bound.block,
            args: bound.args.iter().map(|arg| arg.bytes().to_vec()).collect(),
        });
        Self::execute(&bound);
        device.launches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn synchronize(&self, _local: usize) -> Result<(), RuntimeError> {
        // Fake launches complete synchronously.
        Ok(())
    }
}

/// A runtime plus handles to its fake platforms, for observing what the
/// platforms saw.
pub struct AccelFixture {
    pub runtime: helios_core::Runtime,
    pub cuda: std::sync::Arc<FakeAccelPlatform>,
    pub opencl: std::sync::Arc<FakeAccelPlatform>,
}

/// Dense device ids in an [`AccelFixture`]: host, cuda0, cuda1, opencl0.
pub const HOST: helios_platform_api::DeviceId = helios_platform_api::DeviceId(0);
pub const CUDA0: helios_platform_api::DeviceId = helios_platform_api::DeviceId(1);
pub const CUDA1: helios_platform_api::DeviceId = helios_platform_api::DeviceId(2);
pub const OPENCL0: helios_platform_api::DeviceId = helios_platform_api::DeviceId(3);

/// A runtime with one fake CUDA platform (2 devices) and one fake OpenCL
/// platform (1 device) behind the host.
pub fn accel_runtime() -> AccelFixture {
    let cuda = std::sync::Arc::new(FakeAccelPlatform::new(PlatformKind::Cuda, "CUDA", 2));
    let opencl = std::sync::Arc::new(FakeAccelPlatform::new(PlatformKind::OpenCl, "OpenCL", 1));
    let runtime = helios_core::Runtime::builder()
        .with_platform(Box::new(std::sync::Arc::clone(&cuda)))
        .with_platform(Box::new(std::sync::Arc::clone(&opencl)))
        .build_with_order(None);
    AccelFixture {
        runtime,
        cuda,
        opencl,
    }
}

/// Encodes a device pointer the way generated code passes it to `set_arg`.
pub fn pointer_arg(ptr: NonNull<u8>) -> KernelArg {
    KernelArg::new(
        (ptr.as_ptr() as usize).to_ne_bytes().to_vec(),
        helios_platform_api::ArgKind::DevicePointer,
    )
}
