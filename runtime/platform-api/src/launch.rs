//! Per-device kernel dispatch state.
//!
//! Every platform keeps one [`LaunchConfig`] per device. Setters mutate it
//! in place in any order; `launch_kernel` observes whatever was written
//! last. Launching does **not** reset the configuration -- it persists until
//! overwritten, so back-to-back launches of the same kernel only rebind what
//! actually changed.

use crate::error::RuntimeError;

/// Three-dimensional launch extent (grid or block).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dim3 {
    /// Extent along x.
    pub x: u32,
    /// Extent along y.
    pub y: u32,
    /// Extent along z.
    pub z: u32,
}

impl Dim3 {
    /// The unit extent `(1, 1, 1)`, the initial grid and block size.
    pub const ONE: Self = Self { x: 1, y: 1, z: 1 };

    /// Creates an extent from its three components.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of elements spanned by this extent.
    #[must_use]
    pub const fn elements(self) -> u64 {
        self.x as u64 * self.y as u64 * self.z as u64
    }
}

/// How a platform interprets the bytes of a bound argument.
///
/// The discriminants cross the ABI in the `arg_kinds` array of
/// `launch_kernel` and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArgKind {
    /// A plain value passed by copy.
    Value = 0,
    /// A device pointer previously returned by `alloc`.
    DevicePointer = 1,
    /// An aggregate passed by copy.
    Structure = 2,
}

impl ArgKind {
    /// Decodes an argument kind from its ABI discriminant.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Value),
            1 => Some(Self::DevicePointer),
            2 => Some(Self::Structure),
            _ => None,
        }
    }
}

/// A bound kernel argument.
///
/// The argument bytes are copied out of the caller's buffer at bind time, so
/// the stored value stays valid regardless of what the caller does with its
/// pointer afterwards. This is what makes the binding contract safe for
/// asynchronous platforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArg {
    bytes: Vec<u8>,
    kind: ArgKind,
}

impl KernelArg {
    /// Creates an argument from owned bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>, kind: ArgKind) -> Self {
        Self { bytes, kind }
    }

    /// Copies `size` bytes from `ptr` into a new argument.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `size` bytes.
    #[must_use]
    pub unsafe fn from_raw(ptr: *const u8, size: usize, kind: ArgKind) -> Self {
        // SAFETY: The caller guarantees `ptr` is readable for `size` bytes.
        let bytes = unsafe { core::slice::from_raw_parts(ptr, size) }.to_vec();
        Self { bytes, kind }
    }

    /// The argument's raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// How the platform interprets the bytes.
    #[must_use]
    pub fn kind(&self) -> ArgKind {
        self.kind
    }
}

/// Cache key for a loaded kernel: module file plus entry-point name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    /// Path of the kernel module file (opaque to the runtime).
    pub module: String,
    /// Entry-point symbol within the module.
    pub entry: String,
}

impl KernelKey {
    /// Creates a key from a module path and an entry-point name.
    #[must_use]
    pub fn new(module: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            entry: entry.into(),
        }
    }
}

/// The per-device dispatch state machine.
///
/// Initial state is grid `(1,1,1)`, block `(1,1,1)`, no arguments, no
/// kernel. Argument slots grow on demand and may be left as gaps while
/// configuring; [`LaunchConfig::bound`] rejects gaps at launch time.
#[derive(Debug, Clone, Default)]
pub struct LaunchConfig {
    grid: Option<Dim3>,
    block: Option<Dim3>,
    args: Vec<Option<KernelArg>>,
    kernel: Option<KernelKey>,
}

impl LaunchConfig {
    /// Creates a configuration in the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the grid extent for the next launch.
    pub fn set_grid(&mut self, grid: Dim3) {
        self.grid = Some(grid);
    }

    /// Sets the block extent for the next launch.
    pub fn set_block(&mut self, block: Dim3) {
        self.block = Some(block);
    }

    /// The currently configured grid extent.
    #[must_use]
    pub fn grid(&self) -> Dim3 {
        self.grid.unwrap_or(Dim3::ONE)
    }

    /// The currently configured block extent.
    #[must_use]
    pub fn block(&self) -> Dim3 {
        self.block.unwrap_or(Dim3::ONE)
    }

    /// Binds argument slot `index`, growing the slot vector as needed.
    ///
    /// Slot semantics are last-write-wins.
    pub fn set_arg(&mut self, index: usize, arg: KernelArg) {
        if index >= self.args.len() {
            self.args.resize(index + 1, None);
        }
        self.args[index] = Some(arg);
    }

    /// Establishes the current kernel for this device.
    pub fn set_kernel(&mut self, key: KernelKey) {
        self.kernel = Some(key);
    }

    /// The currently loaded kernel, if any.
    #[must_use]
    pub fn kernel(&self) -> Option<&KernelKey> {
        self.kernel.as_ref()
    }

    /// Validates launch readiness and returns the bound view a platform
    /// dispatches from.
    ///
    /// Fails with [`RuntimeError::NoKernelLoaded`] if no kernel was loaded,
    /// or [`RuntimeError::MissingArgument`] if any slot below the highest
    /// bound index is still a gap. The configuration itself is not consumed.
    pub fn bound(&self) -> Result<BoundLaunch<'_>, RuntimeError> {
        let kernel = self.kernel.as_ref().ok_or(RuntimeError::NoKernelLoaded)?;
        let mut args = Vec::with_capacity(self.args.len());
        for (index, slot) in self.args.iter().enumerate() {
            args.push(slot.as_ref().ok_or(RuntimeError::MissingArgument(index))?);
        }
        Ok(BoundLaunch {
            kernel,
            grid: self.grid(),
            block: self.block(),
            args,
        })
    }
}

/// A validated snapshot of a [`LaunchConfig`], consumed by a platform's
/// launch implementation.
#[derive(Debug)]
pub struct BoundLaunch<'a> {
    /// The kernel to dispatch.
    pub kernel: &'a KernelKey,
    /// Grid extent.
    pub grid: Dim3,
    /// Block extent.
    pub block: Dim3,
    /// Arguments in slot order, gap-free.
    pub args: Vec<&'a KernelArg>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_arg(v: u32) -> KernelArg {
        KernelArg::new(v.to_ne_bytes().to_vec(), ArgKind::Value)
    }

    #[test]
    fn initial_state_has_unit_extents() {
        let config = LaunchConfig::new();
        assert_eq!(config.grid(), Dim3::ONE);
        assert_eq!(config.block(), Dim3::ONE);
        assert!(config.kernel().is_none());
    }

    #[test]
    fn launch_without_kernel_fails() {
        let config = LaunchConfig::new();
        assert_eq!(config.bound().unwrap_err(), RuntimeError::NoKernelLoaded);
    }

    #[test]
    fn argument_gap_detected_at_launch() {
        let mut config = LaunchConfig::new();
        config.set_kernel(KernelKey::new("mod.bin", "simple"));
        config.set_arg(0, value_arg(1));
        config.set_arg(2, value_arg(3));
        assert_eq!(config.bound().unwrap_err(), RuntimeError::MissingArgument(1));

        // Filling the gap makes the configuration launchable.
        config.set_arg(1, value_arg(2));
        let bound = config.bound().unwrap();
        assert_eq!(bound.args.len(), 3);
    }

    #[test]
    fn last_write_wins_per_slot() {
        let mut config = LaunchConfig::new();
        config.set_kernel(KernelKey::new("mod.bin", "simple"));
        config.set_arg(0, value_arg(1));
        config.set_arg(0, value_arg(9));
        let bound = config.bound().unwrap();
        assert_eq!(bound.args[0].bytes(), 9u32.to_ne_bytes());
    }

    #[test]
    fn configuration_persists_after_launch() {
        let mut config = LaunchConfig::new();
        config.set_kernel(KernelKey::new("mod.bin", "simple"));
        config.set_grid(Dim3::new(1024, 1, 1));
        config.set_block(Dim3::new(128, 1, 1));
        config.set_arg(0, value_arg(7));
        let _ = config.bound().unwrap();

        // A second bind observes the same state.
        let bound = config.bound().unwrap();
        assert_eq!(bound.grid, Dim3::new(1024, 1, 1));
        assert_eq!(bound.block, Dim3::new(128, 1, 1));
        assert_eq!(bound.args.len(), 1);
    }

    #[test]
    fn extent_elements() {
        assert_eq!(Dim3::new(1024, 1, 1).elements(), 1024);
        assert_eq!(Dim3::new(4, 4, 2).elements(), 32);
    }

    #[test]
    fn arg_kind_decodes() {
        assert_eq!(ArgKind::from_raw(0), Some(ArgKind::Value));
        assert_eq!(ArgKind::from_raw(1), Some(ArgKind::DevicePointer));
        assert_eq!(ArgKind::from_raw(2), Some(ArgKind::Structure));
        assert_eq!(ArgKind::from_raw(3), None);
    }
}
