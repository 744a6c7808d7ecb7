//! Platform capability API for the helios runtime.
//!
//! This crate defines the seam between the runtime core and its compute
//! platforms:
//!
//! - **Identity** -- [`PlatformKind`], [`DeviceId`], and the ABI device mask
//!   ([`DeviceMask`]) generated code encodes device handles with.
//! - **Dispatch state** -- [`LaunchConfig`], the per-device grid/block/
//!   argument/kernel record every platform drives its launches from.
//! - **Capability surface** -- the [`Platform`] trait, one implementation
//!   per accelerator family plus the mandatory host platform.
//! - **Errors** -- [`RuntimeError`], the closed set of conditions the
//!   runtime treats as fatal at its outer boundary.

pub mod device;
pub mod error;
pub mod launch;
pub mod platform;

// Re-export all public types at the crate root for ergonomic imports.
pub use device::{DeviceId, DeviceMask, PlatformKind};
pub use error::RuntimeError;
pub use launch::{ArgKind, BoundLaunch, Dim3, KernelArg, KernelKey, LaunchConfig};
pub use platform::Platform;
