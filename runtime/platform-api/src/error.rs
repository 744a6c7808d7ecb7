//! Runtime error taxonomy.
//!
//! Every condition here is fatal at the exported symbol surface: the ABI
//! layer prints one `Runtime error:` line and aborts the process. Interior
//! APIs still propagate these as ordinary `Result`s so the policy lives in
//! exactly one place.

use thiserror::Error;

use crate::device::DeviceId;

/// Errors reported by the runtime and its platforms.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The device id is out of range or its platform kind is not registered.
    #[error("device {0} is not available")]
    UnknownDevice(DeviceId),
    /// The pointer is not present in the allocation table.
    #[error("memory not allocated from the runtime")]
    UnknownPointer,
    /// The platform's driver denied an allocation request.
    #[error("out of memory (requested {size} bytes)")]
    OutOfMemory {
        /// Requested size in bytes.
        size: i64,
    },
    /// Both copy endpoints are non-host and live on different platforms.
    #[error("cannot copy memory between different platforms")]
    CrossPlatformCopy,
    /// A copy range exceeds one of the endpoint allocations.
    #[error("copy of {size} bytes at offset {offset} exceeds an allocation of {alloc_size} bytes")]
    CopyOutOfBounds {
        /// Byte offset into the allocation.
        offset: i64,
        /// Requested copy size in bytes.
        size: i64,
        /// Size of the violated allocation.
        alloc_size: i64,
    },
    /// `launch_kernel` was attempted with no kernel loaded on the device.
    #[error("no kernel loaded")]
    NoKernelLoaded,
    /// An argument slot below the highest bound index was never written.
    #[error("kernel argument slot {0} was never bound")]
    MissingArgument(usize),
    /// A non-recoverable driver-level error reported by a platform.
    #[error("platform failure: {0}")]
    BackendFailure(String),
}
