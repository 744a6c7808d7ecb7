//! Process-wide allocation bookkeeping.
//!
//! Every pointer the runtime hands out appears here exactly once; every
//! pointer the runtime accepts back is looked up here first. The table is
//! the sole authority on which device owns a buffer -- platforms never see
//! a pointer that is not theirs.

use std::collections::HashMap;
use std::ptr::NonNull;

use helios_platform_api::{DeviceId, RuntimeError};

/// Metadata of one live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Dense id of the owning device.
    pub dev: DeviceId,
    /// Allocation size in bytes.
    pub size: i64,
}

/// Mapping from opaque pointer address to its allocation metadata.
///
/// The table itself is lock-free state; the [`Runtime`](crate::Runtime)
/// serialises access through a single mutex, since allocations are rare
/// relative to launches and contention stays low.
#[derive(Debug, Default)]
pub struct AllocationTable {
    entries: HashMap<usize, Allocation>,
}

impl AllocationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly allocated pointer.
    ///
    /// A platform handing out a pointer that is already live would be a
    /// driver-level bug; debug builds assert against it.
    pub fn insert(&mut self, ptr: NonNull<u8>, allocation: Allocation) {
        let previous = self.entries.insert(ptr.as_ptr() as usize, allocation);
        debug_assert!(previous.is_none(), "platform returned a live pointer twice");
    }

    /// Removes a pointer, returning its metadata.
    pub fn remove(&mut self, ptr: NonNull<u8>) -> Result<Allocation, RuntimeError> {
        self.entries
            .remove(&(ptr.as_ptr() as usize))
            .ok_or(RuntimeError::UnknownPointer)
    }

    /// Looks a pointer up without removing it.
    pub fn lookup(&self, ptr: NonNull<u8>) -> Result<Allocation, RuntimeError> {
        self.entries
            .get(&(ptr.as_ptr() as usize))
            .copied()
            .ok_or(RuntimeError::UnknownPointer)
    }

    /// Number of live allocations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no allocations are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
