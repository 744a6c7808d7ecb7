//! Copy routing.
//!
//! Given the two endpoint allocations of a copy, decides which platform
//! capability services it. Deliberately does not stage cross-platform
//! copies through the host -- the client must allocate a host buffer and
//! issue two copies itself.

use helios_platform_api::{DeviceId, RuntimeError};

use crate::table::Allocation;

/// How a copy is serviced, in routing-decision order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyRoute {
    /// Both endpoints live on the same platform.
    Intra,
    /// Source is the host: destination platform's `copy_from_host`.
    FromHost,
    /// Destination is the host: source platform's `copy_to_host`.
    ToHost,
}

/// Classifies a copy between two devices.
///
/// `same_platform` is whether both dense ids resolve to the same registered
/// platform. Two distinct non-host platforms are rejected with
/// [`RuntimeError::CrossPlatformCopy`].
pub fn classify(
    src: DeviceId,
    dst: DeviceId,
    same_platform: bool,
) -> Result<CopyRoute, RuntimeError> {
    if same_platform {
        Ok(CopyRoute::Intra)
    } else if src.is_host() {
        Ok(CopyRoute::FromHost)
    } else if dst.is_host() {
        Ok(CopyRoute::ToHost)
    } else {
        Err(RuntimeError::CrossPlatformCopy)
    }
}

/// Validates that `[offset, offset + size)` lies inside `allocation`.
pub fn check_bounds(offset: i64, size: i64, allocation: Allocation) -> Result<(), RuntimeError> {
    let in_range = offset >= 0
        && size >= 0
        && offset
            .checked_add(size)
            .is_some_and(|end| end <= allocation.size);
    if in_range {
        Ok(())
    } else {
        Err(RuntimeError::CopyOutOfBounds {
            offset,
            size,
            alloc_size: allocation.size,
        })
    }
}
