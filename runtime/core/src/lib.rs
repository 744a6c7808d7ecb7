//! Core of the helios runtime.
//!
//! Owns everything between the C symbol surface and the platform
//! implementations:
//!
//! - the device registry ([`Runtime`]), host platform first so device id 0
//!   is always the host;
//! - the process-wide allocation table tying every raw device pointer to
//!   its owning device;
//! - the copy router deciding how a byte range travels between address
//!   spaces;
//! - launch orchestration with kernel-time accounting;
//! - the lazily constructed global singleton and the fatal-error policy;
//! - wall-clock and RNG utilities for generated code.

pub mod copy;
pub mod global;
pub mod rng;
pub mod runtime;
pub mod table;
pub mod time;

pub use copy::CopyRoute;
pub use global::{fatal, install, ok_or_fatal, runtime};
pub use runtime::{Runtime, RuntimeBuilder};
pub use table::{Allocation, AllocationTable};
pub use time::Clock;
