//! Common types shared across the fetch model.
//!
//! This module collects the small building blocks used everywhere else:
//! 1. **Addresses:** Strongly typed virtual and physical addresses.
//! 2. **Faults:** Translation faults carried through requests and instructions.
//! 3. **Identifiers:** Hardware thread ids and instruction sequence numbers.

pub mod addr;
pub mod error;

pub use addr::{PhysAddr, VirtAddr};
pub use error::Fault;

/// Index of a hardware thread within the core.
pub type ThreadId = usize;

/// Monotonically increasing instruction sequence number.
///
/// Assigned at fetch, used by downstream stages to order and squash
/// instructions.
pub type InstSeqNum = u64;
