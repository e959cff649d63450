//! Fault definitions for instruction fetch.
//!
//! Faults raised during address translation do not abort the simulation;
//! they travel inside the request that caused them and are eventually
//! delivered to commit attached to a nop-carried instruction. Only
//! configuration errors abort the process (at construction time).

use std::fmt;

/// A fault detected while translating or fetching an instruction address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Instruction fetch caused a page fault.
    ///
    /// The associated value is the faulting virtual address.
    InstructionPageFault(u64),

    /// Instruction fetch violated memory protection or touched invalid
    /// memory. The associated value is the faulting virtual address.
    InstructionAccessFault(u64),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::InstructionPageFault(addr) => {
                write!(f, "InstructionPageFault({:#x})", addr)
            }
            Fault::InstructionAccessFault(addr) => {
                write!(f, "InstructionAccessFault({:#x})", addr)
            }
        }
    }
}

impl std::error::Error for Fault {}
