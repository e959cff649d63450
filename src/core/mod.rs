//! Core pipeline structures of the fetch model.
//!
//! 1. **Instructions:** dynamic instruction objects flowing to decode.
//! 2. **Timing plumbing:** time buffers and inter-stage signal structs.
//! 3. **Front-end state:** the fetch target queue and BAC contract.
//! 4. **The fetch unit itself:** [`fetch::Fetch`].

pub mod bac;
pub mod fetch;
pub mod ftq;
pub mod hooks;
pub mod inst;
pub mod signals;
pub mod timebuf;

pub use bac::Bac;
pub use fetch::{Fetch, FetchIo, ThreadStatus};
pub use ftq::{FetchTarget, FetchTargetState, FtId, Ftq};
pub use hooks::CpuHooks;
pub use inst::DynInst;
pub use timebuf::TimeBuffer;
