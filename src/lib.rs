//! Cycle-accurate instruction fetch unit for an out-of-order SMT CPU model.
//!
//! This crate implements the fetch stage of a superscalar, simultaneously
//! multithreaded core with an optional decoupled front-end:
//! 1. **Core:** the per-thread fetch state machine, decode loop, SMT
//!    arbitration, and tick driver (`core::fetch`).
//! 2. **Front-end state:** fetch target queue and BAC contract (`core::ftq`,
//!    `core::bac`).
//! 3. **Memory contracts:** requests, the I-cache port, and the timing MMU
//!    interface (`mem`).
//! 4. **ISA surface:** PC state, static instructions, and the decoder
//!    capability set with a fixed-width test ISA (`isa`).
//! 5. **Simulation:** collaborator models, harness, loader, configuration,
//!    and statistics (`sim`, `config`, `stats`).

/// Common types (addresses, faults, identifiers).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical structures).
pub mod config;
/// Core pipeline structures and the fetch unit itself.
pub mod core;
/// Architectural types consumed by fetch.
pub mod isa;
/// Memory-side contracts.
pub mod mem;
/// Collaborator models and the runnable harness.
pub mod sim;
/// Statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// The fetch unit.
pub use crate::core::fetch::Fetch;
/// Runnable front-end harness; construct with `FetchSystem::new`.
pub use crate::sim::FetchSystem;
