//! Branch-address calculator contract.
//!
//! The BAC is an external collaborator: it predicts the next PC after every
//! fetched instruction and, in decoupled front-end mode, runs ahead of fetch
//! filling the FTQ. Fetch consumes it strictly through this trait; resteer
//! requests travel back over the [`crate::core::signals::BacSignals`] wire.

use crate::core::ftq::FetchTarget;
use crate::core::inst::DynInst;
use crate::isa::PcState;

/// Next-PC prediction interface consumed by the decode loop.
pub trait Bac {
    /// Advances `next_pc` past `inst`, applying any control-flow prediction.
    ///
    /// `ft` is the fetch target the instruction was fetched under, when the
    /// decoupled front-end is active. Returns true if a taken prediction
    /// redirected the stream away from the fall-through path.
    fn update_pc(&mut self, inst: &DynInst, next_pc: &mut PcState, ft: Option<&FetchTarget>)
        -> bool;
}
