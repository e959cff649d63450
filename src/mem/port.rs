//! Instruction cache port contract.

use super::request::Packet;

/// Timing request port into the instruction cache.
///
/// The port never blocks; a rejected send returns the packet to the caller,
/// which keeps ownership and must wait for the responder's retry signal
/// before resending. Responses and retries come back asynchronously through
/// the fetch unit's completion entry points.
pub trait IcachePort {
    /// Sends a timing read request.
    ///
    /// Returns `Err(pkt)` on back-pressure; the packet is handed back
    /// untouched.
    fn send_timing_req(&mut self, pkt: Packet) -> Result<(), Packet>;
}
