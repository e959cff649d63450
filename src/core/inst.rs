//! Dynamic instruction objects.
//!
//! Fetch decodes raw bytes into micro-ops and wraps each in a [`DynInst`]
//! carrying the speculative PC context the downstream stages need. The fetch
//! queue and the decode wire both move these by value.

use crate::common::{Fault, InstSeqNum, ThreadId};
use crate::isa::{PcState, StaticInst};

/// A dynamic (in-flight) instruction produced by fetch.
#[derive(Clone, Debug)]
pub struct DynInst {
    /// Global sequence number, assigned in fetch order.
    pub seq_num: InstSeqNum,
    /// Hardware thread the instruction belongs to.
    pub tid: ThreadId,
    /// PC state the instruction was fetched at.
    pub pc: PcState,
    /// Predicted successor PC state.
    pub pred_pc: PcState,
    /// The decoded static instruction (a micro-op or simple instruction).
    pub static_inst: StaticInst,
    /// The macro-op this micro-op belongs to, if any.
    pub macroop: Option<StaticInst>,
    /// Fault carried to commit, if fetch detected one.
    pub fault: Option<Fault>,
    /// True for fault-carrying placeholders that never execute.
    pub not_an_inst: bool,
}

impl DynInst {
    /// Creates a new dynamic instruction.
    pub fn new(
        seq_num: InstSeqNum,
        tid: ThreadId,
        static_inst: StaticInst,
        macroop: Option<StaticInst>,
        pc: PcState,
        pred_pc: PcState,
    ) -> Self {
        Self {
            seq_num,
            tid,
            pc,
            pred_pc,
            static_inst,
            macroop,
            fault: None,
            not_an_inst: false,
        }
    }

    /// True for control-flow instructions.
    #[inline]
    pub fn is_control(&self) -> bool {
        self.static_inst.is_control()
    }

    /// True for quiesce instructions.
    #[inline]
    pub fn is_quiesce(&self) -> bool {
        self.static_inst.is_quiesce()
    }

    /// True if interrupts must be deferred past this micro-op.
    #[inline]
    pub fn is_delayed_commit(&self) -> bool {
        self.static_inst.is_delayed_commit
    }

    /// True if this is the final micro-op of its macro-op.
    #[inline]
    pub fn is_last_microop(&self) -> bool {
        self.static_inst.is_last_microop
    }

    /// Marks the instruction as a non-executing fault carrier.
    #[inline]
    pub fn set_not_an_inst(&mut self) {
        self.not_an_inst = true;
    }

    /// Records the predicted successor PC.
    #[inline]
    pub fn set_pred_targ(&mut self, pred: &PcState) {
        self.pred_pc = pred.clone();
    }
}
