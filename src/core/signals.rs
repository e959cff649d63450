//! Inter-stage signal structures.
//!
//! These are the payloads carried by the time buffers between fetch and the
//! rest of the pipeline:
//! 1. **[`TimeStruct`]** — backwards signals from decode, commit, and IEW.
//! 2. **[`FetchStruct`]** — the instruction bundle forwarded to decode.
//! 3. **[`BacSignals`]** — same-cycle resteer notifications to the BAC.

use crate::common::InstSeqNum;
use crate::config::MAX_THREADS;
use crate::core::inst::DynInst;
use crate::isa::{PcState, StaticInst};

/// Summary of a squashing instruction, carried by squash signals.
///
/// Fetch uses it to decide whether a macro-op was interrupted mid-emission
/// and must resume from its remaining micro-ops.
#[derive(Clone, Debug)]
pub struct SquashedInst {
    /// Instruction address of the squashing instruction.
    pub pc_addr: u64,
    /// True if it was the final micro-op of its macro-op.
    pub is_last_microop: bool,
    /// The macro-op it belonged to, if any.
    pub macroop: Option<StaticInst>,
}

/// Per-thread signals from the decode stage.
#[derive(Clone, Debug, Default)]
pub struct DecodeSignal {
    /// Decode is backing up; stop forwarding to it.
    pub block: bool,
    /// Decode has drained; forwarding may resume.
    pub unblock: bool,
    /// Decode discovered a misfetch and requests a squash.
    pub squash: bool,
    /// Youngest sequence number decode has seen.
    pub done_seq_num: InstSeqNum,
    /// PC to resume fetching from after the squash.
    pub next_pc: Option<PcState>,
    /// The instruction that triggered the squash.
    pub squash_inst: Option<SquashedInst>,
}

/// Per-thread signals from the commit stage.
#[derive(Clone, Debug, Default)]
pub struct CommitSignal {
    /// Commit requests a squash (trap, misprediction, interrupt).
    pub squash: bool,
    /// PC to resume fetching from after the squash.
    pub pc: Option<PcState>,
    /// Youngest sequence number retained by commit.
    pub done_seq_num: InstSeqNum,
    /// The instruction that triggered the squash.
    pub squash_inst: Option<SquashedInst>,
    /// An interrupt is pending; fetch must stall at the next boundary.
    pub interrupt_pending: bool,
    /// The pending interrupt has been handled or cancelled.
    pub clear_interrupt: bool,
}

/// Per-thread occupancy counts reported by IEW.
#[derive(Clone, Copy, Debug, Default)]
pub struct IewSignal {
    /// Instructions in the instruction queue.
    pub iq_count: usize,
    /// Instructions in the load/store queue.
    pub ldstq_count: usize,
}

/// All backwards signals visible to fetch in one cycle.
#[derive(Clone, Debug, Default)]
pub struct TimeStruct {
    /// Signals from decode, indexed by thread.
    pub decode: [DecodeSignal; MAX_THREADS],
    /// Signals from commit, indexed by thread.
    pub commit: [CommitSignal; MAX_THREADS],
    /// Signals from IEW, indexed by thread.
    pub iew: [IewSignal; MAX_THREADS],
}

/// Read wires into the backwards time buffer, one per producing stage.
///
/// Each reference observes the same [`TimeStruct`] stream at that stage's
/// configured delay.
pub struct FetchInputs<'a> {
    /// Signals from decode, `decode_to_fetch_delay` cycles old.
    pub from_decode: &'a TimeStruct,
    /// Signals from rename, `rename_to_fetch_delay` cycles old.
    pub from_rename: &'a TimeStruct,
    /// Signals from IEW, `iew_to_fetch_delay` cycles old.
    pub from_iew: &'a TimeStruct,
    /// Signals from commit, `commit_to_fetch_delay` cycles old.
    pub from_commit: &'a TimeStruct,
}

/// The instruction bundle forwarded to decode each cycle.
#[derive(Clone, Debug, Default)]
pub struct FetchStruct {
    /// Forwarded instructions, at most `decode_width` of them.
    pub insts: Vec<DynInst>,
}

impl FetchStruct {
    /// Number of instructions in the bundle.
    #[inline]
    pub fn size(&self) -> usize {
        self.insts.len()
    }
}

/// Per-thread resteer notification to the BAC.
#[derive(Clone, Debug, Default)]
pub struct FetchInfo {
    /// Fetch requests the BAC abandon its current stream.
    pub squash: bool,
    /// PC the BAC should restart prediction from.
    pub next_pc: Option<PcState>,
}

/// Same-cycle wire from fetch to the BAC.
#[derive(Clone, Debug, Default)]
pub struct BacSignals {
    /// Resteer notifications, indexed by thread.
    pub fetch_info: [FetchInfo; MAX_THREADS],
}
