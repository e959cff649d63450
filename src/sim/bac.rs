//! Sequential branch-address calculator model.
//!
//! Keeps the FTQ topped up with fall-through fetch targets, predicts
//! statically encoded jumps taken, and restarts its stream on resteer
//! signals from fetch. This is not a branch predictor; it is the minimum
//! BAC that drives every decoupled-front-end path in the fetch unit.

use log::trace;

use crate::common::{ThreadId, VirtAddr};
use crate::core::bac::Bac;
use crate::core::ftq::{FetchTarget, Ftq};
use crate::core::inst::DynInst;
use crate::isa::{OpClass, PcState};

/// Fall-through BAC with static jump prediction.
pub struct SequentialBac {
    next_pc: Vec<u64>,
    cache_blk_size: usize,
    fill_depth: usize,
}

impl SequentialBac {
    /// Creates the model, starting every thread's stream at `start_pc`.
    pub fn new(num_threads: usize, start_pc: u64, cache_blk_size: usize, fill_depth: usize) -> Self {
        Self {
            next_pc: vec![start_pc; num_threads],
            cache_blk_size,
            fill_depth,
        }
    }

    /// Tops the thread's FTQ up to the configured fill depth with
    /// fall-through targets, one cache block each.
    pub fn fill(&mut self, ftq: &mut Ftq, tid: ThreadId) {
        while ftq.size(tid) < self.fill_depth && !ftq.is_full(tid) {
            let start = self.next_pc[tid];
            let blk_mask = self.cache_blk_size as u64 - 1;
            let end = (start & !blk_mask) + self.cache_blk_size as u64;
            if ftq
                .push_back(tid, VirtAddr::new(start), VirtAddr::new(end), true)
                .is_none()
            {
                break;
            }
            self.next_pc[tid] = end;
        }
    }

    /// Restarts the thread's prediction stream from `pc` after fetch
    /// invalidated the FTQ.
    pub fn resteer(&mut self, tid: ThreadId, pc: u64) {
        trace!("[tid:{}] BAC resteered to {:#x}", tid, pc);
        self.next_pc[tid] = pc;
    }
}

impl Bac for SequentialBac {
    fn update_pc(
        &mut self,
        inst: &DynInst,
        next_pc: &mut PcState,
        _ft: Option<&FetchTarget>,
    ) -> bool {
        // Statically encoded jumps are always predicted taken; conditional
        // branches fall through.
        if inst.static_inst.op == OpClass::Jump {
            if let Some(target) = inst.static_inst.branch_target(next_pc.inst_addr()) {
                *next_pc = PcState::new(target);
                return true;
            }
        }
        inst.static_inst.advance_pc(next_pc);
        false
    }
}
