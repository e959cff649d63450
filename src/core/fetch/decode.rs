//! Per-thread decode loop.
//!
//! One pass of this loop runs per fetching thread per tick: it gates on FTQ
//! readiness, kicks off a cache line fetch when the buffer misses, then
//! decodes buffered bytes into micro-ops up to the fetch width, consulting
//! the BAC for every emitted instruction. A taken prediction, a quiesce, a
//! consumed fetch target, or an exhausted buffer ends the pass.

use log::trace;

use crate::common::{ThreadId, VirtAddr};
use crate::core::ftq::{FetchTarget, FtId, Ftq};
use crate::core::inst::DynInst;
use crate::core::signals::{BacSignals, FetchInputs};
use crate::isa::{is_rom_micro_pc, StaticInst};

use super::{Fetch, FetchIo, ThreadStatus};

/// Range snapshot of the fetch target the decode loop is consuming.
///
/// Holding a borrow into the FTQ across BAC calls would freeze the queue,
/// so the loop works on this copy and re-resolves by id when it must
/// mutate the target.
#[derive(Clone, Copy, Debug)]
struct FtView {
    id: FtId,
    start: u64,
    end: u64,
}

impl FtView {
    fn from(ft: &FetchTarget) -> Self {
        Self {
            id: ft.id,
            start: ft.start_address().val(),
            end: ft.end_address().val(),
        }
    }

    fn in_range(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end
    }
}

impl Fetch {
    /// Gate on FTQ readiness; outside the decoupled front-end this always
    /// passes.
    fn ftq_ready(&mut self, tid: ThreadId, status_change: &mut bool, ftq: &Ftq) -> bool {
        if !self.decoupled_front_end {
            return true;
        }
        if !ftq.is_head_ready(tid) {
            self.status[tid] = ThreadStatus::FtqEmpty;
            *status_change = true;
            return false;
        }
        true
    }

    /// True if the FTQ head permits issuing new accesses for `tid`.
    fn ftq_head_ok(&self, tid: ThreadId, ftq: &Ftq) -> bool {
        !self.decoupled_front_end || ftq.is_head_ready(tid)
    }

    /// One arbitration slot: pick a thread and run its fetch/decode pass.
    pub(super) fn fetch_one(
        &mut self,
        status_change: &mut bool,
        inputs: &FetchInputs,
        io: &mut FetchIo,
        to_bac: &mut BacSignals,
    ) {
        let tid = match self.get_fetching_thread(inputs, io) {
            Some(tid) => tid,
            None => {
                // Breaks the looping condition in tick().
                self.threads_fetched = self.num_fetching_threads;
                if self.num_threads == 1 {
                    self.profile_stall(0, io.active_threads);
                }
                return;
            }
        };

        // Check the FTQ before anything else; without a fetch target we do
        // not know what to fetch.
        if !self.ftq_ready(tid, status_change, io.ftq) {
            trace!("[tid:{}] FTQ not ready", tid);
            self.stats.ftq_stall_cycles += 1;
            return;
        }

        trace!("[tid:{}] attempting to fetch", tid);

        let mut this_pc = self.pc[tid].clone();
        let mut pc_offset = self.fetch_offset[tid];
        let pc_mask = self.decoder[tid].pc_mask();
        let mut fetch_addr = this_pc.inst_addr().wrapping_add(pc_offset) & pc_mask;
        let mut in_rom = is_rom_micro_pc(this_pc.micro_pc());

        let mut cur_ft: Option<FtView> = io.ftq.head(tid).map(FtView::from);

        if self.decoupled_front_end {
            let head = cur_ft.expect("FTQ ready without a head target");
            if !head.in_range(this_pc.inst_addr()) {
                trace!(
                    "[tid:{}] PC {:#x} not within the head fetch target",
                    tid,
                    this_pc.inst_addr()
                );
                self.bac_resteer(&this_pc, tid, io.ftq, to_bac);
                self.stats.ftq_stall_cycles += 1;
                return;
            }
        }

        // If returning from the delay of a cache miss, update the status to
        // running; otherwise do the cache access.
        if self.status[tid] == ThreadStatus::IcacheAccessComplete {
            trace!("[tid:{}] icache miss is complete", tid);
            self.status[tid] = ThreadStatus::Running;
            *status_change = true;
        } else if self.status[tid] == ThreadStatus::Running {
            // Align the fetch PC to the start of a fetch buffer segment.
            let fetch_buffer_block_pc = VirtAddr::new(fetch_addr).align_down(self.fetch_buffer_size);

            // If the buffer no longer covers the fetch address, and no
            // macro-op or ROM micro-ops remain, start a fetch from the
            // icache.
            let buffered = self.fetch_buffer[tid].hit(fetch_buffer_block_pc)
                && self.ftq_ready(tid, status_change, io.ftq);
            if !buffered && !in_rom && self.macroop[tid].is_none() {
                trace!(
                    "[tid:{}] attempting to translate and read instruction, starting at PC {:#x}",
                    tid,
                    this_pc.inst_addr()
                );
                self.fetch_cache_line(VirtAddr::new(fetch_addr), tid, this_pc.inst_addr(), io);

                match self.status[tid] {
                    ThreadStatus::IcacheWaitResponse => {
                        self.stats.thread[tid].icache_stall_cycles += 1
                    }
                    ThreadStatus::ItlbWait => self.stats.tlb_cycles += 1,
                    ThreadStatus::FtqEmpty => self.stats.ftq_stall_cycles += 1,
                    _ => self.stats.misc_stall_cycles += 1,
                }
                return;
            } else if self.check_interrupt(this_pc.inst_addr()) && !self.delayed_commit[tid] {
                // Stall if an interrupt is posted and fetch is not inside a
                // delayed-commit window.
                self.stats.misc_stall_cycles += 1;
                trace!("[tid:{}] fetch is stalled", tid);
                return;
            }
        } else {
            if self.status[tid] == ThreadStatus::Idle {
                self.stats.idle_cycles += 1;
                trace!("[tid:{}] fetch is idle", tid);
            }
            // In an I-cache/TLB wait or similar; fetch does nothing.
            return;
        }

        self.stats.cycles += 1;

        let mut next_pc = this_pc.clone();
        let mut cur_macroop: Option<StaticInst> = self.macroop[tid].clone();

        trace!("[tid:{}] adding instructions to queue to decode", tid);

        // A predicted-taken branch or a quiesce ends this fetch block.
        let mut predicted_branch = false;
        let mut quiesce = false;

        let num_insts = self.fetch_buffer_size / self.inst_size;
        let mut blk_offset = (fetch_addr
            .wrapping_sub(self.fetch_buffer[tid].pc().val())
            / self.inst_size as u64) as usize;

        // Keep issuing while fetch width remains, the fetch queue has room,
        // and no predicted branch or quiesce ended the block.
        while self.num_inst < self.fetch_width
            && self.fetch_queue[tid].len() < self.fetch_queue_size
            && !predicted_branch
            && !quiesce
        {
            // For the decoupled front-end also check that the FTQ and the
            // current fetch target are still valid.
            if self.decoupled_front_end && (!io.ftq.is_valid(tid) || cur_ft.is_none()) {
                break;
            }
            debug_assert!(cur_ft.map_or(true, |ft| ft.in_range(this_pc.inst_addr())));

            // More memory is needed unless an instruction is pending in the
            // ROM, the current macro-op, or the decoder itself.
            let need_mem = !in_rom && cur_macroop.is_none() && !self.decoder[tid].inst_ready();
            fetch_addr = this_pc.inst_addr().wrapping_add(pc_offset) & pc_mask;
            let fetch_buffer_block_pc = VirtAddr::new(fetch_addr).align_down(self.fetch_buffer_size);

            if need_mem {
                // If the buffer no longer covers fetch_addr, refetch first.
                if !self.fetch_buffer[tid].hit(fetch_buffer_block_pc) {
                    break;
                }

                if blk_offset >= num_insts {
                    // Ran out of the current buffer block.
                    break;
                }

                let off = blk_offset * self.inst_size;
                let end = off + self.inst_size;
                self.decoder[tid].more_bytes(
                    &this_pc,
                    VirtAddr::new(fetch_addr),
                    &self.fetch_buffer[tid].data()[off..end],
                );

                if self.decoder[tid].need_more_bytes() {
                    blk_offset += 1;
                    fetch_addr += self.inst_size as u64;
                    pc_offset += self.inst_size as u64;
                }
            }

            // Extract as many instructions and/or micro-ops as possible
            // from the bytes processed so far.
            loop {
                let mut decoded_simple: Option<StaticInst> = None;
                if cur_macroop.is_none() && !in_rom {
                    if !self.decoder[tid].inst_ready() {
                        // Need more bytes; blk_offset and pc_offset have
                        // already been advanced.
                        break;
                    }
                    let decoded = self.decoder[tid].decode(&mut this_pc);
                    self.stats.thread[tid].num_insts += 1;

                    if decoded.is_macroop {
                        cur_macroop = Some(decoded);
                    } else {
                        pc_offset = 0;
                        decoded_simple = Some(decoded);
                    }
                }

                // Whether we're moving to a new macro-op, either because the
                // current one ended or the predictor thinks it did.
                let mut new_macro = false;
                let static_inst = if in_rom {
                    let micro = self.decoder[tid].fetch_rom_microop(this_pc.micro_pc());
                    new_macro |= micro.is_last_microop;
                    micro
                } else if let Some(m) = cur_macroop.as_ref() {
                    let micro = m.fetch_microop(this_pc.micro_pc());
                    new_macro |= micro.is_last_microop;
                    micro
                } else {
                    decoded_simple.expect("decoder yielded no instruction")
                };

                let seq = self.next_seq();
                let mut inst = DynInst::new(
                    seq,
                    tid,
                    static_inst,
                    cur_macroop.clone(),
                    this_pc.clone(),
                    next_pc.clone(),
                );
                trace!(
                    "[tid:{}] instruction PC {:#x} created [sn:{}]",
                    tid,
                    this_pc.inst_addr(),
                    seq
                );

                io.cpu.inst_fetched(&inst);
                self.num_inst += 1;

                next_pc.set(&this_pc);

                // If we're branching after this instruction, quit fetching
                // from the same block.
                predicted_branch |= this_pc.branching();

                // Get the next PC from the BAC.
                let ft_ref = match cur_ft {
                    Some(view) => io.ftq.get(tid, view.id),
                    None => None,
                };
                predicted_branch |= io.bac.update_pc(&inst, &mut next_pc, ft_ref);

                inst.set_pred_targ(&next_pc);

                if inst.is_control() {
                    self.stats.thread[tid].num_branches += 1;
                }
                if predicted_branch {
                    trace!(
                        "branch detected with PC {:#x} -> targ {:#x}",
                        this_pc.inst_addr(),
                        next_pc.inst_addr()
                    );
                    self.stats.predicted_branches += 1;
                }

                new_macro |= this_pc.inst_addr() != next_pc.inst_addr();

                // Move to the next instruction, unless we have a branch.
                this_pc.set(&next_pc);
                in_rom = is_rom_micro_pc(this_pc.micro_pc());

                if new_macro {
                    fetch_addr = this_pc.inst_addr() & pc_mask;
                    blk_offset = (fetch_addr
                        .wrapping_sub(self.fetch_buffer[tid].pc().val())
                        / self.inst_size as u64) as usize;
                    pc_offset = 0;
                    cur_macroop = None;
                }

                let is_quiesce = inst.is_quiesce();
                self.delayed_commit[tid] = inst.is_delayed_commit();
                self.fetch_queue[tid].push_back(inst);
                debug_assert!(self.fetch_queue[tid].len() <= self.fetch_queue_size);
                trace!(
                    "[tid:{}] fetch queue entry created ({}/{})",
                    tid,
                    self.fetch_queue[tid].len(),
                    self.fetch_queue_size
                );

                // Check if the PC left the current fetch target's range.
                if let Some(view) = cur_ft {
                    if !view.in_range(this_pc.inst_addr()) {
                        cur_ft = None;
                    }
                }

                if is_quiesce {
                    trace!("quiesce instruction encountered, halting fetch");
                    self.status[tid] = ThreadStatus::QuiescePending;
                    *status_change = true;
                    quiesce = true;
                    break;
                }

                if self.decoupled_front_end && cur_ft.is_none() {
                    break;
                }

                if !((cur_macroop.is_some() || self.decoder[tid].inst_ready())
                    && self.num_inst < self.fetch_width
                    && self.fetch_queue[tid].len() < self.fetch_queue_size)
                {
                    break;
                }
            }

            // Re-evaluate whether the next instruction comes from the
            // micro-op ROM.
            in_rom = is_rom_micro_pc(this_pc.micro_pc());
        }

        if predicted_branch {
            trace!(
                "[tid:{}] done fetching, predicted branch instruction encountered",
                tid
            );
        } else if self.num_inst >= self.fetch_width {
            trace!(
                "[tid:{}] done fetching, reached fetch bandwidth for this cycle",
                tid
            );
        } else if blk_offset >= num_insts {
            trace!("[tid:{}] done fetching, reached the end of the fetch buffer", tid);
        } else if self.decoupled_front_end && cur_ft.is_none() {
            trace!("[tid:{}] done fetching, reached the end of the fetch target", tid);
        }

        // The head fetch target was fully consumed; pop it. A refused pop
        // means the BAC predicted something else and must be resteered.
        if self.decoupled_front_end && cur_ft.is_none() {
            trace!("[tid:{}] done with fetch target, popping from FTQ", tid);
            if !io.ftq.update_head(tid) {
                self.bac_resteer(&this_pc, tid, io.ftq, to_bac);
            }
        }

        self.macroop[tid] = cur_macroop;
        self.fetch_offset[tid] = pc_offset;
        self.pc[tid] = this_pc;

        if self.num_inst > 0 {
            self.wrote_to_time_buffer = true;
        }

        // Pipeline a fetch if the next byte lives in a different buffer
        // block and the state machine permits a new access.
        let fetch_addr = self.pc[tid].inst_addr().wrapping_add(pc_offset) & pc_mask;
        let fetch_buffer_block_pc = VirtAddr::new(fetch_addr).align_down(self.fetch_buffer_size);
        self.issue_pipelined_ifetch[tid] = fetch_buffer_block_pc != self.fetch_buffer[tid].pc()
            && !matches!(
                self.status[tid],
                ThreadStatus::IcacheWaitResponse
                    | ThreadStatus::ItlbWait
                    | ThreadStatus::FtqEmpty
                    | ThreadStatus::IcacheWaitRetry
                    | ThreadStatus::QuiescePending
            )
            && self.ftq_head_ok(tid, io.ftq)
            && self.macroop[tid].is_none();
    }
}
