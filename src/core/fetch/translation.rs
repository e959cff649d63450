//! Request building, translation management, and the trap path.
//!
//! Translations are issued to the MMU with the outstanding counter bumped
//! *before* the call, because the MMU may complete synchronously. Each issue
//! records which fetch target (if any) the request was bound to; the
//! completion uses that binding to route between the demand-fetch
//! continuation and the prefetch completion path.

use log::trace;

use crate::common::{Fault, PhysAddr, ThreadId, VirtAddr};
use crate::core::ftq::FetchTarget;
use crate::core::ftq::FtId;
use crate::core::inst::DynInst;
use crate::isa::StaticInst;
use crate::mem::request::FetchRequest;
use crate::stats::FetchStats;

use super::{Fetch, FetchIo, PendingTranslation, PendingTrap, ThreadStatus};

impl Fetch {
    /// Builds the memory request for one fetch-buffer block.
    ///
    /// If `ft` already owns a request for the same address it is reclaimed
    /// instead of allocating a new one. If `ft` advertises a physical
    /// address for the covered block, it is spliced onto the request so the
    /// access can skip translation.
    pub(super) fn make_request(
        &mut self,
        vaddr: VirtAddr,
        tid: ThreadId,
        pc: u64,
        mut ft: Option<&mut FetchTarget>,
    ) -> FetchRequest {
        let mut req = None;

        // First check if we can reuse the request from the fetch target.
        if let Some(ft) = ft.as_deref_mut() {
            if ft.req().map_or(false, |r| r.vaddr == vaddr) {
                let reused = ft.pop_req();
                ft.mark_ready();
                trace!(
                    "[tid:{}] reusing request for {:#x} from {}",
                    tid,
                    vaddr,
                    ft
                );
                req = Some(reused);
            }
        }

        let mut req = req.unwrap_or_else(|| {
            FetchRequest::new(self.alloc_req_id(), tid, vaddr, self.fetch_buffer_size, pc)
        });

        if let Some(ft) = ft.as_deref_mut() {
            if ft.has_paddr() && ft.blk_addr() == vaddr.align_down(self.cache_blk_size) {
                // The fetch target's translation covers the whole cache
                // block; keep its block address and add this buffer's
                // offset within the block.
                let blk_mask = self.cache_blk_size as u64 - 1;
                let cl_pa = (ft.paddr().val() & !blk_mask) | (vaddr.val() & blk_mask);
                req.set_paddr(PhysAddr::new(cl_pa));
                trace!(
                    "[tid:{}] using translation VA:{:#x} PA:{:#x} from {}",
                    tid,
                    vaddr,
                    cl_pa,
                    ft
                );
            }
        }
        req
    }

    /// Issues a timing translation for `req`, optionally binding it to the
    /// fetch target `ft_id`.
    pub(super) fn start_translation(
        &mut self,
        req: FetchRequest,
        tid: ThreadId,
        ft_id: Option<FtId>,
        io: &mut FetchIo,
    ) {
        if let Some(id) = ft_id {
            if let Some(ft) = io.ftq.get_mut(tid, id) {
                ft.start_translation(req.clone(), self.now);
            }
        }

        // Increment must happen before the issue; the translation may
        // complete immediately.
        self.outstanding_translations += 1;
        self.pending_translations.push(PendingTranslation {
            req_id: req.id,
            ft: ft_id,
        });

        if let Some(done) = io.mmu.translate_timing(req) {
            self.finish_translation(done.fault, done.req, io);
        }
    }

    /// Completion callback for a translation issued by
    /// [`Fetch::start_translation`].
    ///
    /// Routes the completion to the demand-fetch continuation, to the bound
    /// fetch target's prefetch path, or counts it as squashed.
    pub fn finish_translation(
        &mut self,
        fault: Option<Fault>,
        req: FetchRequest,
        io: &mut FetchIo,
    ) {
        let tid = req.tid;
        let fetch_buffer_block_pc = req.vaddr;

        // Wake up the CPU if it was idle.
        io.cpu.wake_cpu();

        debug_assert!(self.outstanding_translations > 0);
        self.outstanding_translations = self.outstanding_translations.saturating_sub(1);

        let ft_id = self
            .pending_translations
            .iter()
            .position(|p| p.req_id == req.id)
            .map(|i| self.pending_translations.remove(i))
            .and_then(|p| p.ft);

        let is_demand = self.status[tid] == ThreadStatus::ItlbWait
            && self
                .mem_req[tid]
                .as_ref()
                .map_or(false, |m| m.id == req.id && m.vaddr == req.vaddr);

        if !is_demand {
            // Stale or prefetch-only: record on the fetch target if it still
            // exists, otherwise the translation died with a squash.
            let mut recorded = false;
            if let Some(id) = ft_id {
                if let Some(ft) = io.ftq.get_mut(tid, id) {
                    trace!(
                        "[tid:{}] translation for PF:{:#x} completed {}",
                        tid,
                        req.vaddr,
                        ft
                    );
                    let latency = ft.finish_translation(fault, req, true, self.now);
                    FetchStats::sample_latency(&mut self.stats.translation_latency, latency);
                    recorded = true;
                }
            }
            if !recorded {
                trace!("[tid:{}] ignoring itlb completion after squash", tid);
                self.stats.tlb_squashes += 1;
            }
            return;
        }

        if let Some(id) = ft_id {
            if let Some(ft) = io.ftq.get_mut(tid, id) {
                trace!(
                    "[tid:{}] translation for {:#x} completed {} ({})",
                    tid,
                    req.vaddr,
                    ft,
                    if fault.is_none() { "NoFault" } else { "Fault" }
                );
                let latency = ft.finish_translation(fault.clone(), req.clone(), false, self.now);
                FetchStats::sample_latency(&mut self.stats.translation_latency, latency);
            }
        }

        // If translation was successful, attempt to read the icache block.
        match fault {
            None => {
                let demand = {
                    let slot = self.mem_req[tid].as_mut().expect("demand request vanished");
                    slot.set_paddr(req.paddr());
                    slot.clone()
                };
                trace!(
                    "[tid:{}] doing instruction read VA:{:#x} PA:{:#x}",
                    tid,
                    demand.vaddr,
                    demand.paddr()
                );
                self.perform_cache_access(fetch_buffer_block_pc, tid, demand, false, io);
            }
            Some(fault) => {
                self.process_trap(tid, fault, req, io);
            }
        }
        self.stage_status = self.update_fetch_status(io);
    }

    /// Delivers a translation fault to commit as a nop-carried instruction.
    ///
    /// If neither fetch width nor fetch queue space is available the trap is
    /// deferred by one cycle.
    pub(super) fn process_trap(
        &mut self,
        tid: ThreadId,
        fault: Fault,
        req: FetchRequest,
        io: &mut FetchIo,
    ) {
        // Don't send an instruction to decode if we can't handle it.
        if self.num_inst >= self.fetch_width
            || self.fetch_queue[tid].len() >= self.fetch_queue_size
        {
            assert!(self.pending_trap.is_none());
            self.pending_trap = Some(PendingTrap { tid, fault, req });
            return;
        }

        // Translation faulted; the icache request won't be sent.
        self.mem_req[tid] = None;

        // Carry the fault on a nop. This thread does nothing until commit
        // handles it; the only other way it wakes up is a squash.
        let fetch_pc = self.pc[tid].clone();
        trace!("[tid:{}] translation faulted, building noop", tid);

        let seq = self.next_seq();
        let mut inst = DynInst::new(
            seq,
            tid,
            StaticInst::nop(),
            None,
            fetch_pc.clone(),
            fetch_pc.clone(),
        );
        inst.set_not_an_inst();
        inst.set_pred_targ(&fetch_pc);
        inst.fault = Some(fault.clone());

        self.delayed_commit[tid] = inst.is_delayed_commit();
        self.fetch_queue[tid].push_back(inst);
        debug_assert!(self.fetch_queue[tid].len() <= self.fetch_queue_size);

        self.wrote_to_time_buffer = true;
        io.cpu.activity_this_cycle();

        self.status[tid] = ThreadStatus::TrapPending;
        trace!("[tid:{}] blocked, need to handle the trap", tid);
        trace!(
            "[tid:{}] fault ({}) detected @ PC {:#x} (req VA {:#x})",
            tid,
            fault,
            self.pc[tid].inst_addr(),
            req.vaddr
        );
    }
}
