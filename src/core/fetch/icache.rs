//! Cache-access engine.
//!
//! Issues timing reads for demand fetch and prefetch, owns the retry packet
//! and the cache-blocked flag, and routes responses back to the demand
//! continuation or the prefetch adoption path. Also hosts
//! [`Fetch::fetch_cache_line`], the entry point that dispatches on the head
//! fetch target's lifecycle state, and the end-of-tick pipelined refetch.

use log::{trace, warn};

use crate::common::{ThreadId, VirtAddr};
use crate::core::ftq::{FetchTargetState, FtId};
use crate::isa::is_rom_micro_pc;
use crate::mem::request::{FetchRequest, Packet};
use crate::stats::FetchStats;

use super::{Fetch, FetchIo, ThreadStatus};

impl Fetch {
    /// Starts fetching the cache line holding `vaddr` for `tid`.
    ///
    /// With the decoupled front-end this consults the head fetch target
    /// (and, for block-crossing instructions, the next one) and reuses its
    /// translation or in-flight prefetch where possible. Returns false if
    /// the access could not even be attempted.
    pub(super) fn fetch_cache_line(
        &mut self,
        vaddr: VirtAddr,
        tid: ThreadId,
        pc: u64,
        io: &mut FetchIo,
    ) -> bool {
        if self.cache_blocked {
            trace!("[tid:{}] can't fetch cache line, cache blocked", tid);
            return false;
        } else if self.check_interrupt(pc) && !self.delayed_commit[tid] {
            // Hold off fetch while an interrupt is pending and we're at an
            // interruptible boundary.
            trace!("[tid:{}] can't fetch cache line, interrupt pending", tid);
            return false;
        }

        // Align the fetch address to the start of a fetch buffer segment.
        let fetch_buffer_block_pc = vaddr.align_down(self.fetch_buffer_size);

        trace!(
            "[tid:{}] fetching cache line {:#x} for PC:{:#x}, addr:{:#x}",
            tid,
            fetch_buffer_block_pc,
            pc,
            vaddr
        );

        let mut ft_id: Option<FtId> = None;
        if self.decoupled_front_end {
            // In theory only the head fetch target matters. However, an
            // instruction can span two fetch targets: the PC still points
            // into the head but the bytes to finish decoding live in the
            // next target's cache block.
            let cache_block = vaddr.align_down(self.cache_blk_size);

            let head = io.ftq.head(tid).expect("demand fetch with empty FTQ");
            trace!("chk {} for {:#x}", head, cache_block);

            if head.blk_addr() != cache_block {
                self.stats.ft_cross_cache_block += 1;

                if head.is_fall_through() {
                    // The head falls through sequentially; try the next
                    // fetch target's request.
                    match io.ftq.next_head(tid) {
                        Some(next) if next.blk_addr() == cache_block => {
                            trace!("chk {} for {:#x}", next, cache_block);
                            ft_id = Some(next.id);
                        }
                        Some(next) => {
                            trace!("chk {} for {:#x}", next, cache_block);
                            self.stats.ft_cross_cache_block_not_next += 1;
                        }
                        None => {}
                    }
                }
            } else {
                ft_id = Some(head.id);
            }
        }

        if let Some(id) = ft_id {
            let state = io
                .ftq
                .get_mut(tid, id)
                .expect("selected fetch target vanished")
                .state;

            match state {
                FetchTargetState::ReadyToFetch => {
                    // Translation done and the block was prefetched into the
                    // I-cache; initiate the access right away.
                    trace!("[tid:{}] ready to fetch", tid);
                    self.stats.ft_ready_to_fetch += 1;
                }

                FetchTargetState::PrefetchInProgress => {
                    // Wait for the prefetch response; the in-flight packet
                    // becomes the demand request.
                    trace!("[tid:{}] prefetch in progress", tid);
                    self.stats.ft_prefetch_in_progress += 1;
                    self.stats.pf_late += 1;

                    self.outstanding_prefetches = self.outstanding_prefetches.saturating_sub(1);
                    self.last_icache_stall[tid] = self.now;
                    self.status[tid] = ThreadStatus::IcacheWaitResponse;
                    self.fetch_buffer[tid].expect_fill(fetch_buffer_block_pc);

                    let ft = io.ftq.get_mut(tid, id).unwrap();
                    let req = ft.pop_req();
                    ft.mark_ready();

                    io.cpu.fetch_request_sent(&req);
                    self.mem_req[tid] = Some(req);
                    return true;
                }

                FetchTargetState::TranslationInProgress => {
                    // Wait for the translation to complete; its request
                    // becomes the demand request.
                    trace!("[tid:{}] translation in progress", tid);
                    self.stats.ft_translation_in_progress += 1;

                    self.status[tid] = ThreadStatus::ItlbWait;
                    let ft = io.ftq.get_mut(tid, id).unwrap();
                    let req = ft.pop_req();
                    ft.mark_ready();
                    self.mem_req[tid] = Some(req);
                    return true;
                }

                FetchTargetState::TranslationFailed => {
                    // Pop the fault and take the trap path.
                    trace!("[tid:{}] translation failed", tid);
                    self.stats.ft_translation_failed += 1;

                    let ft = io.ftq.get_mut(tid, id).unwrap();
                    let fault = ft.fault.clone().expect("failed translation without fault");
                    let req = ft
                        .req()
                        .cloned()
                        .expect("failed translation without request");
                    self.process_trap(tid, fault, req, io);
                    return true;
                }

                FetchTargetState::TranslationReady => {
                    // Translation ready but no prefetch was issued; the
                    // request can be used directly.
                    trace!("[tid:{}] translation ready", tid);
                    self.stats.ft_translation_ready += 1;
                }

                FetchTargetState::Initial => {}
            }
        }

        // Create (or reclaim) the request for this fetch buffer block.
        let ft_ref = ft_id.and_then(|id| io.ftq.get_mut(tid, id));
        let req = self.make_request(fetch_buffer_block_pc, tid, pc, ft_ref);
        self.mem_req[tid] = Some(req.clone());

        if req.has_paddr() {
            // Translation already known; go straight to the cache.
            self.perform_cache_access(fetch_buffer_block_pc, tid, req, false, io);
        } else {
            // Initiate translation of the icache block.
            self.status[tid] = ThreadStatus::ItlbWait;
            self.start_translation(req, tid, ft_id, io);
        }

        true
    }

    /// Builds a packet for `mem_req` and sends it to the I-cache.
    ///
    /// Demand accesses retag the fetch buffer and move the thread to
    /// `IcacheWaitResponse`; rejected demand packets park in the retry slot
    /// and block the cache, rejected prefetches are dropped silently.
    pub(super) fn perform_cache_access(
        &mut self,
        vaddr: VirtAddr,
        tid: ThreadId,
        mem_req: FetchRequest,
        prefetch: bool,
        io: &mut FetchIo,
    ) -> bool {
        // Check that we're not going off into random memory; if so, wait
        // around for commit to squash us onto the right track.
        if !io.cpu.is_mem_addr(mem_req.paddr().val()) {
            warn!(
                "address {:#x} is outside of physical memory, stopping fetch",
                mem_req.paddr()
            );
            self.status[tid] = ThreadStatus::NoGoodAddr;
            self.mem_req[tid] = None;
            return false;
        }

        let paddr = mem_req.paddr().val();
        let req_for_probe = mem_req.clone();
        let pkt = Packet::new_read(mem_req, self.now);

        if !prefetch {
            self.fetch_buffer[tid].expect_fill(vaddr);
            trace!(
                "doing instruction read VA:{:#x} PA:{:#x}",
                vaddr,
                paddr
            );
            debug_assert_eq!(vaddr, pkt.req.vaddr);
            self.stats.cache_lines += 1;
        }

        // Access the cache.
        match io.icache.send_timing_req(pkt) {
            Err(rejected) => {
                assert!(self.retry_pkt.is_none());
                assert!(self.retry_tid.is_none());
                trace!("[tid:{}] out of MSHRs", tid);

                if prefetch {
                    // Prefetch packets are dropped on back-pressure.
                    drop(rejected);
                } else {
                    // Save the packet and wait for the retry callback.
                    self.status[tid] = ThreadStatus::IcacheWaitRetry;
                    self.retry_pkt = Some(rejected);
                    self.retry_tid = Some(tid);
                    self.cache_blocked = true;
                }
                false
            }
            Ok(()) => {
                // Keep track of the outstanding fetches.
                self.fetches_in_progress.insert(paddr);
                trace!(
                    "[tid:{}] successfully sent fetch request to {:#x}, in flight: {}",
                    tid,
                    paddr,
                    self.fetches_in_progress.len()
                );
                self.stats
                    .mem_req_in_flight
                    .sample(self.fetches_in_progress.len() as u64);

                if !prefetch {
                    trace!("[tid:{}] doing demand icache access", tid);
                    // Demand access blocks the thread until the response.
                    self.last_icache_stall[tid] = self.now;
                    self.status[tid] = ThreadStatus::IcacheWaitResponse;
                    io.cpu.fetch_request_sent(&req_for_probe);
                }
                true
            }
        }
    }

    /// Response callback from the I-cache.
    ///
    /// A packet that no longer matches the thread's demand request is either
    /// adopted by a fetch target (prefetch completion) or counted as a
    /// squashed access and dropped.
    pub fn process_cache_completion(&mut self, pkt: Packet, io: &mut FetchIo) {
        let tid = pkt.req.tid;
        self.fetches_in_progress.remove(&pkt.req.paddr().val());

        // Only fill the buffer if the thread is still waiting on this
        // access.
        let is_demand = self.status[tid] == ThreadStatus::IcacheWaitResponse
            && self.mem_req[tid].as_ref().map_or(false, |m| m.id == pkt.req.id);

        if !is_demand {
            if self.try_satisfy_prefetch(tid, &pkt, io) {
                // The request belongs to a fetch target; we are done.
                return;
            }
            self.stats.icache_squashes += 1;
            return;
        }

        trace!(
            "[tid:{}] recv {:#x}, waking up from cache miss",
            tid,
            pkt.req.paddr()
        );

        self.fetch_buffer[tid].fill(&pkt.data);

        // Wake up the CPU if it went to sleep waiting on this completion.
        io.cpu.wake_cpu();
        trace!("[tid:{}] activating fetch due to cache completion", tid);
        self.switch_to_active(io.cpu);

        // Only switch to IcacheAccessComplete if we're not stalled as well.
        if self.check_stall(tid) {
            self.status[tid] = ThreadStatus::Blocked;
        } else {
            self.status[tid] = ThreadStatus::IcacheAccessComplete;
        }

        if pkt.access_depth == 0 {
            self.stats.demand_hit += 1;
        } else {
            self.stats.demand_miss += 1;
        }

        let latency = self.now.saturating_sub(pkt.send_tick);
        FetchStats::sample_latency(&mut self.stats.instr_access_latency, latency);
        io.cpu.inst_access_complete(&pkt);

        self.mem_req[tid] = None;
    }

    /// Retry callback from the I-cache after back-pressure.
    ///
    /// Resends the parked packet if it survived; if a squash dropped it,
    /// just unblock the cache.
    pub fn recv_req_retry(&mut self, io: &mut FetchIo) {
        match self.retry_pkt.take() {
            Some(pkt) => {
                assert!(self.cache_blocked);
                let tid = self.retry_tid.expect("retry packet without owner");
                assert_eq!(self.status[tid], ThreadStatus::IcacheWaitRetry);

                let req_for_probe = pkt.req.clone();
                match io.icache.send_timing_req(pkt) {
                    Ok(()) => {
                        self.status[tid] = ThreadStatus::IcacheWaitResponse;
                        io.cpu.fetch_request_sent(&req_for_probe);
                        self.retry_tid = None;
                        self.cache_blocked = false;
                    }
                    Err(rejected) => {
                        // Still no room; keep waiting for the next retry.
                        self.retry_pkt = Some(rejected);
                    }
                }
            }
            None => {
                assert!(self.retry_tid.is_none());
                // The access was squashed since it was sent out; just clear
                // the blocked flag.
                self.cache_blocked = false;
            }
        }
    }

    /// Issues the next block's fetch at end of tick if the decode loop
    /// requested a pipelined access and the buffer would miss.
    pub(super) fn pipeline_icache_accesses(&mut self, tid: ThreadId, io: &mut FetchIo) {
        if !self.issue_pipelined_ifetch[tid] {
            return;
        }

        let this_pc = self.pc[tid].clone();

        if is_rom_micro_pc(this_pc.micro_pc()) {
            return;
        }

        let pc_offset = self.fetch_offset[tid];
        let fetch_addr = (this_pc.inst_addr().wrapping_add(pc_offset)) & self.decoder[tid].pc_mask();

        // Align the fetch PC so it's at the start of a fetch buffer segment.
        let fetch_buffer_block_pc = VirtAddr::new(fetch_addr).align_down(self.fetch_buffer_size);

        // Unless the buffer already has the block, fetch it from the icache.
        if !self.fetch_buffer[tid].hit(fetch_buffer_block_pc) {
            trace!(
                "[tid:{}] issuing a pipelined I-cache access, starting at PC {:#x}",
                tid,
                this_pc.inst_addr()
            );
            self.fetch_cache_line(VirtAddr::new(fetch_addr), tid, this_pc.inst_addr(), io);
        }
    }
}
