//! The instruction fetch unit.
//!
//! One instance drives instruction fetch for every hardware thread of the
//! core. Each tick it ingests signals from downstream stages, arbitrates
//! between threads, translates and reads instruction memory with accurate
//! timing, decodes the returned bytes into micro-ops, and forwards a bounded
//! bundle to decode. With the decoupled front-end enabled it additionally
//! walks the FTQ issuing translations and cache prefetches ahead of demand.
//!
//! The unit is structured as a per-thread state machine
//! ([`ThreadStatus`]) plus process-wide resources (retry packet, outstanding
//! counters, in-flight set) that the cooperative tick/completion callbacks
//! mutate without locking. Work that would block becomes a thread state;
//! completions re-enter through [`Fetch::process_cache_completion`],
//! [`Fetch::recv_req_retry`], and [`Fetch::finish_translation`].
//!
//! Submodules carve the implementation along hardware concerns:
//! [`arbiter`] (SMT policy), [`buffer`] (fetch buffer), [`decode`] (the
//! per-thread decode loop), [`icache`] (cache access engine),
//! [`prefetch`] (FTQ prefetcher), and [`translation`] (MMU interplay and
//! the trap path).

pub mod arbiter;
pub mod buffer;
pub mod decode;
pub mod icache;
pub mod prefetch;
pub mod translation;

use std::collections::{HashSet, VecDeque};

use log::trace;

use crate::common::{Fault, InstSeqNum, ThreadId};
use crate::config::{FetchConfig, SmtFetchPolicy};
use crate::core::bac::Bac;
use crate::core::ftq::{FtId, Ftq};
use crate::core::hooks::CpuHooks;
use crate::core::inst::DynInst;
use crate::core::signals::{BacSignals, FetchInputs, FetchStruct, SquashedInst};
use crate::isa::{Decoder, PcState, StaticInst};
use crate::mem::mmu::Mmu;
use crate::mem::port::IcachePort;
use crate::mem::request::{FetchRequest, Packet, ReqId};
use crate::stats::FetchStats;

use buffer::FetchBuffer;

/// Per-thread state of the fetch state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadStatus {
    /// Actively fetching and decoding.
    Running,
    /// Thread has nothing to do.
    Idle,
    /// Draining state after a squash signal.
    Squashing,
    /// Stalled on a downstream stage or a drain request.
    Blocked,
    /// Decoupled front-end: waiting for the BAC to fill the FTQ.
    FtqEmpty,
    /// A quiesce instruction halted fetch until an external wakeup.
    QuiescePending,
    /// Waiting for an address translation to complete.
    ItlbWait,
    /// Waiting for the demand I-cache response.
    IcacheWaitResponse,
    /// Waiting for the I-cache to accept a previously rejected packet.
    IcacheWaitRetry,
    /// Demand response arrived; decoding resumes next opportunity.
    IcacheAccessComplete,
    /// Translated address fell outside physical memory; waiting for squash.
    NoGoodAddr,
    /// A translation fault was delivered; waiting for commit to handle it.
    TrapPending,
}

/// Stage-level activity status, used to gate CPU activity notifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StageStatus {
    Active,
    Inactive,
}

/// Per-thread stall sources.
#[derive(Clone, Copy, Debug, Default)]
struct Stalls {
    decode: bool,
    drain: bool,
}

/// Bookkeeping for a translation issued to the MMU and not yet completed.
#[derive(Clone, Debug)]
struct PendingTranslation {
    req_id: ReqId,
    ft: Option<FtId>,
}

/// A trap that could not be delivered this cycle and fires next tick.
#[derive(Clone, Debug)]
struct PendingTrap {
    tid: ThreadId,
    fault: Fault,
    req: FetchRequest,
}

/// Xorshift generator for the decode-forwarding start thread.
#[derive(Clone, Debug)]
struct SelectRng {
    state: u64,
}

impl SelectRng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_index(&mut self, n: usize) -> usize {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x as usize) % n
    }
}

/// External collaborators the fetch unit acts through during a tick or a
/// completion callback.
///
/// The unit owns none of these; the surrounding core passes them in
/// explicitly on every entry point.
pub struct FetchIo<'a> {
    /// Memory management unit for timing translations.
    pub mmu: &'a mut dyn Mmu,
    /// Timing port into the instruction cache.
    pub icache: &'a mut dyn IcachePort,
    /// Branch-address calculator.
    pub bac: &'a mut dyn Bac,
    /// Fetch target queue (BAC-owned, observed here).
    pub ftq: &'a mut Ftq,
    /// CPU framework notifications.
    pub cpu: &'a mut dyn CpuHooks,
    /// Threads currently active on the core.
    pub active_threads: &'a [ThreadId],
}

/// The fetch stage of the out-of-order core.
pub struct Fetch {
    // Configuration, fixed at construction.
    fetch_policy: SmtFetchPolicy,
    decoupled_front_end: bool,
    fetch_width: usize,
    decode_width: usize,
    cache_blk_size: usize,
    fetch_buffer_size: usize,
    fetch_queue_size: usize,
    num_threads: usize,
    num_fetching_threads: usize,
    max_outstanding_prefetches: usize,
    max_outstanding_translations: usize,
    full_system: bool,
    inst_size: usize,
    entry_pc: u64,

    // Per-thread state.
    status: Vec<ThreadStatus>,
    pc: Vec<PcState>,
    fetch_offset: Vec<u64>,
    macroop: Vec<Option<StaticInst>>,
    delayed_commit: Vec<bool>,
    mem_req: Vec<Option<FetchRequest>>,
    fetch_buffer: Vec<FetchBuffer>,
    stalls: Vec<Stalls>,
    last_icache_stall: Vec<u64>,
    issue_pipelined_ifetch: Vec<bool>,
    fetch_queue: Vec<VecDeque<DynInst>>,
    decoder: Vec<Box<dyn Decoder>>,

    // Process-wide state; mutated only from the cooperative tick and
    // completion callbacks.
    retry_pkt: Option<Packet>,
    retry_tid: Option<ThreadId>,
    cache_blocked: bool,
    interrupt_pending: bool,
    outstanding_prefetches: usize,
    outstanding_translations: usize,
    fetches_in_progress: HashSet<u64>,
    pending_translations: Vec<PendingTranslation>,
    pending_trap: Option<PendingTrap>,
    priority_list: VecDeque<ThreadId>,
    stage_status: StageStatus,
    num_inst: usize,
    threads_fetched: usize,
    wrote_to_time_buffer: bool,
    now: u64,
    next_req_id: u64,
    next_seq_num: InstSeqNum,
    rng: SelectRng,

    /// Statistics group for the stage.
    pub stats: FetchStats,
}

impl Fetch {
    /// Constructs the fetch unit.
    ///
    /// `decoders` supplies one decoder per hardware thread; `entry_pc` is
    /// the reset program counter for every thread.
    ///
    /// # Panics
    ///
    /// Panics if the configuration violates the structural limits (see
    /// [`FetchConfig::validate`]) or if the decoder count does not match the
    /// thread count.
    pub fn new(config: &FetchConfig, decoders: Vec<Box<dyn Decoder>>, entry_pc: u64) -> Self {
        config.validate();
        assert_eq!(
            decoders.len(),
            config.num_threads,
            "one decoder required per hardware thread"
        );

        let n = config.num_threads;
        let inst_size = decoders[0].inst_size();
        let mut fetch = Self {
            fetch_policy: config.smt_fetch_policy,
            decoupled_front_end: config.decoupled_front_end,
            fetch_width: config.fetch_width,
            decode_width: config.decode_width,
            cache_blk_size: config.cache_blk_size,
            fetch_buffer_size: config.fetch_buffer_size,
            fetch_queue_size: config.fetch_queue_size,
            num_threads: n,
            num_fetching_threads: config.smt_num_fetching_threads,
            max_outstanding_prefetches: config.max_outstanding_prefetches,
            max_outstanding_translations: config.max_outstanding_translations,
            full_system: config.full_system,
            inst_size,
            entry_pc,
            status: vec![ThreadStatus::Idle; n],
            pc: (0..n).map(|_| PcState::new(entry_pc)).collect(),
            fetch_offset: vec![0; n],
            macroop: vec![None; n],
            delayed_commit: vec![false; n],
            mem_req: vec![None; n],
            fetch_buffer: (0..n)
                .map(|_| FetchBuffer::new(config.fetch_buffer_size))
                .collect(),
            stalls: vec![Stalls::default(); n],
            last_icache_stall: vec![0; n],
            issue_pipelined_ifetch: vec![false; n],
            fetch_queue: (0..n).map(|_| VecDeque::new()).collect(),
            decoder: decoders,
            retry_pkt: None,
            retry_tid: None,
            cache_blocked: false,
            interrupt_pending: false,
            outstanding_prefetches: 0,
            outstanding_translations: 0,
            fetches_in_progress: HashSet::new(),
            pending_translations: Vec::new(),
            pending_trap: None,
            priority_list: VecDeque::new(),
            stage_status: StageStatus::Inactive,
            num_inst: 0,
            threads_fetched: 0,
            wrote_to_time_buffer: false,
            now: 0,
            next_req_id: 0,
            next_seq_num: 1,
            rng: SelectRng::new(config.rng_seed),
            stats: FetchStats::new(config.fetch_width, n),
        };
        fetch.reset_stage();
        fetch
    }

    /// Brings the stage up in active state; fetch must start fetching at the
    /// very beginning of simulation.
    pub fn startup(&mut self, cpu: &mut dyn CpuHooks) {
        self.switch_to_active(cpu);
    }

    /// Reinitializes a single thread to fetch from `pc`.
    pub fn clear_states(&mut self, tid: ThreadId, pc: PcState) {
        self.status[tid] = ThreadStatus::Running;
        self.pc[tid] = pc;
        self.fetch_offset[tid] = 0;
        self.macroop[tid] = None;
        self.delayed_commit[tid] = false;
        self.mem_req[tid] = None;
        self.stalls[tid] = Stalls::default();
        self.fetch_buffer[tid].reset();
        self.fetch_queue[tid].clear();
    }

    /// Resets the whole stage to its post-construction state.
    pub fn reset_stage(&mut self) {
        self.num_inst = 0;
        self.interrupt_pending = false;
        self.cache_blocked = false;
        self.priority_list.clear();

        for tid in 0..self.num_threads {
            self.clear_states(tid, PcState::new(self.entry_pc));
            self.priority_list.push_back(tid);
        }

        self.wrote_to_time_buffer = false;
        self.stage_status = StageStatus::Inactive;
    }

    /// Removes a deactivated thread from the arbitration rotation.
    pub fn deactivate_thread(&mut self, tid: ThreadId) {
        self.priority_list.retain(|&t| t != tid);
    }

    /// Resumes thread 0 after a quiesce wakeup event.
    pub fn wake_from_quiesce(&mut self) {
        trace!("waking up from quiesce");
        self.status[0] = ThreadStatus::Running;
    }

    /// Marks `tid` as drain-stalled; fetch blocks until the drain finishes.
    pub fn drain_stall(&mut self, tid: ThreadId) {
        assert!(!self.stalls[tid].drain);
        trace!("[tid:{}] thread drained", tid);
        self.stalls[tid].drain = true;
    }

    /// Clears all drain and decode stalls after the drain completes.
    pub fn drain_resume(&mut self) {
        for tid in 0..self.num_threads {
            self.stalls[tid].decode = false;
            self.stalls[tid].drain = false;
        }
    }

    /// True once every thread has drained to a quiescent state.
    pub fn is_drained(&self) -> bool {
        for tid in 0..self.num_threads {
            if !self.fetch_queue[tid].is_empty() {
                return false;
            }
            if self.status[tid] != ThreadStatus::Idle
                && !(self.status[tid] == ThreadStatus::Blocked && self.stalls[tid].drain)
            {
                return false;
            }
        }
        // A scheduled trap event would restart the pipeline mid-drain.
        self.pending_trap.is_none()
    }

    /// Asserts the invariants that must hold in a drained stage.
    pub fn drain_sanity_check(&self) {
        assert!(self.is_drained());
        assert!(self.retry_pkt.is_none());
        assert!(self.retry_tid.is_none());
        assert!(!self.cache_blocked);
        assert!(!self.interrupt_pending);
        for tid in 0..self.num_threads {
            assert!(self.mem_req[tid].is_none());
            assert!(self.status[tid] == ThreadStatus::Idle || self.stalls[tid].drain);
        }
    }

    /// True if `tid` must stall for a drain request.
    fn check_stall(&self, tid: ThreadId) -> bool {
        if self.stalls[tid].drain {
            trace!("[tid:{}] drain stall detected", tid);
            return true;
        }
        false
    }

    /// True while an interrupt is pending delivery.
    fn check_interrupt(&self, _pc: u64) -> bool {
        self.interrupt_pending
    }

    fn switch_to_active(&mut self, cpu: &mut dyn CpuHooks) {
        if self.stage_status == StageStatus::Inactive {
            trace!("activating stage");
            cpu.activate_stage();
            self.stage_status = StageStatus::Active;
        }
    }

    fn switch_to_inactive(&mut self, cpu: &mut dyn CpuHooks) {
        if self.stage_status == StageStatus::Active {
            trace!("deactivating stage");
            cpu.deactivate_stage();
            self.stage_status = StageStatus::Inactive;
        }
    }

    /// Recomputes the stage-level activity status from the thread states.
    fn update_fetch_status(&mut self, io: &mut FetchIo) -> StageStatus {
        for &tid in io.active_threads {
            if matches!(
                self.status[tid],
                ThreadStatus::Running | ThreadStatus::Squashing | ThreadStatus::IcacheAccessComplete
            ) {
                if self.stage_status == StageStatus::Inactive {
                    trace!("[tid:{}] activating stage", tid);
                }
                self.switch_to_active(io.cpu);
                return StageStatus::Active;
            }
        }

        self.switch_to_inactive(io.cpu);
        StageStatus::Inactive
    }

    /// Squash initiated by commit: redirect to `new_pc` and drop everything
    /// not yet in the ROB.
    pub fn squash(
        &mut self,
        new_pc: &PcState,
        _done_seq_num: InstSeqNum,
        squash_inst: Option<&SquashedInst>,
        tid: ThreadId,
        io: &mut FetchIo,
    ) {
        trace!("[tid:{}] squash from commit", tid);
        self.do_squash(new_pc, squash_inst, tid);
        io.cpu.remove_insts_not_in_rob(tid);
    }

    /// Squash initiated by decode: redirect and drop instructions younger
    /// than `seq_num`.
    pub fn squash_from_decode(
        &mut self,
        new_pc: &PcState,
        squash_inst: Option<&SquashedInst>,
        seq_num: InstSeqNum,
        tid: ThreadId,
        io: &mut FetchIo,
    ) {
        trace!("[tid:{}] squashing from decode", tid);
        self.do_squash(new_pc, squash_inst, tid);
        io.cpu.remove_insts_until(seq_num, tid);
    }

    fn do_squash(&mut self, new_pc: &PcState, squash_inst: Option<&SquashedInst>, tid: ThreadId) {
        trace!(
            "[tid:{}] squashing, setting PC to {:#x}",
            tid,
            new_pc.inst_addr()
        );

        self.pc[tid] = new_pc.clone();
        self.fetch_offset[tid] = 0;
        // If the squashing micro-op sits mid-macro-op at the redirect PC,
        // resume emission from its remaining micro-ops.
        self.macroop[tid] = match squash_inst {
            Some(si) if si.pc_addr == new_pc.inst_addr() && !si.is_last_microop => {
                si.macroop.clone()
            }
            _ => None,
        };
        self.decoder[tid].reset();

        // Clear the outstanding demand access, if any; its completion will
        // be recognized as stale.
        match self.status[tid] {
            ThreadStatus::IcacheWaitResponse => {
                trace!("[tid:{}] squashing outstanding icache miss", tid);
                self.mem_req[tid] = None;
            }
            ThreadStatus::ItlbWait => {
                trace!("[tid:{}] squashing outstanding itlb miss", tid);
                self.mem_req[tid] = None;
            }
            _ => {}
        }

        // Get rid of the retrying packet if it was from this thread. The
        // cache stays blocked until its retry callback arrives.
        if self.retry_tid == Some(tid) {
            assert!(self.cache_blocked);
            self.retry_pkt = None;
            self.retry_tid = None;
        }

        self.status[tid] = ThreadStatus::Squashing;
        self.fetch_queue[tid].clear();

        // It is not known whether the youngest surviving micro-op was marked
        // delayed-commit; assume it was so interrupts are never taken where
        // they cannot be.
        self.delayed_commit[tid] = true;

        // A deferred trap belongs to the squashed stream.
        if self.pending_trap.as_ref().map_or(false, |p| p.tid == tid) {
            self.pending_trap = None;
        }

        // Prefetch tracking is process-global; charge the full count to the
        // squashing thread.
        self.stats.pf_squashed += self.outstanding_prefetches as u64;
        self.outstanding_prefetches = 0;

        self.stats.squash_cycles += 1;
    }

    /// Requests a BAC resteer to `pc` and invalidates the stale FTQ content.
    fn bac_resteer(&mut self, pc: &PcState, tid: ThreadId, ftq: &mut Ftq, to_bac: &mut BacSignals) {
        trace!("[tid:{}] resteer BAC to PC {:#x}", tid, pc.inst_addr());
        to_bac.fetch_info[tid].squash = true;
        to_bac.fetch_info[tid].next_pc = Some(pc.clone());
        ftq.invalidate(tid);
    }

    /// Ingests the cycle's signals for one thread and applies the state
    /// machine transitions. Returns true if the thread's status changed.
    fn check_signals_and_update(
        &mut self,
        tid: ThreadId,
        inputs: &FetchInputs,
        io: &mut FetchIo,
    ) -> bool {
        // Update the per-thread stall statuses.
        let decode_sig = &inputs.from_decode.decode[tid];
        if decode_sig.block {
            self.stalls[tid].decode = true;
        }
        if decode_sig.unblock {
            assert!(self.stalls[tid].decode);
            assert!(!decode_sig.block);
            self.stalls[tid].decode = false;
        }

        // Check squash signals from commit.
        let commit_sig = &inputs.from_commit.commit[tid];
        if commit_sig.squash {
            let new_pc = commit_sig
                .pc
                .clone()
                .expect("commit squash carries no redirect PC");
            trace!(
                "[tid:{}] squashing from commit with PC = {:#x}",
                tid,
                new_pc.inst_addr()
            );
            self.squash(
                &new_pc,
                commit_sig.done_seq_num,
                commit_sig.squash_inst.as_ref(),
                tid,
                io,
            );
            return true;
        }

        // Check squash signals from decode, unless already squashing.
        let decode_sig = &inputs.from_decode.decode[tid];
        if decode_sig.squash && self.status[tid] != ThreadStatus::Squashing {
            let new_pc = decode_sig
                .next_pc
                .clone()
                .expect("decode squash carries no redirect PC");
            trace!(
                "[tid:{}] squashing from decode with PC = {:#x}",
                tid,
                new_pc.inst_addr()
            );
            self.squash_from_decode(
                &new_pc,
                decode_sig.squash_inst.as_ref(),
                decode_sig.done_seq_num,
                tid,
                io,
            );
            return true;
        }

        if self.check_stall(tid)
            && !matches!(
                self.status[tid],
                ThreadStatus::IcacheWaitResponse
                    | ThreadStatus::IcacheWaitRetry
                    | ThreadStatus::ItlbWait
                    | ThreadStatus::FtqEmpty
                    | ThreadStatus::QuiescePending
            )
        {
            trace!("[tid:{}] setting to blocked", tid);
            self.status[tid] = ThreadStatus::Blocked;
            return true;
        }

        if matches!(
            self.status[tid],
            ThreadStatus::Blocked | ThreadStatus::Squashing
        ) {
            // Switch to running unless told to block or squash this cycle.
            // With a decoupled front-end we can only run once the FTQ has
            // content again.
            if self.decoupled_front_end && io.ftq.is_empty(tid) {
                self.status[tid] = ThreadStatus::FtqEmpty;
            } else {
                trace!("[tid:{}] done squashing, switching to running", tid);
                self.status[tid] = ThreadStatus::Running;
            }
            return true;
        }

        if self.status[tid] == ThreadStatus::FtqEmpty && !io.ftq.is_empty(tid) {
            trace!("[tid:{}] FTQ refilled -> running", tid);
            self.status[tid] = ThreadStatus::Running;
            return true;
        }

        // No signals that would cause fetch to change its status.
        false
    }

    /// Runs one cycle of the fetch stage.
    ///
    /// Order within the tick: deferred trap delivery, signal ingestion,
    /// per-thread fetch/decode passes, pipelined refetch issue, FTQ
    /// prefetch scan, and finally forwarding to decode.
    pub fn tick(
        &mut self,
        inputs: &FetchInputs,
        io: &mut FetchIo,
        to_decode: &mut FetchStruct,
        to_bac: &mut BacSignals,
    ) {
        self.now += 1;
        self.stats.ticks += 1;

        // Deliver a trap deferred from last cycle; it may defer again if
        // there is still no room.
        if let Some(trap) = self.pending_trap.take() {
            self.process_trap(trap.tid, trap.fault, trap.req, io);
        }

        self.wrote_to_time_buffer = false;
        for tid in 0..self.num_threads {
            self.issue_pipelined_ifetch[tid] = false;
        }

        let mut status_change = false;
        for i in 0..io.active_threads.len() {
            let tid = io.active_threads[i];
            let updated = self.check_signals_and_update(tid, inputs, io);
            status_change = status_change || updated;
        }

        trace!("running fetch stage");

        if self.full_system {
            let commit_sig = &inputs.from_commit.commit[0];
            if commit_sig.interrupt_pending {
                self.interrupt_pending = true;
            }
            if commit_sig.clear_interrupt {
                self.interrupt_pending = false;
            }
        }

        // Fetch each of the actively fetching threads.
        self.threads_fetched = 0;
        while self.threads_fetched < self.num_fetching_threads {
            self.fetch_one(&mut status_change, inputs, io, to_bac);
            self.threads_fetched += 1;
        }

        self.stats.nisn_dist.sample(self.num_inst as u64);

        if status_change {
            self.stage_status = self.update_fetch_status(io);
        }

        // Issue the next I-cache request if possible.
        for tid in 0..self.num_threads {
            if self.issue_pipelined_ifetch[tid] {
                self.pipeline_icache_accesses(tid, io);
            }
        }

        // Walk the FTQ for prefetch opportunities.
        if self.decoupled_front_end {
            for tid in 0..self.num_threads {
                self.process_ftq(tid, io);
            }
        }

        self.forward_to_decode(io, to_decode);

        if self.wrote_to_time_buffer {
            trace!("activity this cycle");
            io.cpu.activity_this_cycle();
        }

        self.num_inst = 0;
    }

    /// Drains the per-thread fetch queues into the decode wire, starting at
    /// a uniformly random active thread and rotating under `decode_width`.
    fn forward_to_decode(&mut self, io: &mut FetchIo, to_decode: &mut FetchStruct) {
        if io.active_threads.is_empty() {
            return;
        }

        let mut available: usize = io
            .active_threads
            .iter()
            .filter(|&&tid| !self.stalls[tid].decode)
            .map(|&tid| self.fetch_queue[tid].len())
            .sum();

        let mut insts_to_decode = 0;
        let mut idx = self.rng.next_index(io.active_threads.len());

        while available != 0 && insts_to_decode < self.decode_width {
            let tid = io.active_threads[idx];
            if !self.stalls[tid].decode && !self.fetch_queue[tid].is_empty() {
                let inst = self.fetch_queue[tid].pop_front().unwrap();
                trace!(
                    "[tid:{}] [sn:{}] sending instruction to decode, queue size {}",
                    tid,
                    inst.seq_num,
                    self.fetch_queue[tid].len()
                );
                to_decode.insts.push(inst);
                self.wrote_to_time_buffer = true;
                insts_to_decode += 1;
                available -= 1;
            }
            idx = (idx + 1) % io.active_threads.len();
        }
    }

    /// Accounts the stall reason for a cycle in which `tid` could not fetch.
    fn profile_stall(&mut self, tid: ThreadId, active_threads: &[ThreadId]) {
        trace!("there are no more threads available to fetch from");

        if self.stalls[tid].drain {
            self.stats.pending_drain_cycles += 1;
            trace!("fetch is waiting for a drain");
        } else if active_threads.is_empty() {
            self.stats.no_active_thread_stall_cycles += 1;
            trace!("fetch has no active thread");
        } else {
            match self.status[tid] {
                ThreadStatus::Blocked => {
                    self.stats.blocked_cycles += 1;
                    trace!("[tid:{}] fetch is blocked", tid);
                }
                ThreadStatus::Squashing => {
                    self.stats.squash_cycles += 1;
                    trace!("[tid:{}] fetch is squashing", tid);
                }
                ThreadStatus::IcacheWaitResponse => {
                    self.stats.thread[tid].icache_stall_cycles += 1;
                    trace!(
                        "[tid:{}] fetch is waiting on a cache response (since tick {})",
                        tid,
                        self.last_icache_stall[tid]
                    );
                }
                ThreadStatus::ItlbWait => {
                    self.stats.tlb_cycles += 1;
                    trace!("[tid:{}] fetch is waiting for the ITLB walk to finish", tid);
                }
                ThreadStatus::FtqEmpty => {
                    self.stats.ftq_stall_cycles += 1;
                    trace!("[tid:{}] fetch is waiting for the BAC to fill the FTQ", tid);
                }
                ThreadStatus::TrapPending => {
                    self.stats.pending_trap_stall_cycles += 1;
                    trace!("[tid:{}] fetch is waiting for a pending trap", tid);
                }
                ThreadStatus::QuiescePending => {
                    self.stats.pending_quiesce_stall_cycles += 1;
                    trace!("[tid:{}] fetch is waiting for a pending quiesce", tid);
                }
                ThreadStatus::IcacheWaitRetry => {
                    self.stats.icache_wait_retry_stall_cycles += 1;
                    trace!("[tid:{}] fetch is waiting for an I-cache retry", tid);
                }
                ThreadStatus::NoGoodAddr => {
                    trace!("[tid:{}] fetch predicted a non-executable address", tid);
                }
                other => {
                    trace!("[tid:{}] unexpected fetch stall reason ({:?})", tid, other);
                }
            }
        }
    }

    fn next_seq(&mut self) -> InstSeqNum {
        let seq = self.next_seq_num;
        self.next_seq_num += 1;
        seq
    }

    fn alloc_req_id(&mut self) -> ReqId {
        let id = ReqId(self.next_req_id);
        self.next_req_id += 1;
        id
    }

    // ------------------------------------------------------------------
    // Introspection, used by the harness and tests.
    // ------------------------------------------------------------------

    /// Current state of `tid`'s fetch state machine.
    pub fn thread_status(&self, tid: ThreadId) -> ThreadStatus {
        self.status[tid]
    }

    /// Current architectural PC of `tid`.
    pub fn thread_pc(&self, tid: ThreadId) -> &PcState {
        &self.pc[tid]
    }

    /// Repositions `tid`'s PC (used by harnesses between runs).
    pub fn set_thread_pc(&mut self, tid: ThreadId, pc: PcState) {
        self.pc[tid] = pc;
    }

    /// True while `tid` owns an outstanding demand request.
    pub fn has_demand_req(&self, tid: ThreadId) -> bool {
        self.mem_req[tid].is_some()
    }

    /// Number of decoded instructions waiting in `tid`'s fetch queue.
    pub fn fetch_queue_len(&self, tid: ThreadId) -> usize {
        self.fetch_queue[tid].len()
    }

    /// True while a rejected demand packet awaits a cache retry.
    pub fn is_cache_blocked(&self) -> bool {
        self.cache_blocked
    }

    /// Thread owning the retry packet, if any.
    pub fn retry_tid(&self) -> Option<ThreadId> {
        self.retry_tid
    }

    /// Number of prefetches currently in flight.
    pub fn outstanding_prefetches(&self) -> usize {
        self.outstanding_prefetches
    }

    /// Number of translations currently in flight.
    pub fn outstanding_translations(&self) -> usize {
        self.outstanding_translations
    }

    /// True while the stage reports itself active to the CPU.
    pub fn stage_active(&self) -> bool {
        self.stage_status == StageStatus::Active
    }

    /// True while an interrupt is latched.
    pub fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }
}
