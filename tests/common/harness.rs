//! Test harness for driving the fetch unit cycle by cycle.
//!
//! Owns the unit plus scriptable collaborators and exposes helpers for
//! injecting downstream signals and delivering completions at exactly the
//! tick a test wants them.

use fetchsim::common::{InstSeqNum, ThreadId};
use fetchsim::config::Config;
use fetchsim::core::fetch::{Fetch, FetchIo};
use fetchsim::core::ftq::Ftq;
use fetchsim::core::inst::DynInst;
use fetchsim::core::signals::{BacSignals, FetchInputs, FetchStruct, SquashedInst, TimeStruct};
use fetchsim::core::timebuf::TimeBuffer;
use fetchsim::isa::{Decoder, PcState, SimpleDecoder};
use fetchsim::sim::{loader, ActivityTracker, SequentialBac};

use crate::common::mocks::icache::MockIcache;
use crate::common::mocks::mmu::MockMmu;

pub struct TestContext {
    pub config: Config,
    pub fetch: Fetch,
    pub ftq: Ftq,
    pub icache: MockIcache,
    pub mmu: MockMmu,
    pub bac: SequentialBac,
    pub cpu: ActivityTracker,
    /// Everything forwarded to decode so far.
    pub decoded: Vec<DynInst>,
    /// Instructions forwarded during the most recent tick.
    pub last_forwarded: usize,
    /// BAC wire written during the most recent tick.
    pub last_bac_wire: BacSignals,
    time_buf: TimeBuffer<TimeStruct>,
    active: Vec<ThreadId>,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Default configuration: one thread, decoupled front-end off.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Default configuration with the decoupled front-end enabled.
    pub fn dfe() -> Self {
        let mut config = Config::default();
        config.fetch.decoupled_front_end = true;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let n = config.fetch.num_threads;
        let decoders: Vec<Box<dyn Decoder>> = (0..n)
            .map(|_| Box::new(SimpleDecoder::new()) as Box<dyn Decoder>)
            .collect();

        let mut fetch = Fetch::new(&config.fetch, decoders, config.general.start_pc);
        let ftq = Ftq::new(n, config.ftq.capacity, config.fetch.cache_blk_size);
        let icache = MockIcache::new(config.general.mem_size);
        let mmu = MockMmu::new();
        let bac = SequentialBac::new(
            n,
            config.general.start_pc,
            config.fetch.cache_blk_size,
            config.ftq.fill_depth,
        );
        let mut cpu = ActivityTracker::default();
        fetch.startup(&mut cpu);

        let max_delay = config
            .fetch
            .decode_to_fetch_delay
            .max(config.fetch.rename_to_fetch_delay)
            .max(config.fetch.iew_to_fetch_delay)
            .max(config.fetch.commit_to_fetch_delay);

        Self {
            fetch,
            ftq,
            icache,
            mmu,
            bac,
            cpu,
            decoded: Vec::new(),
            last_forwarded: 0,
            last_bac_wire: BacSignals::default(),
            time_buf: TimeBuffer::new(max_delay),
            active: (0..n).collect(),
            config,
        }
    }

    /// Loads instruction words at `addr` into the I-cache backing memory.
    /// Note the mock fills packets by *physical* address.
    pub fn load_program(&mut self, addr: u64, words: &[u32]) {
        self.icache.mem.write(addr, &loader::words_to_bytes(words));
    }

    /// Restricts the set of active threads.
    pub fn set_active(&mut self, threads: Vec<ThreadId>) {
        self.active = threads;
    }

    /// Runs one fetch tick.
    ///
    /// The time buffer advances first, so a signal injected between ticks
    /// is observed by this tick after the configured one-cycle delay.
    pub fn tick(&mut self) {
        self.time_buf.advance();

        if self.config.fetch.decoupled_front_end {
            for tid in 0..self.config.fetch.num_threads {
                self.bac.fill(&mut self.ftq, tid);
            }
        }

        let mut to_decode = FetchStruct::default();
        self.last_bac_wire = BacSignals::default();

        {
            let mut io = FetchIo {
                mmu: &mut self.mmu,
                icache: &mut self.icache,
                bac: &mut self.bac,
                ftq: &mut self.ftq,
                cpu: &mut self.cpu,
                active_threads: &self.active,
            };
            let inputs = FetchInputs {
                from_decode: self.time_buf.read(self.config.fetch.decode_to_fetch_delay),
                from_rename: self.time_buf.read(self.config.fetch.rename_to_fetch_delay),
                from_iew: self.time_buf.read(self.config.fetch.iew_to_fetch_delay),
                from_commit: self.time_buf.read(self.config.fetch.commit_to_fetch_delay),
            };
            self.fetch
                .tick(&inputs, &mut io, &mut to_decode, &mut self.last_bac_wire);
        }

        for tid in 0..self.config.fetch.num_threads {
            let info = &self.last_bac_wire.fetch_info[tid];
            if info.squash {
                let pc = info.next_pc.as_ref().unwrap().inst_addr();
                self.bac.resteer(tid, pc);
            }
        }

        self.last_forwarded = to_decode.size();
        self.decoded.extend(to_decode.insts);
    }

    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Completes the oldest pending translation and delivers it to fetch.
    pub fn deliver_translation(&mut self) {
        let done = self.mmu.pop_completion();
        let mut io = FetchIo {
            mmu: &mut self.mmu,
            icache: &mut self.icache,
            bac: &mut self.bac,
            ftq: &mut self.ftq,
            cpu: &mut self.cpu,
            active_threads: &self.active,
        };
        self.fetch.finish_translation(done.fault, done.req, &mut io);
    }

    /// Releases the oldest in-flight packet back to fetch with the given
    /// access depth (0 = first-level hit).
    pub fn deliver_response(&mut self, access_depth: u32) {
        let mut pkt = self.icache.pop_sent();
        pkt.access_depth = access_depth;
        self.deliver_response_pkt(pkt);
    }

    /// Delivers a specific packet (popped from `icache.sent` by the test)
    /// back to fetch.
    pub fn deliver_response_pkt(&mut self, pkt: fetchsim::mem::request::Packet) {
        let mut io = FetchIo {
            mmu: &mut self.mmu,
            icache: &mut self.icache,
            bac: &mut self.bac,
            ftq: &mut self.ftq,
            cpu: &mut self.cpu,
            active_threads: &self.active,
        };
        self.fetch.process_cache_completion(pkt, &mut io);
    }

    /// Signals a cache retry to fetch.
    pub fn deliver_retry(&mut self) {
        let mut io = FetchIo {
            mmu: &mut self.mmu,
            icache: &mut self.icache,
            bac: &mut self.bac,
            ftq: &mut self.ftq,
            cpu: &mut self.cpu,
            active_threads: &self.active,
        };
        self.fetch.recv_req_retry(&mut io);
    }

    /// Injects a commit squash; fetch observes it after the configured
    /// commit-to-fetch delay.
    pub fn signal_commit_squash(&mut self, tid: ThreadId, pc: u64) {
        let slot = &mut self.time_buf.write().commit[tid];
        slot.squash = true;
        slot.pc = Some(PcState::new(pc));
    }

    /// As [`TestContext::signal_commit_squash`] but carrying the squashing
    /// instruction's summary.
    pub fn signal_commit_squash_inst(&mut self, tid: ThreadId, pc: u64, inst: SquashedInst) {
        let slot = &mut self.time_buf.write().commit[tid];
        slot.squash = true;
        slot.pc = Some(PcState::new(pc));
        slot.squash_inst = Some(inst);
    }

    /// Injects a decode squash.
    pub fn signal_decode_squash(&mut self, tid: ThreadId, pc: u64, seq: InstSeqNum) {
        let slot = &mut self.time_buf.write().decode[tid];
        slot.squash = true;
        slot.next_pc = Some(PcState::new(pc));
        slot.done_seq_num = seq;
    }

    /// Injects a decode block/unblock signal.
    pub fn signal_decode_block(&mut self, tid: ThreadId) {
        self.time_buf.write().decode[tid].block = true;
    }

    pub fn signal_decode_unblock(&mut self, tid: ThreadId) {
        self.time_buf.write().decode[tid].unblock = true;
    }

    /// Injects IEW occupancy counts for the count-based fetch policies.
    pub fn signal_iew_counts(&mut self, tid: ThreadId, iq: usize, ldstq: usize) {
        let slot = &mut self.time_buf.write().iew[tid];
        slot.iq_count = iq;
        slot.ldstq_count = ldstq;
    }

    /// Injects the commit interrupt signals (full-system mode).
    pub fn signal_interrupt(&mut self, pending: bool, clear: bool) {
        let slot = &mut self.time_buf.write().commit[0];
        slot.interrupt_pending = pending;
        slot.clear_interrupt = clear;
    }
}
