//! Simulation harness around the fetch unit.
//!
//! The fetch unit is a library component; this module supplies the minimum
//! system to run it end to end:
//! 1. **Collaborator models:** timing I-cache, timing MMU, sequential BAC.
//! 2. **[`ActivityTracker`]:** a [`CpuHooks`] implementation counting
//!    notifications and bounding physical memory.
//! 3. **[`FetchSystem`]:** owns fetch plus collaborators, advances the time
//!    buffers, and delivers matured completions between ticks.

pub mod bac;
pub mod icache;
pub mod loader;
pub mod mmu;

pub use bac::SequentialBac;
pub use icache::{Memory, TimingIcache};
pub use mmu::SimMmu;

use crate::common::{InstSeqNum, ThreadId};
use crate::config::Config;
use crate::core::fetch::{Fetch, FetchIo};
use crate::core::ftq::Ftq;
use crate::core::hooks::CpuHooks;
use crate::core::inst::DynInst;
use crate::core::signals::{BacSignals, FetchInputs, FetchStruct, TimeStruct};
use crate::core::timebuf::TimeBuffer;
use crate::isa::{Decoder, SimpleDecoder};

/// Counting [`CpuHooks`] implementation.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    /// `wake_cpu` notifications received.
    pub wakeups: u64,
    /// `activity_this_cycle` notifications received.
    pub activity: u64,
    /// Stage activations.
    pub activations: u64,
    /// Stage deactivations.
    pub deactivations: u64,
    /// Instructions reported through the fetch probe.
    pub insts_fetched: u64,
    /// Fetch requests reported sent.
    pub requests_sent: u64,
    /// Demand accesses reported complete.
    pub accesses_complete: u64,
    /// Squash cleanups requested against the instruction list.
    pub removals: Vec<(ThreadId, Option<InstSeqNum>)>,
    /// Physical memory bounds for `is_mem_addr`, if bounded.
    pub mem_range: Option<(u64, u64)>,
}

impl CpuHooks for ActivityTracker {
    fn wake_cpu(&mut self) {
        self.wakeups += 1;
    }

    fn activity_this_cycle(&mut self) {
        self.activity += 1;
    }

    fn activate_stage(&mut self) {
        self.activations += 1;
    }

    fn deactivate_stage(&mut self) {
        self.deactivations += 1;
    }

    fn remove_insts_until(&mut self, seq: InstSeqNum, tid: ThreadId) {
        self.removals.push((tid, Some(seq)));
    }

    fn remove_insts_not_in_rob(&mut self, tid: ThreadId) {
        self.removals.push((tid, None));
    }

    fn inst_fetched(&mut self, _inst: &DynInst) {
        self.insts_fetched += 1;
    }

    fn fetch_request_sent(&mut self, _req: &crate::mem::request::FetchRequest) {
        self.requests_sent += 1;
    }

    fn inst_access_complete(&mut self, _pkt: &crate::mem::request::Packet) {
        self.accesses_complete += 1;
    }

    fn is_mem_addr(&self, paddr: u64) -> bool {
        match self.mem_range {
            Some((base, size)) => paddr >= base && paddr < base + size,
            None => true,
        }
    }
}

/// A complete, runnable fetch front-end: the unit plus collaborator models
/// and the timing plumbing between them.
pub struct FetchSystem {
    /// The fetch unit under simulation.
    pub fetch: Fetch,
    /// Fetch target queue shared with the BAC.
    pub ftq: Ftq,
    /// Timing I-cache model.
    pub icache: TimingIcache,
    /// Timing MMU model.
    pub mmu: SimMmu,
    /// Sequential BAC model.
    pub bac: SequentialBac,
    /// CPU notification tracker.
    pub cpu: ActivityTracker,
    /// Instructions the downstream decode stage has received.
    pub decoded: Vec<DynInst>,
    /// Resteer wire written by fetch during the last tick.
    pub bac_wire: BacSignals,

    time_buf: TimeBuffer<TimeStruct>,
    active_threads: Vec<ThreadId>,
    config: Config,
    now: u64,
}

impl FetchSystem {
    /// Builds the system from a configuration.
    pub fn new(config: Config) -> Self {
        let n = config.fetch.num_threads;
        let decoders: Vec<Box<dyn Decoder>> = (0..n)
            .map(|_| Box::new(SimpleDecoder::new()) as Box<dyn Decoder>)
            .collect();

        let mut fetch = Fetch::new(&config.fetch, decoders, config.general.start_pc);
        let ftq = Ftq::new(n, config.ftq.capacity, config.fetch.cache_blk_size);
        let icache = TimingIcache::new(
            &config.icache,
            config.fetch.cache_blk_size,
            Memory::new(config.general.mem_base, config.general.mem_size),
        );
        let mmu = SimMmu::new(config.mmu.latency);
        let bac = SequentialBac::new(
            n,
            config.general.start_pc,
            config.fetch.cache_blk_size,
            config.ftq.fill_depth,
        );
        let mut cpu = ActivityTracker {
            mem_range: Some((config.general.mem_base, config.general.mem_size as u64)),
            ..Default::default()
        };
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
            bac_wire: BacSignals::default(),
            time_buf: TimeBuffer::new(max_delay),
            active_threads: (0..n).collect(),
            config,
            now: 0,
        }
    }

    /// Loads a program image at `addr` into backing memory.
    pub fn load_image(&mut self, addr: u64, image: &[u8]) {
        self.icache.mem_mut().write(addr, image);
    }

    /// Loads instruction words at `addr` into backing memory.
    pub fn load_program(&mut self, addr: u64, words: &[u32]) {
        self.load_image(addr, &loader::words_to_bytes(words));
    }

    /// The signal slot written this cycle; lets callers inject squashes,
    /// stalls, and IEW counts that fetch will observe after the configured
    /// delay.
    pub fn signals_in(&mut self) -> &mut TimeStruct {
        self.time_buf.write()
    }

    /// Runs one tick of the front-end.
    pub fn tick(&mut self) {
        self.now += 1;

        // Advance the signal buffer first: anything written through
        // `signals_in` after the previous tick becomes visible now, one
        // cycle later.
        self.time_buf.advance();

        // The BAC stage runs ahead of fetch, keeping the FTQ filled.
        if self.config.fetch.decoupled_front_end {
            for tid in 0..self.config.fetch.num_threads {
                self.bac.fill(&mut self.ftq, tid);
            }
        }

        // Deliver completions that matured since the last tick.
        let translations = self.mmu.advance(self.now);
        let (responses, retry) = self.icache.advance(self.now);

        let mut to_decode = FetchStruct::default();
        self.bac_wire = BacSignals::default();

        {
            let mut io = FetchIo {
                mmu: &mut self.mmu,
                icache: &mut self.icache,
                bac: &mut self.bac,
                ftq: &mut self.ftq,
                cpu: &mut self.cpu,
                active_threads: &self.active_threads,
            };

            for done in translations {
                self.fetch.finish_translation(done.fault, done.req, &mut io);
            }
            for pkt in responses {
                self.fetch.process_cache_completion(pkt, &mut io);
            }
            if retry {
                self.fetch.recv_req_retry(&mut io);
            }

            let inputs = FetchInputs {
                from_decode: self.time_buf.read(self.config.fetch.decode_to_fetch_delay),
                from_rename: self.time_buf.read(self.config.fetch.rename_to_fetch_delay),
                from_iew: self.time_buf.read(self.config.fetch.iew_to_fetch_delay),
                from_commit: self.time_buf.read(self.config.fetch.commit_to_fetch_delay),
            };

            self.fetch
                .tick(&inputs, &mut io, &mut to_decode, &mut self.bac_wire);
        }

        // React to resteer requests on the BAC wire.
        for tid in 0..self.config.fetch.num_threads {
            let info = &self.bac_wire.fetch_info[tid];
            if info.squash {
                let pc = info
                    .next_pc
                    .as_ref()
                    .expect("resteer without a PC")
                    .inst_addr();
                self.bac.resteer(tid, pc);
            }
        }

        self.decoded.extend(to_decode.insts);
    }

    /// Runs `ticks` cycles.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Current simulated tick.
    pub fn now(&self) -> u64 {
        self.now
    }
}
