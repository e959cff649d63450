//! Configuration system for the fetch model.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the simulator. It provides:
//! 1. **Defaults:** Baseline hardware constants (widths, buffer sizes, delays).
//! 2. **Structures:** Hierarchical config for general, fetch, I-cache, MMU, and FTQ.
//! 3. **Enums:** The SMT fetch policy selector.
//!
//! Configuration is supplied as JSON (see the CLI) or via `Config::default()`.
//! Structural limits that the original hardware description bakes in at
//! compile time are validated in [`FetchConfig::validate`]; violating them
//! aborts the process, as there is no meaningful way to continue.

use serde::Deserialize;

/// Maximum number of hardware threads the model supports.
pub const MAX_THREADS: usize = 4;

/// Maximum fetch width (instructions per cycle) the model supports.
pub const MAX_WIDTH: usize = 12;

/// Default configuration constants.
mod defaults {
    /// Default number of hardware threads.
    pub const NUM_THREADS: usize = 1;

    /// Default number of threads fetched per cycle.
    pub const NUM_FETCHING_THREADS: usize = 1;

    /// Default fetch width (micro-ops per cycle).
    pub const FETCH_WIDTH: usize = 4;

    /// Default decode width (micro-ops forwarded per cycle).
    pub const DECODE_WIDTH: usize = 4;

    /// Default fetch buffer size in bytes.
    ///
    /// Must divide the cache block size; the buffer holds the slice of the
    /// block that demand fetch last returned.
    pub const FETCH_BUFFER_SIZE: usize = 16;

    /// Default fetch queue depth (decoded micro-ops awaiting decode).
    pub const FETCH_QUEUE_SIZE: usize = 8;

    /// Default cache block size in bytes.
    pub const CACHE_BLK_SIZE: usize = 64;

    /// Default ceiling on in-flight instruction prefetches.
    pub const MAX_OUTSTANDING_PREFETCHES: usize = 4;

    /// Default ceiling on in-flight instruction translations.
    pub const MAX_OUTSTANDING_TRANSLATIONS: usize = 4;

    /// Default signal delays, in cycles, from each downstream stage.
    pub const DECODE_TO_FETCH_DELAY: usize = 1;
    pub const RENAME_TO_FETCH_DELAY: usize = 1;
    pub const IEW_TO_FETCH_DELAY: usize = 1;
    pub const COMMIT_TO_FETCH_DELAY: usize = 1;

    /// Default seed for the decode-forwarding thread selector.
    pub const RNG_SEED: u64 = 0x2545_f491_4f6c_dd1d;

    /// Default initial program counter.
    pub const START_PC: u64 = 0x1000;

    /// Default physical memory base and size for the simulated system.
    pub const MEM_BASE: u64 = 0x0;
    pub const MEM_SIZE: usize = 16 * 1024 * 1024;

    /// Default I-cache timing model parameters.
    pub const ICACHE_HIT_LATENCY: u64 = 1;
    pub const ICACHE_MISS_LATENCY: u64 = 20;
    pub const ICACHE_MSHRS: usize = 4;

    /// Default MMU timing model latency (0 completes synchronously).
    pub const MMU_LATENCY: u64 = 1;

    /// Default fetch target queue capacity.
    pub const FTQ_CAPACITY: usize = 16;

    /// Default number of fetch targets the BAC model keeps queued.
    pub const FTQ_FILL_DEPTH: usize = 8;
}

/// SMT fetch arbitration policy.
///
/// Selects which hardware thread fetches each sub-cycle. All policies skip
/// threads that are not in a fetchable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SmtFetchPolicy {
    /// Rotate through threads in priority order.
    #[default]
    RoundRobin,
    /// Prefer the thread with the fewest instructions in the IQ.
    #[serde(alias = "IQ")]
    IQCount,
    /// Prefer the thread with the fewest instructions in the LSQ.
    #[serde(alias = "LSQ")]
    LSQCount,
    /// Prefer the thread with the fewest outstanding branches. Unimplemented.
    Branch,
}

/// Root configuration structure.
///
/// # Examples
///
/// ```
/// use fetchsim::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.fetch.fetch_width, 4);
/// assert!(!config.fetch.decoupled_front_end);
///
/// let json = r#"{
///     "general": { "start_pc": 4096 },
///     "fetch": { "fetch_width": 8, "decoupled_front_end": true },
///     "icache": { "miss_latency": 40 }
/// }"#;
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.fetch.fetch_width, 8);
/// assert_eq!(config.icache.miss_latency, 40);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// General simulation settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Fetch unit parameters.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// I-cache timing model parameters.
    #[serde(default)]
    pub icache: IcacheConfig,
    /// MMU timing model parameters.
    #[serde(default)]
    pub mmu: MmuConfig,
    /// Fetch target queue parameters.
    #[serde(default)]
    pub ftq: FtqConfig,
}

/// General simulation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// Initial program counter for every thread.
    #[serde(default = "GeneralConfig::default_start_pc")]
    pub start_pc: u64,

    /// Base of simulated physical memory.
    #[serde(default = "GeneralConfig::default_mem_base")]
    pub mem_base: u64,

    /// Size of simulated physical memory in bytes.
    ///
    /// Translations landing outside `[mem_base, mem_base + mem_size)` park
    /// the thread in the bad-address state until a squash redirects it.
    #[serde(default = "GeneralConfig::default_mem_size")]
    pub mem_size: usize,
}

impl GeneralConfig {
    fn default_start_pc() -> u64 {
        defaults::START_PC
    }

    fn default_mem_base() -> u64 {
        defaults::MEM_BASE
    }

    fn default_mem_size() -> usize {
        defaults::MEM_SIZE
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            start_pc: defaults::START_PC,
            mem_base: defaults::MEM_BASE,
            mem_size: defaults::MEM_SIZE,
        }
    }
}

/// Fetch unit parameters.
///
/// Covers the SMT policy, per-cycle bandwidth limits, buffer geometry,
/// signal delays and the decoupled front-end switch.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Number of hardware threads (at most [`MAX_THREADS`]).
    #[serde(default = "FetchConfig::default_num_threads")]
    pub num_threads: usize,

    /// Number of threads that may fetch in a single cycle.
    #[serde(default = "FetchConfig::default_num_fetching_threads")]
    pub smt_num_fetching_threads: usize,

    /// SMT fetch arbitration policy.
    #[serde(default)]
    pub smt_fetch_policy: SmtFetchPolicy,

    /// Micro-ops fetched per cycle across all threads (at most [`MAX_WIDTH`]).
    #[serde(default = "FetchConfig::default_fetch_width")]
    pub fetch_width: usize,

    /// Micro-ops forwarded to decode per cycle.
    #[serde(default = "FetchConfig::default_decode_width")]
    pub decode_width: usize,

    /// Fetch buffer size in bytes; must divide the cache block size.
    #[serde(default = "FetchConfig::default_fetch_buffer_size")]
    pub fetch_buffer_size: usize,

    /// Per-thread fetch queue depth.
    #[serde(default = "FetchConfig::default_fetch_queue_size")]
    pub fetch_queue_size: usize,

    /// Cache block size in bytes.
    #[serde(default = "FetchConfig::default_cache_blk_size")]
    pub cache_blk_size: usize,

    /// Enable the decoupled front-end (BAC-filled FTQ plus prefetching).
    #[serde(default)]
    pub decoupled_front_end: bool,

    /// Ceiling on in-flight instruction prefetches.
    #[serde(default = "FetchConfig::default_max_outstanding_prefetches")]
    pub max_outstanding_prefetches: usize,

    /// Ceiling on in-flight instruction translations.
    #[serde(default = "FetchConfig::default_max_outstanding_translations")]
    pub max_outstanding_translations: usize,

    /// Cycles of delay on the decode-to-fetch signal path.
    #[serde(default = "FetchConfig::default_decode_to_fetch_delay")]
    pub decode_to_fetch_delay: usize,

    /// Cycles of delay on the rename-to-fetch signal path.
    #[serde(default = "FetchConfig::default_rename_to_fetch_delay")]
    pub rename_to_fetch_delay: usize,

    /// Cycles of delay on the IEW-to-fetch signal path.
    #[serde(default = "FetchConfig::default_iew_to_fetch_delay")]
    pub iew_to_fetch_delay: usize,

    /// Cycles of delay on the commit-to-fetch signal path.
    #[serde(default = "FetchConfig::default_commit_to_fetch_delay")]
    pub commit_to_fetch_delay: usize,

    /// Full-system mode: latch interrupt signals from commit.
    #[serde(default)]
    pub full_system: bool,

    /// Seed for the decode-forwarding thread selector.
    #[serde(default = "FetchConfig::default_rng_seed")]
    pub rng_seed: u64,
}

impl FetchConfig {
    fn default_num_threads() -> usize {
        defaults::NUM_THREADS
    }

    fn default_num_fetching_threads() -> usize {
        defaults::NUM_FETCHING_THREADS
    }

    fn default_fetch_width() -> usize {
        defaults::FETCH_WIDTH
    }

    fn default_decode_width() -> usize {
        defaults::DECODE_WIDTH
    }

    fn default_fetch_buffer_size() -> usize {
        defaults::FETCH_BUFFER_SIZE
    }

    fn default_fetch_queue_size() -> usize {
        defaults::FETCH_QUEUE_SIZE
    }

    fn default_cache_blk_size() -> usize {
        defaults::CACHE_BLK_SIZE
    }

    fn default_max_outstanding_prefetches() -> usize {
        defaults::MAX_OUTSTANDING_PREFETCHES
    }

    fn default_max_outstanding_translations() -> usize {
        defaults::MAX_OUTSTANDING_TRANSLATIONS
    }

    fn default_decode_to_fetch_delay() -> usize {
        defaults::DECODE_TO_FETCH_DELAY
    }

    fn default_rename_to_fetch_delay() -> usize {
        defaults::RENAME_TO_FETCH_DELAY
    }

    fn default_iew_to_fetch_delay() -> usize {
        defaults::IEW_TO_FETCH_DELAY
    }

    fn default_commit_to_fetch_delay() -> usize {
        defaults::COMMIT_TO_FETCH_DELAY
    }

    fn default_rng_seed() -> u64 {
        defaults::RNG_SEED
    }

    /// Validates the structural limits.
    ///
    /// # Panics
    ///
    /// Panics when `num_threads` exceeds [`MAX_THREADS`], `fetch_width`
    /// exceeds [`MAX_WIDTH`], the fetch buffer is larger than a cache block,
    /// or the cache block size is not a multiple of the fetch buffer size.
    pub fn validate(&self) {
        if self.num_threads > MAX_THREADS {
            panic!(
                "num_threads ({}) is larger than compiled limit ({})",
                self.num_threads, MAX_THREADS
            );
        }
        if self.fetch_width > MAX_WIDTH {
            panic!(
                "fetch_width ({}) is larger than compiled limit ({})",
                self.fetch_width, MAX_WIDTH
            );
        }
        if self.fetch_buffer_size > self.cache_blk_size {
            panic!(
                "fetch buffer size ({} bytes) is greater than the cache block size ({} bytes)",
                self.fetch_buffer_size, self.cache_blk_size
            );
        }
        if self.cache_blk_size % self.fetch_buffer_size != 0 {
            panic!(
                "cache block ({} bytes) is not a multiple of the fetch buffer ({} bytes)",
                self.cache_blk_size, self.fetch_buffer_size
            );
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            num_threads: defaults::NUM_THREADS,
            smt_num_fetching_threads: defaults::NUM_FETCHING_THREADS,
            smt_fetch_policy: SmtFetchPolicy::default(),
            fetch_width: defaults::FETCH_WIDTH,
            decode_width: defaults::DECODE_WIDTH,
            fetch_buffer_size: defaults::FETCH_BUFFER_SIZE,
            fetch_queue_size: defaults::FETCH_QUEUE_SIZE,
            cache_blk_size: defaults::CACHE_BLK_SIZE,
            decoupled_front_end: false,
            max_outstanding_prefetches: defaults::MAX_OUTSTANDING_PREFETCHES,
            max_outstanding_translations: defaults::MAX_OUTSTANDING_TRANSLATIONS,
            decode_to_fetch_delay: defaults::DECODE_TO_FETCH_DELAY,
            rename_to_fetch_delay: defaults::RENAME_TO_FETCH_DELAY,
            iew_to_fetch_delay: defaults::IEW_TO_FETCH_DELAY,
            commit_to_fetch_delay: defaults::COMMIT_TO_FETCH_DELAY,
            full_system: false,
            rng_seed: defaults::RNG_SEED,
        }
    }
}

/// I-cache timing model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct IcacheConfig {
    /// Response latency in cycles when the block is resident.
    #[serde(default = "IcacheConfig::default_hit_latency")]
    pub hit_latency: u64,

    /// Response latency in cycles when the block must be filled.
    #[serde(default = "IcacheConfig::default_miss_latency")]
    pub miss_latency: u64,

    /// Number of miss status handling registers; requests beyond this are
    /// rejected with back-pressure.
    #[serde(default = "IcacheConfig::default_mshrs")]
    pub mshrs: usize,
}

impl IcacheConfig {
    fn default_hit_latency() -> u64 {
        defaults::ICACHE_HIT_LATENCY
    }

    fn default_miss_latency() -> u64 {
        defaults::ICACHE_MISS_LATENCY
    }

    fn default_mshrs() -> usize {
        defaults::ICACHE_MSHRS
    }
}

impl Default for IcacheConfig {
    fn default() -> Self {
        Self {
            hit_latency: defaults::ICACHE_HIT_LATENCY,
            miss_latency: defaults::ICACHE_MISS_LATENCY,
            mshrs: defaults::ICACHE_MSHRS,
        }
    }
}

/// MMU timing model parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct MmuConfig {
    /// Translation latency in cycles. Zero completes synchronously inside
    /// the issuing call.
    #[serde(default = "MmuConfig::default_latency")]
    pub latency: u64,
}

impl MmuConfig {
    fn default_latency() -> u64 {
        defaults::MMU_LATENCY
    }
}

impl Default for MmuConfig {
    fn default() -> Self {
        Self {
            latency: defaults::MMU_LATENCY,
        }
    }
}

/// Fetch target queue parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct FtqConfig {
    /// Maximum number of fetch targets queued per thread.
    #[serde(default = "FtqConfig::default_capacity")]
    pub capacity: usize,

    /// Number of fetch targets the BAC model keeps queued ahead of fetch.
    #[serde(default = "FtqConfig::default_fill_depth")]
    pub fill_depth: usize,
}

impl FtqConfig {
    fn default_capacity() -> usize {
        defaults::FTQ_CAPACITY
    }

    fn default_fill_depth() -> usize {
        defaults::FTQ_FILL_DEPTH
    }
}

impl Default for FtqConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::FTQ_CAPACITY,
            fill_depth: defaults::FTQ_FILL_DEPTH,
        }
    }
}
