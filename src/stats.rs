//! Fetch statistics collection and reporting.
//!
//! This module tracks performance metrics for the fetch unit. It provides:
//! 1. **Cycle accounting:** Active, squashing, idle, and per-reason stall cycles.
//! 2. **Throughput:** Per-cycle fetched instruction distribution and cache lines.
//! 3. **Decoupled front-end:** Fetch target lifecycle and prefetch effectiveness.
//! 4. **Latency:** log2-bucketed access and translation latency distributions.
//!
//! Derived metrics (idle rate, prefetch accuracy and coverage) are computed
//! at reporting time from the underlying counters.

/// Returns `floor(log2(x))` for `x > 0`.
#[inline]
pub fn floor_log2(x: u64) -> u64 {
    debug_assert!(x > 0);
    63 - x.leading_zeros() as u64
}

/// A bounded distribution with unit-sized buckets, in the style of a pdf
/// statistic.
///
/// Samples below the base are clamped into the first bucket, samples above
/// the last value into the last bucket.
#[derive(Clone, Debug)]
pub struct Distribution {
    base: u64,
    buckets: Vec<u64>,
    samples: u64,
}

impl Distribution {
    /// Creates a distribution covering `base..=last` with bucket size 1.
    pub fn new(base: u64, last: u64) -> Self {
        assert!(last >= base);
        Self {
            base,
            buckets: vec![0; (last - base + 1) as usize],
            samples: 0,
        }
    }

    /// Records one sample.
    pub fn sample(&mut self, value: u64) {
        let idx = value.saturating_sub(self.base).min(self.buckets.len() as u64 - 1);
        self.buckets[idx as usize] += 1;
        self.samples += 1;
    }

    /// Total number of samples recorded.
    #[inline]
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Count recorded for `value`'s bucket.
    pub fn count(&self, value: u64) -> u64 {
        let idx = value.saturating_sub(self.base).min(self.buckets.len() as u64 - 1);
        self.buckets[idx as usize]
    }

    /// Prints the non-empty buckets as `name::<value>  count (pct)` rows.
    fn print(&self, name: &str) {
        for (i, &count) in self.buckets.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let pct = 100.0 * count as f64 / self.samples.max(1) as f64;
            println!(
                "  {}::{:<4} {:<12} ({:.2}%)",
                name,
                self.base + i as u64,
                count,
                pct
            );
        }
    }
}

/// Per-thread fetch statistics.
#[derive(Clone, Debug, Default)]
pub struct ThreadFetchStats {
    /// Cycles this thread spent waiting on a demand I-cache response.
    pub icache_stall_cycles: u64,
    /// Architectural instructions fetched for this thread.
    pub num_insts: u64,
    /// Control instructions fetched for this thread.
    pub num_branches: u64,
}

/// Statistics group for the fetch stage.
#[derive(Clone, Debug)]
pub struct FetchStats {
    /// Total ticks the stage has been clocked (idle rate denominator).
    pub ticks: u64,

    /// Number of branches that fetch has predicted taken.
    pub predicted_branches: u64,
    /// Number of cycles fetch has run and was not squashing or blocked.
    pub cycles: u64,
    /// Number of cycles fetch has spent squashing.
    pub squash_cycles: u64,
    /// Number of cycles fetch has spent waiting for the TLB.
    pub tlb_cycles: u64,
    /// Number of cycles fetch has spent waiting for the FTQ to fill.
    pub ftq_stall_cycles: u64,
    /// Number of cycles fetch was idle.
    pub idle_cycles: u64,
    /// Number of cycles fetch has spent blocked.
    pub blocked_cycles: u64,
    /// Number of cycles fetch has spent waiting on interrupts, bad
    /// addresses, or a blocked cache.
    pub misc_stall_cycles: u64,
    /// Number of cycles fetch has spent waiting on pipes to drain.
    pub pending_drain_cycles: u64,
    /// Number of stall cycles with no active thread to fetch from.
    pub no_active_thread_stall_cycles: u64,
    /// Number of stall cycles due to pending traps.
    pub pending_trap_stall_cycles: u64,
    /// Number of stall cycles due to pending quiesce instructions.
    pub pending_quiesce_stall_cycles: u64,
    /// Number of stall cycles spent waiting for an I-cache retry.
    pub icache_wait_retry_stall_cycles: u64,
    /// Number of cache lines fetched.
    pub cache_lines: u64,
    /// Number of outstanding I-cache accesses that were squashed.
    pub icache_squashes: u64,
    /// Number of outstanding ITLB accesses that were squashed.
    pub tlb_squashes: u64,

    /// Distribution of instructions fetched each cycle.
    pub nisn_dist: Distribution,
    /// Demand instruction access latency, in log2(cycles).
    pub instr_access_latency: Distribution,
    /// Translation latency, in log2(cycles).
    pub translation_latency: Distribution,
    /// Number of memory requests in flight (demand + prefetch) at issue.
    pub mem_req_in_flight: Distribution,

    /// Times the head fetch target was ready to fetch.
    pub ft_ready_to_fetch: u64,
    /// Times the head fetch target had an outstanding prefetch.
    pub ft_prefetch_in_progress: u64,
    /// Times the head fetch target had an outstanding translation.
    pub ft_translation_in_progress: u64,
    /// Times the head fetch target's translation was ready.
    pub ft_translation_ready: u64,
    /// Times the head fetch target's translation had failed.
    pub ft_translation_failed: u64,
    /// Times an instruction crossed a fetch target boundary.
    pub ft_cross_cache_block: u64,
    /// Times a crossing instruction's block was not the next fetch target.
    pub ft_cross_cache_block_not_next: u64,

    /// Demand fetches that hit in the I-cache.
    pub demand_hit: u64,
    /// Demand fetches that missed in the I-cache.
    pub demand_miss: u64,
    /// Prefetches sent to the cache.
    pub pf_issued: u64,
    /// Prefetches received before fetch needed them.
    pub pf_received: u64,
    /// Prefetches that were late and blocked fetch.
    pub pf_late: u64,
    /// Prefetches that were already in the cache.
    pub pf_in_cache: u64,
    /// Prefetch packets dropped due to squashes.
    pub pf_squashed: u64,
    /// Prefetches not issued because too many were outstanding.
    pub pf_limit_reached: u64,
    /// Translations not issued because too many were outstanding.
    pub pf_translation_limit_reached: u64,

    /// Per-thread fetch statistics.
    pub thread: Vec<ThreadFetchStats>,
}

/// Section names for selective stats output.
///
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "stalls", "targets", "prefetch", "latency"];

impl FetchStats {
    /// Creates a stats group sized for the given fetch width and thread count.
    pub fn new(fetch_width: usize, num_threads: usize) -> Self {
        Self {
            ticks: 0,
            predicted_branches: 0,
            cycles: 0,
            squash_cycles: 0,
            tlb_cycles: 0,
            ftq_stall_cycles: 0,
            idle_cycles: 0,
            blocked_cycles: 0,
            misc_stall_cycles: 0,
            pending_drain_cycles: 0,
            no_active_thread_stall_cycles: 0,
            pending_trap_stall_cycles: 0,
            pending_quiesce_stall_cycles: 0,
            icache_wait_retry_stall_cycles: 0,
            cache_lines: 0,
            icache_squashes: 0,
            tlb_squashes: 0,
            nisn_dist: Distribution::new(0, fetch_width as u64),
            instr_access_latency: Distribution::new(0, 10),
            translation_latency: Distribution::new(0, 10),
            mem_req_in_flight: Distribution::new(0, 10),
            ft_ready_to_fetch: 0,
            ft_prefetch_in_progress: 0,
            ft_translation_in_progress: 0,
            ft_translation_ready: 0,
            ft_translation_failed: 0,
            ft_cross_cache_block: 0,
            ft_cross_cache_block_not_next: 0,
            demand_hit: 0,
            demand_miss: 0,
            pf_issued: 0,
            pf_received: 0,
            pf_late: 0,
            pf_in_cache: 0,
            pf_squashed: 0,
            pf_limit_reached: 0,
            pf_translation_limit_reached: 0,
            thread: vec![ThreadFetchStats::default(); num_threads],
        }
    }

    /// Records a latency sample into a log2-bucketed distribution.
    pub fn sample_latency(dist: &mut Distribution, latency: u64) {
        dist.sample(if latency > 0 { floor_log2(latency) } else { 0 });
    }

    /// Ratio of cycles fetch was idle.
    pub fn idle_rate(&self) -> f64 {
        self.idle_cycles as f64 / self.ticks.max(1) as f64
    }

    /// Fraction of issued prefetches that were not squashed.
    pub fn pf_accuracy(&self) -> f64 {
        if self.pf_issued == 0 {
            return 0.0;
        }
        (self.pf_issued - self.pf_squashed) as f64 / self.pf_issued as f64
    }

    /// Fraction of demand fetches that hit in the I-cache.
    pub fn pf_coverage(&self) -> f64 {
        let total = self.demand_hit + self.demand_miss;
        if total == 0 {
            return 0.0;
        }
        self.demand_hit as f64 / total as f64
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// Each element of `sections` should be one of [`STATS_SECTIONS`]; an
    /// empty slice prints everything.
    pub fn print_sections(&self, sections: &[String]) {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let total_insts: u64 = self.thread.iter().map(|t| t.num_insts).sum();
        let total_branches: u64 = self.thread.iter().map(|t| t.num_branches).sum();

        println!("\n==========================================================");
        println!("FETCH UNIT STATISTICS");
        println!("==========================================================");
        if want("summary") {
            println!("fetch.ticks              {}", self.ticks);
            println!("fetch.cycles             {}", self.cycles);
            println!("fetch.insts              {}", total_insts);
            println!("fetch.branches           {}", total_branches);
            println!("fetch.predictedBranches  {}", self.predicted_branches);
            println!("fetch.cacheLines         {}", self.cache_lines);
            println!("fetch.idleRate           {:.4}", self.idle_rate());
            self.nisn_dist.print("fetch.nisnDist");
            println!("----------------------------------------------------------");
        }
        if want("stalls") {
            println!("STALL BREAKDOWN");
            println!("  squashCycles           {}", self.squash_cycles);
            println!("  tlbCycles              {}", self.tlb_cycles);
            println!("  ftqStallCycles         {}", self.ftq_stall_cycles);
            println!("  idleCycles             {}", self.idle_cycles);
            println!("  blockedCycles          {}", self.blocked_cycles);
            println!("  miscStallCycles        {}", self.misc_stall_cycles);
            println!("  pendingDrainCycles     {}", self.pending_drain_cycles);
            println!(
                "  noActiveThreadCycles   {}",
                self.no_active_thread_stall_cycles
            );
            println!("  pendingTrapCycles      {}", self.pending_trap_stall_cycles);
            println!(
                "  pendingQuiesceCycles   {}",
                self.pending_quiesce_stall_cycles
            );
            println!(
                "  icacheWaitRetryCycles  {}",
                self.icache_wait_retry_stall_cycles
            );
            println!("  icacheSquashes         {}", self.icache_squashes);
            println!("  tlbSquashes            {}", self.tlb_squashes);
            println!("----------------------------------------------------------");
        }
        if want("targets") {
            println!("FETCH TARGETS");
            println!("  readyToFetch           {}", self.ft_ready_to_fetch);
            println!("  prefetchInProgress     {}", self.ft_prefetch_in_progress);
            println!(
                "  translationInProgress  {}",
                self.ft_translation_in_progress
            );
            println!("  translationReady       {}", self.ft_translation_ready);
            println!("  translationFailed      {}", self.ft_translation_failed);
            println!("  crossCacheBlock        {}", self.ft_cross_cache_block);
            println!(
                "  crossCacheBlockNotNext {}",
                self.ft_cross_cache_block_not_next
            );
            println!("----------------------------------------------------------");
        }
        if want("prefetch") {
            println!("PREFETCH");
            println!("  demandHit              {}", self.demand_hit);
            println!("  demandMiss             {}", self.demand_miss);
            println!("  pfIssued               {}", self.pf_issued);
            println!("  pfReceived             {}", self.pf_received);
            println!("  pfLate                 {}", self.pf_late);
            println!("  pfInCache              {}", self.pf_in_cache);
            println!("  pfSquashed             {}", self.pf_squashed);
            println!("  pfLimitReached         {}", self.pf_limit_reached);
            println!(
                "  pfTranslationLimit     {}",
                self.pf_translation_limit_reached
            );
            println!("  pfAccuracy             {:.4}", self.pf_accuracy());
            println!("  pfCoverage             {:.4}", self.pf_coverage());
            println!("----------------------------------------------------------");
        }
        if want("latency") {
            println!("LATENCY (log2 cycles)");
            self.instr_access_latency.print("instrAccessLatency");
            self.translation_latency.print("translationLatency");
            self.mem_req_in_flight.print("memReqInFlight");
        }
        println!("==========================================================");
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
