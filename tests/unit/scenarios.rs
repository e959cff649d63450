//! End-to-end pipeline scenarios.
//!
//! Each test walks the fetch unit through one of the canonical sequences:
//! cold start, mid-flight squash, cache back-pressure, decoupled prefetch,
//! translation fault, and SMT arbitration.

use fetchsim::common::Fault;
use fetchsim::config::Config;
use fetchsim::core::fetch::ThreadStatus;
use fetchsim::core::ftq::FetchTargetState;
use fetchsim::isa::decoder::encode_alu;

use crate::common::harness::TestContext;

fn alu_block(n: usize) -> Vec<u32> {
    vec![encode_alu(); n]
}

#[test]
fn test_cold_start_straight_line() {
    let mut ctx = TestContext::new();
    ctx.mmu.offset = 0x4000;
    // The mock cache serves data by physical address.
    ctx.load_program(0x5000, &alu_block(16));

    // Tick 1: running, buffer cold, translation outstanding.
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);
    assert!(ctx.fetch.has_demand_req(0));
    assert_eq!(ctx.mmu.pending.len(), 1);
    assert_eq!(ctx.fetch.stats.tlb_cycles, 1);

    // MMU completes with NoFault, paddr 0x5000; the cache access goes out.
    ctx.deliver_translation();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheWaitResponse);
    assert_eq!(ctx.icache.sent.len(), 1);
    assert_eq!(ctx.icache.sent[0].req.paddr().val(), 0x5000);
    assert_eq!(ctx.fetch.stats.cache_lines, 1);

    // Tick 2: response arrives from depth 1.
    ctx.tick();
    ctx.deliver_response(1);
    assert_eq!(ctx.fetch.stats.demand_miss, 1);
    assert_eq!(ctx.fetch.stats.demand_hit, 0);
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheAccessComplete);
    assert!(!ctx.fetch.has_demand_req(0));

    // Tick 3: a full fetch-width of instructions reaches decode.
    ctx.tick();
    assert_eq!(ctx.last_forwarded, 4);
    assert_eq!(ctx.decoded.len(), 4);
    assert_eq!(ctx.fetch.fetch_queue_len(0), 0);
    assert_eq!(ctx.fetch.stats.nisn_dist.count(4), 1);
    for (i, inst) in ctx.decoded.iter().enumerate() {
        assert_eq!(inst.pc.inst_addr(), 0x1000 + 4 * i as u64);
    }
}

#[test]
fn test_mid_flight_squash() {
    let mut ctx = TestContext::new();
    ctx.load_program(0x1000, &alu_block(16));

    ctx.tick();
    ctx.deliver_translation();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheWaitResponse);

    // Commit squashes to 0x2000 while the access is in flight.
    ctx.signal_commit_squash(0, 0x2000);
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::Squashing);
    assert!(!ctx.fetch.has_demand_req(0));
    assert_eq!(ctx.fetch.fetch_queue_len(0), 0);
    assert_eq!(ctx.fetch.thread_pc(0).inst_addr(), 0x2000);
    // The commit squash dropped everything not yet in the ROB.
    assert_eq!(ctx.cpu.removals, vec![(0, None)]);

    // The stale response is counted, not buffered.
    ctx.deliver_response(1);
    assert_eq!(ctx.fetch.stats.icache_squashes, 1);
    assert_eq!(ctx.fetch.stats.demand_miss, 0);

    // The squash drains and fetch resumes at the redirect PC.
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);
    assert_eq!(ctx.mmu.pending.back().unwrap().vaddr.val(), 0x2000);
}

#[test]
fn test_cache_back_pressure_and_retry() {
    let mut ctx = TestContext::new();
    ctx.load_program(0x1000, &alu_block(16));
    ctx.icache.accept = false;

    ctx.tick();
    ctx.deliver_translation();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheWaitRetry);
    assert!(ctx.fetch.is_cache_blocked());
    assert_eq!(ctx.fetch.retry_tid(), Some(0));
    assert_eq!(ctx.icache.rejects, 1);

    // Every stalled tick is accounted to the retry reason.
    let before = ctx.fetch.stats.icache_wait_retry_stall_cycles;
    ctx.run(3);
    assert_eq!(ctx.fetch.stats.icache_wait_retry_stall_cycles, before + 3);

    // Retry arrives and the resend succeeds.
    ctx.icache.accept = true;
    ctx.deliver_retry();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheWaitResponse);
    assert!(!ctx.fetch.is_cache_blocked());
    assert_eq!(ctx.fetch.retry_tid(), None);
    assert_eq!(ctx.icache.sent.len(), 1);

    ctx.tick();
    ctx.deliver_response(1);
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);
}

#[test]
fn test_dfe_prefetch_satisfied_before_demand() {
    let mut ctx = TestContext::dfe();
    ctx.mmu.sync = true;
    ctx.load_program(0x1000, &alu_block(64));

    // Tick 1: demand for the head block goes out; the prefetcher issues a
    // translation and a prefetch for the next fetch target.
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheWaitResponse);
    assert_eq!(ctx.fetch.stats.pf_issued, 1);
    assert_eq!(ctx.fetch.outstanding_prefetches(), 1);
    assert_eq!(ctx.icache.sent.len(), 2);
    assert_eq!(ctx.icache.sent[0].req.vaddr.val(), 0x1000);
    assert_eq!(ctx.icache.sent[1].req.vaddr.val(), 0x1040);

    // The prefetch returns (cache hit) before the head advances to it.
    let mut pf = ctx.icache.sent.pop_back().unwrap();
    pf.access_depth = 0;
    ctx.deliver_response_pkt(pf);
    assert_eq!(ctx.fetch.stats.pf_received, 1);
    assert_eq!(ctx.fetch.stats.pf_in_cache, 1);
    assert_eq!(ctx.fetch.outstanding_prefetches(), 0);
    assert_eq!(
        ctx.ftq.next_head(0).unwrap().state,
        FetchTargetState::ReadyToFetch
    );

    // The demand proceeds normally afterwards.
    ctx.deliver_response(1);
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);
}

#[test]
fn test_translation_fault_builds_trap_nop() {
    let mut ctx = TestContext::new();
    ctx.mmu.faults.insert(0x1000);

    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);

    ctx.deliver_translation();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::TrapPending);
    assert!(!ctx.fetch.has_demand_req(0));
    assert_eq!(ctx.fetch.fetch_queue_len(0), 1);

    // The nop carrying the fault reaches decode.
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 1);
    let inst = &ctx.decoded[0];
    assert!(inst.not_an_inst);
    assert_eq!(inst.fault, Some(Fault::InstructionPageFault(0x1000)));
    assert_eq!(inst.pc.inst_addr(), 0x1000);

    // Fetch waits for commit to handle the fault.
    let before = ctx.fetch.stats.pending_trap_stall_cycles;
    ctx.tick();
    assert_eq!(ctx.fetch.stats.pending_trap_stall_cycles, before + 1);

    // Only a squash resumes the thread.
    ctx.signal_commit_squash(0, 0x2000);
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::Squashing);
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);
    assert_eq!(ctx.mmu.pending.back().unwrap().vaddr.val(), 0x2000);
}

#[test]
fn test_smt_round_robin_skips_waiting_threads() {
    let mut config = Config::default();
    config.fetch.num_threads = 2;
    let mut ctx = TestContext::with_config(config);
    ctx.load_program(0x1000, &alu_block(16));

    // Tick 1 selects thread 0 and parks it on its translation.
    ctx.tick();
    assert_eq!(ctx.mmu.pending.len(), 1);
    assert_eq!(ctx.mmu.pending[0].tid, 0);
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);

    // Tick 2 rotates to thread 1.
    ctx.tick();
    assert_eq!(ctx.mmu.pending.len(), 2);
    assert_eq!(ctx.mmu.pending[1].tid, 1);

    // Both waiting: nothing new is issued.
    ctx.tick();
    assert_eq!(ctx.mmu.pending.len(), 2);

    // Wake thread 0; it is the only fetchable thread and decodes alone.
    ctx.deliver_translation();
    ctx.deliver_response(1);
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheAccessComplete);
    ctx.tick();
    assert!(ctx.decoded.iter().all(|inst| inst.tid == 0));
    assert_eq!(ctx.fetch.thread_status(1), ThreadStatus::ItlbWait);
    assert!(!ctx.decoded.is_empty());
}
