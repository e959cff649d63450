//! Decoupled front-end prefetch behavior: promotion of in-flight
//! prefetches to demand, and in-flight deduplication.

use fetchsim::config::Config;
use fetchsim::core::fetch::ThreadStatus;
use fetchsim::core::ftq::FetchTargetState;
use fetchsim::isa::decoder::encode_alu;

use crate::common::harness::TestContext;

fn dfe_ctx(fill_depth: usize) -> TestContext {
    let mut config = Config::default();
    config.fetch.decoupled_front_end = true;
    config.ftq.fill_depth = fill_depth;
    let mut ctx = TestContext::with_config(config);
    ctx.mmu.sync = true;
    ctx.load_program(0x1000, &vec![encode_alu(); 128]);
    ctx
}

#[test]
fn test_late_prefetch_promoted_to_demand() {
    let mut ctx = dfe_ctx(2);

    // Tick 1: demand for 0x1000 plus a prefetch for the next target.
    ctx.tick();
    assert_eq!(ctx.fetch.stats.pf_issued, 1);
    assert_eq!(ctx.icache.sent[1].req.vaddr.val(), 0x1040);

    // Serve the demand; leave the prefetch in flight.
    ctx.deliver_response(1);

    // Decode blocks 0x1000..0x1030; each tick pipelines the next demand,
    // which reuses the head target's block translation (no new MMU work).
    for expected in [0x1010u64, 0x1020, 0x1030] {
        ctx.tick();
        let pkt = ctx.icache.sent.pop_back().unwrap();
        assert_eq!(pkt.req.vaddr.val(), expected);
        ctx.deliver_response_pkt(pkt);
    }
    assert_eq!(ctx.mmu.issued, 2); // head target + prefetched target only
    let sent_before = ctx.icache.total_sent;

    // Decoding 0x1030 moves the PC onto the prefetched target while its
    // packet is still in flight: the prefetch is adopted as the demand.
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheWaitResponse);
    assert!(ctx.fetch.has_demand_req(0));
    assert_eq!(ctx.fetch.stats.pf_late, 1);
    assert_eq!(ctx.fetch.outstanding_prefetches(), 0);
    // No second access was issued for the same block.
    assert_eq!(ctx.icache.total_sent, sent_before);
    assert_eq!(
        ctx.ftq.head(0).unwrap().state,
        FetchTargetState::ReadyToFetch
    );

    // The in-flight packet returns and is recognized as the demand.
    let pkt = ctx.icache.pop_sent();
    assert_eq!(pkt.req.vaddr.val(), 0x1040);
    ctx.deliver_response_pkt(pkt);
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::IcacheAccessComplete);

    ctx.tick();
    assert_eq!(ctx.decoded.len(), 20);
    for (i, inst) in ctx.decoded.iter().enumerate() {
        assert_eq!(inst.pc.inst_addr(), 0x1000 + 4 * i as u64);
    }
}

#[test]
fn test_prefetch_not_reissued_for_in_flight_block() {
    let mut ctx = dfe_ctx(3);

    // Tick 1: demand 0x1000 and prefetch 0x1040 go out; neither returns.
    ctx.tick();
    assert_eq!(ctx.fetch.stats.pf_issued, 1);
    assert_eq!(ctx.icache.total_sent, 2);

    // Decode squashes to 0xff8, outside the head target.
    ctx.signal_decode_squash(0, 0xff8, 50);
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::Squashing);
    assert_eq!(ctx.cpu.removals, vec![(0, Some(50))]);

    // The PC now sits outside the stale head target: fetch resteers the
    // BAC and invalidates the FTQ.
    ctx.tick();
    assert!(ctx.last_bac_wire.fetch_info[0].squash);
    assert!(ctx.ftq.is_empty(0));

    // The BAC refills from 0xff8; its second and third targets cover the
    // blocks whose packets are still in flight from before the squash.
    // Prefetch issue must dedup against those instead of reissuing.
    ctx.tick();
    ctx.tick();
    assert_eq!(ctx.fetch.stats.pf_issued, 1, "no prefetch reissued");
    assert_eq!(ctx.icache.total_sent, 3); // only the new demand went out
    assert_eq!(
        ctx.ftq.next_head(0).unwrap().state,
        FetchTargetState::ReadyToFetch
    );
    assert!(ctx
        .ftq
        .find_after_head_mut(0, |ft| ft.translation_ready())
        .is_none());
    assert_eq!(ctx.fetch.outstanding_prefetches(), 0);
}
