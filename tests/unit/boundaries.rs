//! Boundary behaviors: buffer-block crossings, macro-ops spanning cycles,
//! microcode ROM, and quiesce.

use fetchsim::core::fetch::ThreadStatus;
use fetchsim::isa::decoder::{encode_alu, encode_macro, encode_quiesce};
use fetchsim::isa::{PcState, MICRO_PC_ROM_BIT};

use crate::common::harness::TestContext;

/// Completes one outstanding translation and one response, if present.
fn complete_access(ctx: &mut TestContext) {
    if !ctx.mmu.pending.is_empty() {
        ctx.deliver_translation();
    }
    if !ctx.icache.sent.is_empty() {
        ctx.deliver_response(0);
    }
}

#[test]
fn test_straight_line_across_buffer_blocks() {
    let mut ctx = TestContext::new();
    ctx.load_program(0x1000, &vec![encode_alu(); 8]);

    // First buffer block.
    ctx.tick();
    complete_access(&mut ctx);
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);

    // The decode loop requested a pipelined refetch for the next block
    // inside the same cache line; completing it continues the stream.
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);
    complete_access(&mut ctx);
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 8);
    for (i, inst) in ctx.decoded.iter().enumerate() {
        assert_eq!(inst.pc.inst_addr(), 0x1000 + 4 * i as u64);
    }
}

#[test]
fn test_macroop_emission_spans_cycles() {
    let mut ctx = TestContext::new();
    let mut prog = vec![encode_macro(6)];
    prog.extend(vec![encode_alu(); 7]);
    ctx.load_program(0x1000, &prog);

    ctx.tick();
    complete_access(&mut ctx);

    // Tick A: the macro-op expands; fetch width cuts it after 4 micro-ops.
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);
    for (upc, inst) in ctx.decoded.iter().enumerate() {
        assert_eq!(inst.pc.inst_addr(), 0x1000);
        assert_eq!(inst.pc.micro_pc() as usize, upc);
        assert!(inst.macroop.is_some());
    }
    assert!(ctx.decoded[0].is_delayed_commit());
    assert!(!ctx.decoded[3].is_last_microop());

    // Tick B: remaining micro-ops complete, then decoding continues with
    // the following instructions from the same buffer.
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 8);
    assert_eq!(ctx.decoded[4].pc.inst_addr(), 0x1000);
    assert!(!ctx.decoded[4].is_last_microop());
    assert_eq!(ctx.decoded[5].pc.inst_addr(), 0x1000);
    assert!(ctx.decoded[5].is_last_microop());
    assert!(!ctx.decoded[5].is_delayed_commit());
    assert_eq!(ctx.decoded[6].pc.inst_addr(), 0x1004);
    assert_eq!(ctx.decoded[7].pc.inst_addr(), 0x1008);
}

#[test]
fn test_rom_micro_pc_bypasses_memory() {
    let mut ctx = TestContext::new();
    ctx.load_program(0x1000, &vec![encode_alu(); 8]);

    let mut pc = PcState::new(0x1000);
    pc.set_micro_pc(MICRO_PC_ROM_BIT);
    ctx.fetch.set_thread_pc(0, pc);

    // The ROM micro-op is emitted without touching the fetch buffer; the
    // terminating micro-op then drops back to the architectural stream.
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 1);
    assert_ne!(ctx.decoded[0].pc.micro_pc() & MICRO_PC_ROM_BIT, 0);
    assert_eq!(ctx.fetch.thread_pc(0).inst_addr(), 0x1004);
    // Leaving the ROM triggers a normal demand fetch.
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::ItlbWait);
}

#[test]
fn test_quiesce_halts_until_wakeup() {
    let mut ctx = TestContext::new();
    ctx.load_program(
        0x1000,
        &[encode_alu(), encode_quiesce(), encode_alu(), encode_alu()],
    );

    ctx.tick();
    complete_access(&mut ctx);
    ctx.tick();

    // Fetch stopped right after the quiesce instruction.
    assert_eq!(ctx.decoded.len(), 2);
    assert!(ctx.decoded[1].is_quiesce());
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::QuiescePending);

    let before = ctx.fetch.stats.pending_quiesce_stall_cycles;
    ctx.tick();
    assert_eq!(ctx.fetch.stats.pending_quiesce_stall_cycles, before + 1);
    assert_eq!(ctx.decoded.len(), 2);

    // The wakeup event resumes fetch from the following instruction.
    ctx.fetch.wake_from_quiesce();
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);
    assert_eq!(ctx.decoded[2].pc.inst_addr(), 0x1008);
}

#[test]
fn test_commit_squash_resumes_macroop() {
    use fetchsim::core::signals::SquashedInst;

    let mut ctx = TestContext::new();
    let mut prog = vec![encode_macro(6)];
    prog.extend(vec![encode_alu(); 3]);
    ctx.load_program(0x1000, &prog);

    ctx.tick();
    complete_access(&mut ctx);
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);
    let macroop = ctx.decoded[0].macroop.clone().unwrap();

    // Commit squashes back to the macro-op with an interior micro-op:
    // emission must resume from the retained macro-op, not refetch.
    ctx.signal_commit_squash_inst(
        0,
        0x1000,
        SquashedInst {
            pc_addr: 0x1000,
            is_last_microop: false,
            macroop: Some(macroop),
        },
    );
    ctx.tick();
    assert_eq!(ctx.fetch.thread_status(0), ThreadStatus::Squashing);

    let total_sent = ctx.icache.total_sent;
    ctx.tick();
    assert!(ctx.decoded.len() > 4);
    let resumed = &ctx.decoded[4];
    assert_eq!(resumed.pc.inst_addr(), 0x1000);
    assert_eq!(resumed.pc.micro_pc(), 0);
    assert!(resumed.macroop.is_some());
    // No memory access was needed to restart the macro-op.
    assert_eq!(ctx.icache.total_sent, total_sent);
}
