//! Interrupt latching and the delayed-commit window (full-system mode).

use fetchsim::config::Config;
use fetchsim::isa::decoder::{encode_alu, encode_macro};

use crate::common::harness::TestContext;

fn fs_ctx() -> TestContext {
    let mut config = Config::default();
    config.fetch.full_system = true;
    TestContext::with_config(config)
}

#[test]
fn test_interrupt_stalls_fetch_until_cleared() {
    let mut ctx = fs_ctx();
    ctx.load_program(0x1000, &vec![encode_alu(); 32]);

    ctx.tick();
    ctx.deliver_translation();
    ctx.deliver_response(0);
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);
    ctx.deliver_translation();
    ctx.deliver_response(0);

    // Commit posts an interrupt.
    ctx.signal_interrupt(true, false);
    ctx.tick();
    assert!(ctx.fetch.interrupt_pending());
    let decoded_after_latch = ctx.decoded.len();

    // No new instructions while the interrupt is pending.
    let misc_before = ctx.fetch.stats.misc_stall_cycles;
    ctx.run(3);
    assert_eq!(ctx.decoded.len(), decoded_after_latch);
    assert!(ctx.fetch.stats.misc_stall_cycles > misc_before);

    // Clearing resumes fetch.
    ctx.signal_interrupt(false, true);
    ctx.run(3);
    assert!(!ctx.fetch.interrupt_pending());
    while !ctx.mmu.pending.is_empty() {
        ctx.deliver_translation();
    }
    while !ctx.icache.sent.is_empty() {
        ctx.deliver_response(0);
    }
    ctx.run(2);
    assert!(ctx.decoded.len() > decoded_after_latch);
}

#[test]
fn test_interrupt_deferred_during_macroop() {
    let mut ctx = fs_ctx();
    let mut prog = vec![encode_macro(6)];
    prog.extend(vec![encode_alu(); 7]);
    ctx.load_program(0x1000, &prog);

    ctx.tick();
    ctx.deliver_translation();
    ctx.deliver_response(0);

    // Tick A emits the first four micro-ops; the last one emitted is an
    // interior micro-op, so fetch sits in a delayed-commit window.
    ctx.tick();
    assert_eq!(ctx.decoded.len(), 4);

    // The interrupt must not split the macro-op: emission continues.
    ctx.signal_interrupt(true, false);
    ctx.tick();
    assert!(ctx.fetch.interrupt_pending());
    assert_eq!(ctx.decoded.len(), 8);
    assert!(ctx.decoded[5].is_last_microop());

    // The window closed with the macro-op; now the interrupt stalls fetch.
    let decoded_before = ctx.decoded.len();
    ctx.run(3);
    assert_eq!(ctx.decoded.len(), decoded_before);
}
