//! SMT fetch policies driven through the full tick path.

use fetchsim::config::{Config, SmtFetchPolicy};
use fetchsim::isa::decoder::encode_alu;

use crate::common::harness::TestContext;

fn two_thread_ctx(policy: SmtFetchPolicy) -> TestContext {
    let mut config = Config::default();
    config.fetch.num_threads = 2;
    config.fetch.smt_fetch_policy = policy;
    let mut ctx = TestContext::with_config(config);
    ctx.load_program(0x1000, &vec![encode_alu(); 32]);
    ctx
}

#[test]
fn test_iq_count_policy_selects_emptier_thread() {
    let mut ctx = two_thread_ctx(SmtFetchPolicy::IQCount);

    ctx.signal_iew_counts(0, 9, 0);
    ctx.signal_iew_counts(1, 3, 0);
    ctx.tick();
    // The thread with the emptier IQ issued the first demand.
    assert_eq!(ctx.mmu.pending[0].tid, 1);
}

#[test]
fn test_lsq_count_policy_selects_emptier_thread() {
    let mut ctx = two_thread_ctx(SmtFetchPolicy::LSQCount);

    ctx.signal_iew_counts(0, 0, 2);
    ctx.signal_iew_counts(1, 0, 7);
    ctx.tick();
    assert_eq!(ctx.mmu.pending[0].tid, 0);
}

#[test]
#[should_panic(expected = "single fetching thread")]
fn test_decoupled_front_end_rejects_smt() {
    let mut config = Config::default();
    config.fetch.num_threads = 2;
    config.fetch.decoupled_front_end = true;
    let mut ctx = TestContext::with_config(config);
    ctx.tick();
}
