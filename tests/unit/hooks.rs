//! CPU hook notifications, verified with mockall expectations.

use fetchsim::config::FetchConfig;
use fetchsim::core::fetch::Fetch;
use fetchsim::isa::{Decoder, SimpleDecoder};

use crate::common::mocks::cpu::MockCpu;

fn decoders(n: usize) -> Vec<Box<dyn Decoder>> {
    (0..n)
        .map(|_| Box::new(SimpleDecoder::new()) as Box<dyn Decoder>)
        .collect()
}

#[test]
fn test_startup_activates_stage_once() {
    let mut cpu = MockCpu::new();
    cpu.expect_activate_stage().times(1).return_const(());

    let mut fetch = Fetch::new(&FetchConfig::default(), decoders(1), 0x1000);
    fetch.startup(&mut cpu);
    // Already active: no second notification.
    fetch.startup(&mut cpu);
    assert!(fetch.stage_active());
}
