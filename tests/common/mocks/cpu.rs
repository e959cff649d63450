//! Mockall-generated CPU hooks mock, for expectation-style tests.

use fetchsim::common::{InstSeqNum, ThreadId};
use fetchsim::core::hooks::CpuHooks;
use fetchsim::core::inst::DynInst;
use fetchsim::mem::request::{FetchRequest, Packet};
use mockall::mock;

mock! {
    pub Cpu {}

    impl CpuHooks for Cpu {
        fn wake_cpu(&mut self);
        fn activity_this_cycle(&mut self);
        fn activate_stage(&mut self);
        fn deactivate_stage(&mut self);
        fn remove_insts_until(&mut self, seq: InstSeqNum, tid: ThreadId);
        fn remove_insts_not_in_rob(&mut self, tid: ThreadId);
        fn inst_fetched(&mut self, inst: &DynInst);
        fn fetch_request_sent(&mut self, req: &FetchRequest);
        fn inst_access_complete(&mut self, pkt: &Packet);
        fn is_mem_addr(&self, paddr: u64) -> bool;
    }
}
