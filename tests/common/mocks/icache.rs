//! Scriptable I-cache mock.
//!
//! Accepted packets are filled from a backing memory and parked until the
//! test releases them; setting `accept` to false produces back-pressure.

use std::collections::VecDeque;

use fetchsim::mem::port::IcachePort;
use fetchsim::mem::request::Packet;
use fetchsim::sim::Memory;

pub struct MockIcache {
    /// Backing memory packets are filled from at send time.
    pub mem: Memory,
    /// Whether sends are accepted; false rejects with back-pressure.
    pub accept: bool,
    /// Accepted packets awaiting manual release.
    pub sent: VecDeque<Packet>,
    /// Number of rejected sends.
    pub rejects: u64,
    /// Number of accepted sends.
    pub total_sent: u64,
}

impl MockIcache {
    pub fn new(mem_size: usize) -> Self {
        Self {
            mem: Memory::new(0, mem_size),
            accept: true,
            sent: VecDeque::new(),
            rejects: 0,
            total_sent: 0,
        }
    }

    /// Pops the oldest accepted packet.
    pub fn pop_sent(&mut self) -> Packet {
        self.sent.pop_front().expect("no packet in flight")
    }
}

impl IcachePort for MockIcache {
    fn send_timing_req(&mut self, mut pkt: Packet) -> Result<(), Packet> {
        if !self.accept {
            self.rejects += 1;
            return Err(pkt);
        }
        self.mem.read_into(pkt.req.paddr().val(), &mut pkt.data);
        self.total_sent += 1;
        self.sent.push_back(pkt);
        Ok(())
    }
}
