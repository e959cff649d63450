//! Functional timing model of the instruction cache.
//!
//! Serves fetch packets out of a flat backing memory with hit/miss latency,
//! a finite MSHR pool producing genuine back-pressure, and access-depth
//! reporting. The model is deliberately simple: residency is tracked per
//! block with no capacity or replacement, which is enough to exercise every
//! fetch-side path.

use std::collections::HashSet;

use log::trace;

use crate::config::IcacheConfig;
use crate::mem::port::IcachePort;
use crate::mem::request::Packet;

/// Flat byte-addressable backing memory.
pub struct Memory {
    base: u64,
    data: Vec<u8>,
}

impl Memory {
    /// Creates `size` bytes of zeroed memory based at `base`.
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    /// True if `[addr, addr + len)` is backed.
    pub fn contains(&self, addr: u64, len: usize) -> bool {
        addr >= self.base && addr + len as u64 <= self.base + self.data.len() as u64
    }

    /// Copies bytes at `addr` into `buf`; unbacked bytes read as zero.
    pub fn read_into(&self, addr: u64, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            let a = addr + i as u64;
            *b = if a >= self.base {
                self.data
                    .get((a - self.base) as usize)
                    .copied()
                    .unwrap_or(0)
            } else {
                0
            };
        }
    }

    /// Writes `bytes` at `addr`, ignoring unbacked bytes.
    pub fn write(&mut self, addr: u64, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            let a = addr + i as u64;
            if a >= self.base {
                if let Some(slot) = self.data.get_mut((a - self.base) as usize) {
                    *slot = b;
                }
            }
        }
    }
}

/// Timing I-cache model with MSHR-limited concurrency.
pub struct TimingIcache {
    mem: Memory,
    hit_latency: u64,
    miss_latency: u64,
    mshrs: usize,
    cache_blk_size: usize,
    resident: HashSet<u64>,
    in_flight: Vec<(u64, Packet)>,
    retry_pending: bool,
    now: u64,
}

impl TimingIcache {
    /// Creates the model over `mem` with the configured timing.
    pub fn new(config: &IcacheConfig, cache_blk_size: usize, mem: Memory) -> Self {
        Self {
            mem,
            hit_latency: config.hit_latency,
            miss_latency: config.miss_latency,
            mshrs: config.mshrs,
            cache_blk_size,
            resident: HashSet::new(),
            in_flight: Vec::new(),
            retry_pending: false,
            now: 0,
        }
    }

    /// Backing memory, for loaders.
    pub fn mem_mut(&mut self) -> &mut Memory {
        &mut self.mem
    }

    /// Advances model time and returns matured responses plus whether a
    /// retry should be signalled to the requester.
    pub fn advance(&mut self, now: u64) -> (Vec<Packet>, bool) {
        self.now = now;

        let mut responses = Vec::new();
        let mut still_pending = Vec::new();
        for (ready_at, pkt) in self.in_flight.drain(..) {
            if ready_at <= now {
                responses.push(pkt);
            } else {
                still_pending.push((ready_at, pkt));
            }
        }
        self.in_flight = still_pending;

        let retry = if self.retry_pending && self.in_flight.len() < self.mshrs {
            self.retry_pending = false;
            true
        } else {
            false
        };
        (responses, retry)
    }

    /// Number of requests currently being serviced.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl IcachePort for TimingIcache {
    fn send_timing_req(&mut self, mut pkt: Packet) -> Result<(), Packet> {
        if self.in_flight.len() >= self.mshrs {
            trace!("icache: out of MSHRs, rejecting {:#x}", pkt.req.paddr());
            self.retry_pending = true;
            return Err(pkt);
        }

        let paddr = pkt.req.paddr().val();
        let blk = paddr & !(self.cache_blk_size as u64 - 1);
        let latency = if self.resident.contains(&blk) {
            pkt.access_depth = 0;
            self.hit_latency
        } else {
            self.resident.insert(blk);
            pkt.access_depth = 1;
            self.miss_latency
        };

        self.mem.read_into(paddr, &mut pkt.data);
        trace!(
            "icache: accepted {:#x}, depth {} ready at {}",
            paddr,
            pkt.access_depth,
            self.now + latency
        );
        self.in_flight.push((self.now + latency, pkt));
        Ok(())
    }
}
