//! Table-driven timing MMU model.
//!
//! Translates page-by-page with a fixed latency. Unmapped pages translate
//! identity (virtual equals physical), explicit mappings override that, and
//! fault injection marks pages whose translation raises a page fault. A
//! latency of zero completes synchronously inside `translate_timing`,
//! exercising the requirement that the fetch unit accounts for the
//! outstanding translation before issuing.

use std::collections::{HashMap, HashSet};

use crate::common::{Fault, PhysAddr};
use crate::mem::mmu::{Mmu, TranslationCompletion};
use crate::mem::request::FetchRequest;

const PAGE_SHIFT: u64 = 12;

/// Timing MMU with identity default mapping and page-level overrides.
pub struct SimMmu {
    latency: u64,
    pages: HashMap<u64, u64>,
    faulting: HashSet<u64>,
    pending: Vec<(u64, TranslationCompletion)>,
    now: u64,
}

impl SimMmu {
    /// Creates the model with the given translation latency in cycles.
    pub fn new(latency: u64) -> Self {
        Self {
            latency,
            pages: HashMap::new(),
            faulting: HashSet::new(),
            pending: Vec::new(),
            now: 0,
        }
    }

    /// Maps the page containing `vaddr` to the page containing `paddr`.
    pub fn map_page(&mut self, vaddr: u64, paddr: u64) {
        self.pages.insert(vaddr >> PAGE_SHIFT, paddr >> PAGE_SHIFT);
    }

    /// Makes translations of `vaddr`'s page raise a page fault.
    pub fn inject_fault(&mut self, vaddr: u64) {
        self.faulting.insert(vaddr >> PAGE_SHIFT);
    }

    fn translate(&self, vaddr: u64) -> Result<PhysAddr, Fault> {
        let vpn = vaddr >> PAGE_SHIFT;
        if self.faulting.contains(&vpn) {
            return Err(Fault::InstructionPageFault(vaddr));
        }
        let ppn = self.pages.get(&vpn).copied().unwrap_or(vpn);
        Ok(PhysAddr::new((ppn << PAGE_SHIFT) | (vaddr & ((1 << PAGE_SHIFT) - 1))))
    }

    /// Advances model time and returns matured completions.
    pub fn advance(&mut self, now: u64) -> Vec<TranslationCompletion> {
        self.now = now;
        let mut done = Vec::new();
        let mut still_pending = Vec::new();
        for (ready_at, completion) in self.pending.drain(..) {
            if ready_at <= now {
                done.push(completion);
            } else {
                still_pending.push((ready_at, completion));
            }
        }
        self.pending = still_pending;
        done
    }
}

impl Mmu for SimMmu {
    fn translate_timing(&mut self, mut req: FetchRequest) -> Option<TranslationCompletion> {
        let outcome = self.translate(req.vaddr.val());
        let fault = match outcome {
            Ok(paddr) => {
                req.set_paddr(paddr);
                None
            }
            Err(fault) => Some(fault),
        };
        let completion = TranslationCompletion { fault, req };

        if self.latency == 0 {
            Some(completion)
        } else {
            self.pending.push((self.now + self.latency, completion));
            None
        }
    }
}
