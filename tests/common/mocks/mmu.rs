//! Scriptable MMU mock.
//!
//! By default translations queue up for manual completion; `sync` makes
//! them complete inside the issuing call. Translation maps virtual to
//! physical by a fixed offset, with per-address fault injection.

use std::collections::{HashSet, VecDeque};

use fetchsim::common::{Fault, PhysAddr};
use fetchsim::mem::mmu::{Mmu, TranslationCompletion};
use fetchsim::mem::request::FetchRequest;

pub struct MockMmu {
    /// Complete translations synchronously inside `translate_timing`.
    pub sync: bool,
    /// Physical = virtual + offset.
    pub offset: u64,
    /// Virtual addresses whose translation faults.
    pub faults: HashSet<u64>,
    /// Requests awaiting manual completion.
    pub pending: VecDeque<FetchRequest>,
    /// Number of translations issued.
    pub issued: u64,
}

impl MockMmu {
    pub fn new() -> Self {
        Self {
            sync: false,
            offset: 0,
            faults: HashSet::new(),
            pending: VecDeque::new(),
            issued: 0,
        }
    }

    /// Resolves a request against the mock's mapping.
    pub fn resolve(&self, mut req: FetchRequest) -> TranslationCompletion {
        let vaddr = req.vaddr.val();
        if self.faults.contains(&vaddr) {
            TranslationCompletion {
                fault: Some(Fault::InstructionPageFault(vaddr)),
                req,
            }
        } else {
            req.set_paddr(PhysAddr::new(vaddr + self.offset));
            TranslationCompletion { fault: None, req }
        }
    }

    /// Completes the oldest pending translation.
    pub fn pop_completion(&mut self) -> TranslationCompletion {
        let req = self.pending.pop_front().expect("no pending translation");
        self.resolve(req)
    }
}

impl Mmu for MockMmu {
    fn translate_timing(&mut self, req: FetchRequest) -> Option<TranslationCompletion> {
        self.issued += 1;
        if self.sync {
            Some(self.resolve(req))
        } else {
            self.pending.push_back(req);
            None
        }
    }
}
