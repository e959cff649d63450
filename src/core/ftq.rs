//! Fetch target queue.
//!
//! The BAC runs ahead of fetch and deposits *fetch targets* here: cache-block
//! sized PC ranges it predicts the thread will execute. Each target tracks
//! its own translation/prefetch lifecycle so the prefetcher can warm the
//! I-cache before demand fetch arrives:
//!
//! `Initial -> TranslationInProgress -> (TranslationReady | TranslationFailed)
//! -> PrefetchInProgress -> ReadyToFetch`
//!
//! Transitions are monotonic between invalidations; once a target is
//! `ReadyToFetch` it never re-enters an in-progress state.

use std::collections::VecDeque;

use log::trace;

use crate::common::{Fault, PhysAddr, ThreadId, VirtAddr};
use crate::mem::request::{FetchRequest, ReqId};

/// Unique identity of a fetch target, stable across queue movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FtId(pub u64);

/// Lifecycle state of a fetch target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FetchTargetState {
    /// Freshly predicted; no translation started.
    #[default]
    Initial,
    /// A translation for this target is in flight.
    TranslationInProgress,
    /// Translation finished successfully; prefetch may be issued.
    TranslationReady,
    /// Translation faulted; demand fetch will take the trap path.
    TranslationFailed,
    /// A cache prefetch for this target is in flight.
    PrefetchInProgress,
    /// Nothing outstanding; demand fetch can proceed immediately.
    ReadyToFetch,
}

/// One entry of the fetch target queue: a predicted cache-block-sized PC
/// range plus its translation/prefetch bookkeeping.
#[derive(Clone, Debug)]
pub struct FetchTarget {
    /// Queue-stable identity.
    pub id: FtId,
    /// Lifecycle state.
    pub state: FetchTargetState,
    /// Fault recorded by a failed translation.
    pub fault: Option<Fault>,
    start: VirtAddr,
    end: VirtAddr,
    blk_addr: VirtAddr,
    fall_through: bool,
    paddr: Option<PhysAddr>,
    req: Option<FetchRequest>,
    translation_start: Option<u64>,
}

impl FetchTarget {
    fn new(id: FtId, start: VirtAddr, end: VirtAddr, fall_through: bool, cache_blk: usize) -> Self {
        Self {
            id,
            state: FetchTargetState::Initial,
            fault: None,
            start,
            end,
            blk_addr: start.align_down(cache_blk),
            fall_through,
            paddr: None,
            req: None,
            translation_start: None,
        }
    }

    /// First address covered by this target.
    #[inline]
    pub fn start_address(&self) -> VirtAddr {
        self.start
    }

    /// First address past the target's range.
    #[inline]
    pub fn end_address(&self) -> VirtAddr {
        self.end
    }

    /// Cache block address this target covers.
    #[inline]
    pub fn blk_addr(&self) -> VirtAddr {
        self.blk_addr
    }

    /// True if `addr` lies within the target's predicted range.
    #[inline]
    pub fn in_range(&self, addr: u64) -> bool {
        self.start.val() <= addr && addr < self.end.val()
    }

    /// True if the `n`-byte-aligned block containing `addr` lies within the
    /// target's range.
    #[inline]
    pub fn in_range_aligned(&self, addr: u64, n: usize) -> bool {
        self.in_range(VirtAddr::new(addr).align_down(n).val())
    }

    /// True if control flow falls through sequentially into the next target.
    #[inline]
    pub fn is_fall_through(&self) -> bool {
        self.fall_through
    }

    /// True if no translation has been started for this target yet.
    #[inline]
    pub fn requires_translation(&self) -> bool {
        self.state == FetchTargetState::Initial
    }

    /// True if the target's translation finished and no prefetch was issued.
    #[inline]
    pub fn translation_ready(&self) -> bool {
        self.state == FetchTargetState::TranslationReady
    }

    /// True once a translation attached a physical address.
    #[inline]
    pub fn has_paddr(&self) -> bool {
        self.paddr.is_some()
    }

    /// The translated physical address of the covered block.
    ///
    /// # Panics
    ///
    /// Panics if no translation has completed.
    #[inline]
    pub fn paddr(&self) -> PhysAddr {
        self.paddr.expect("fetch target has no physical address")
    }

    /// The request currently owned by this target.
    #[inline]
    pub fn req(&self) -> Option<&FetchRequest> {
        self.req.as_ref()
    }

    /// Identity of the owned request, if any.
    #[inline]
    pub fn req_id(&self) -> Option<ReqId> {
        self.req.as_ref().map(|r| r.id)
    }

    /// Reclaims the owned request; ownership moves to the caller.
    ///
    /// # Panics
    ///
    /// Panics if the target holds no request.
    pub fn pop_req(&mut self) -> FetchRequest {
        self.req.take().expect("fetch target has no request to pop")
    }

    /// Marks the target as requiring no further front-end work.
    pub fn mark_ready(&mut self) {
        self.state = FetchTargetState::ReadyToFetch;
    }

    /// Records that a prefetch was issued for this target.
    pub fn prefetch_issued(&mut self) {
        debug_assert_eq!(self.state, FetchTargetState::TranslationReady);
        self.state = FetchTargetState::PrefetchInProgress;
    }

    /// Binds `req` to this target and starts its translation.
    pub fn start_translation(&mut self, req: FetchRequest, now: u64) {
        debug_assert_eq!(self.state, FetchTargetState::Initial);
        self.req = Some(req);
        self.translation_start = Some(now);
        self.state = FetchTargetState::TranslationInProgress;
    }

    /// Records a completed translation and returns its latency in cycles.
    ///
    /// Only an in-progress target changes state; a target already promoted
    /// (for example to `ReadyToFetch` by a demand reclaim) just records the
    /// physical address and fault.
    pub fn finish_translation(
        &mut self,
        fault: Option<Fault>,
        req: FetchRequest,
        prefetch: bool,
        now: u64,
    ) -> u64 {
        let latency = self
            .translation_start
            .map(|start| now.saturating_sub(start))
            .unwrap_or(0);

        if fault.is_none() {
            self.paddr = Some(req.paddr());
        }
        self.fault = fault.clone();

        if self.state == FetchTargetState::TranslationInProgress {
            self.state = if fault.is_some() {
                FetchTargetState::TranslationFailed
            } else {
                FetchTargetState::TranslationReady
            };
            // Refresh the bound request with the translated copy, unless a
            // demand reclaim already took ownership of it.
            if self.req.is_some() {
                self.req = Some(req);
            }
        } else {
            debug_assert!(prefetch || self.req.is_none());
        }
        latency
    }
}

impl std::fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "FT[{}: {:#x}-{:#x} {:?}{}]",
            self.id.0,
            self.start,
            self.end,
            self.state,
            if self.fall_through { " ft" } else { "" }
        )
    }
}

/// Per-thread queue of fetch targets produced by the BAC.
pub struct Ftq {
    threads: Vec<VecDeque<FetchTarget>>,
    valid: Vec<bool>,
    capacity: usize,
    cache_blk_size: usize,
    next_id: u64,
}

impl Ftq {
    /// Creates an FTQ for `num_threads` threads of `capacity` entries each.
    pub fn new(num_threads: usize, capacity: usize, cache_blk_size: usize) -> Self {
        Self {
            threads: (0..num_threads).map(|_| VecDeque::new()).collect(),
            valid: vec![true; num_threads],
            capacity,
            cache_blk_size,
            next_id: 0,
        }
    }

    /// True if the head fetch target exists and the queue content is valid.
    pub fn is_head_ready(&self, tid: ThreadId) -> bool {
        self.valid[tid] && !self.threads[tid].is_empty()
    }

    /// True if the thread's queue holds no targets.
    pub fn is_empty(&self, tid: ThreadId) -> bool {
        self.threads[tid].is_empty()
    }

    /// True if the queue content has not been invalidated.
    pub fn is_valid(&self, tid: ThreadId) -> bool {
        self.valid[tid]
    }

    /// Number of queued targets for the thread.
    pub fn size(&self, tid: ThreadId) -> usize {
        self.threads[tid].len()
    }

    /// True if the thread's queue is at capacity.
    pub fn is_full(&self, tid: ThreadId) -> bool {
        self.threads[tid].len() >= self.capacity
    }

    /// Appends a new fetch target covering `[start, end)`.
    ///
    /// Returns the new target's id, or `None` if the queue is full.
    pub fn push_back(
        &mut self,
        tid: ThreadId,
        start: VirtAddr,
        end: VirtAddr,
        fall_through: bool,
    ) -> Option<FtId> {
        if self.is_full(tid) {
            return None;
        }
        let id = FtId(self.next_id);
        self.next_id += 1;
        let ft = FetchTarget::new(id, start, end, fall_through, self.cache_blk_size);
        trace!("[tid:{}] FTQ push {}", tid, ft);
        self.threads[tid].push_back(ft);
        self.valid[tid] = true;
        Some(id)
    }

    /// The head fetch target.
    pub fn head(&self, tid: ThreadId) -> Option<&FetchTarget> {
        self.threads[tid].front()
    }

    /// The head fetch target, mutably.
    pub fn head_mut(&mut self, tid: ThreadId) -> Option<&mut FetchTarget> {
        self.threads[tid].front_mut()
    }

    /// The target directly behind the head.
    pub fn next_head(&self, tid: ThreadId) -> Option<&FetchTarget> {
        self.threads[tid].get(1)
    }

    /// The first target *after the head* matching `pred`, mutably.
    pub fn find_after_head_mut(
        &mut self,
        tid: ThreadId,
        pred: impl Fn(&FetchTarget) -> bool,
    ) -> Option<&mut FetchTarget> {
        self.threads[tid].iter_mut().skip(1).find(|ft| pred(ft))
    }

    /// Resolves a fetch target by id anywhere in the thread's queue.
    pub fn get(&self, tid: ThreadId, id: FtId) -> Option<&FetchTarget> {
        self.threads[tid].iter().find(|ft| ft.id == id)
    }

    /// Resolves a fetch target by id, mutably.
    ///
    /// Returns `None` if the target was consumed or invalidated, which is
    /// how stale completions detect that their target is gone.
    pub fn get_mut(&mut self, tid: ThreadId, id: FtId) -> Option<&mut FetchTarget> {
        self.threads[tid].iter_mut().find(|ft| ft.id == id)
    }

    /// Pops the consumed head after fetch has moved past it.
    ///
    /// Returns false if the queue has nothing to pop or was invalidated;
    /// the caller must then resteer the BAC.
    pub fn update_head(&mut self, tid: ThreadId) -> bool {
        if !self.valid[tid] || self.threads[tid].is_empty() {
            return false;
        }
        let ft = self.threads[tid].pop_front();
        trace!("[tid:{}] FTQ pop {}", tid, ft.unwrap());
        true
    }

    /// Squashes the thread's queue; the BAC must refill it.
    pub fn invalidate(&mut self, tid: ThreadId) {
        trace!("[tid:{}] FTQ invalidate ({} entries)", tid, self.threads[tid].len());
        self.threads[tid].clear();
        self.valid[tid] = false;
    }
}
