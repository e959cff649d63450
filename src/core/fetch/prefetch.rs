//! FTQ prefetcher.
//!
//! Once per thread per tick (decoupled front-end only) the prefetcher walks
//! the FTQ beyond the head: it pre-issues translations for targets that need
//! one, then issues a cache prefetch for the first target whose translation
//! is ready, both under their configured outstanding ceilings. Prefetch
//! responses are adopted back onto their fetch target by
//! [`Fetch::try_satisfy_prefetch`].

use log::trace;

use crate::common::ThreadId;
use crate::mem::request::Packet;

use super::{Fetch, FetchIo};

impl Fetch {
    /// Scans the FTQ for translation and prefetch opportunities.
    pub(super) fn process_ftq(&mut self, tid: ThreadId, io: &mut FetchIo) {
        // To prefetch there must be at least one fetch target apart from
        // the head.
        if io.ftq.size(tid) < 2 {
            return;
        }
        if !io.ftq.is_valid(tid) {
            return;
        }

        // Prefetch translations ----------------------------------------
        if self.outstanding_translations < self.max_outstanding_translations {
            // First check if the FTQ contains fetch targets that require a
            // translation.
            let candidate = io
                .ftq
                .find_after_head_mut(tid, |ft| ft.requires_translation())
                .map(|ft| (ft.id, ft.start_address()));

            if let Some((ft_id, start)) = candidate {
                let fetch_buffer_block_pc = start.align_down(self.fetch_buffer_size);
                let req = self.make_request(fetch_buffer_block_pc, tid, start.val(), None);

                trace!(
                    "[tid:{}] translation for {:#x} started",
                    tid,
                    fetch_buffer_block_pc
                );

                self.start_translation(req, tid, Some(ft_id), io);
            }
        } else {
            trace!(
                "[tid:{}] can't issue translation, too many outstanding",
                tid
            );
            self.stats.pf_translation_limit_reached += 1;
        }

        // Prefetch -----------------------------------------------------
        if self.retry_pkt.is_some() || self.cache_blocked {
            // A packet is waiting on retry; no MSHRs for prefetches.
            trace!("[tid:{}] can't issue prefetches, out of MSHRs", tid);
            return;
        }

        if self.outstanding_prefetches >= self.max_outstanding_prefetches {
            trace!("[tid:{}] can't issue prefetches, too many outstanding", tid);
            self.stats.pf_limit_reached += 1;
            return;
        }

        // Search for the next fetch target that can be prefetched.
        let candidate = io
            .ftq
            .find_after_head_mut(tid, |ft| ft.translation_ready())
            .map(|ft| (ft.id, ft.req().cloned()));

        if let Some((ft_id, req)) = candidate {
            let req = req.expect("translation-ready fetch target without request");

            // Check if an access to this address is already in flight.
            if self.fetches_in_progress.contains(&req.paddr().val()) {
                trace!(
                    "[tid:{}] access to {:#x}/{:#x} already in flight, mark ready",
                    tid,
                    req.vaddr,
                    req.paddr()
                );
                if let Some(ft) = io.ftq.get_mut(tid, ft_id) {
                    ft.mark_ready();
                }
                return;
            }

            let vaddr = req.vaddr;
            if self.perform_cache_access(vaddr, tid, req, true, io) {
                if let Some(ft) = io.ftq.get_mut(tid, ft_id) {
                    ft.prefetch_issued();
                }
                self.outstanding_prefetches += 1;
                self.stats.pf_issued += 1;

                trace!(
                    "[tid:{}] prefetch request sent for {:#x} ({}/{})",
                    tid,
                    vaddr,
                    self.outstanding_prefetches,
                    self.max_outstanding_prefetches
                );
            }
        }
    }

    /// Attempts to adopt a cache response as a completed prefetch.
    ///
    /// Matches the packet against the requests owned by the thread's fetch
    /// targets; on a match the target becomes ready and the packet is
    /// consumed (the data only warms the I-cache).
    pub(super) fn try_satisfy_prefetch(
        &mut self,
        tid: ThreadId,
        pkt: &Packet,
        io: &mut FetchIo,
    ) -> bool {
        if !self.decoupled_front_end {
            return false;
        }

        let found = io
            .ftq
            .find_after_head_mut(tid, |ft| ft.req_id() == Some(pkt.req.id))
            .map(|ft| ft.id);

        let Some(ft_id) = found else {
            return false;
        };

        trace!("[tid:{}] prefetch for {:#x} completed", tid, pkt.req.vaddr);

        // Translation and prefetch are both done for this fetch target.
        if let Some(ft) = io.ftq.get_mut(tid, ft_id) {
            ft.mark_ready();
        }
        self.outstanding_prefetches = self.outstanding_prefetches.saturating_sub(1);
        self.stats.pf_received += 1;
        if pkt.access_depth == 0 {
            self.stats.pf_in_cache += 1;
        }
        true
    }
}
