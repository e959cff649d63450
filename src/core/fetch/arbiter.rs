//! SMT fetch arbitration.
//!
//! Selects the thread to fetch from each sub-cycle. All policies skip
//! threads whose state machine is not in a fetchable state; with a single
//! thread the arbiter degenerates to a fetchability check.

use std::collections::BTreeMap;

use crate::common::ThreadId;
use crate::config::SmtFetchPolicy;
use crate::core::signals::FetchInputs;

use super::{Fetch, FetchIo, ThreadStatus};

impl Fetch {
    /// True if `tid` may be handed to the decode loop this cycle.
    fn is_fetchable(&self, tid: ThreadId) -> bool {
        matches!(
            self.status[tid],
            ThreadStatus::Running | ThreadStatus::IcacheAccessComplete | ThreadStatus::Idle
        )
    }

    /// Picks the next thread to fetch from, or `None` if no thread is
    /// fetchable.
    pub(super) fn get_fetching_thread(
        &mut self,
        inputs: &FetchInputs,
        io: &FetchIo,
    ) -> Option<ThreadId> {
        if self.num_threads > 1 {
            // The decoupled front-end is only wired for one fetching thread.
            assert!(
                !self.decoupled_front_end,
                "decoupled front-end requires a single fetching thread"
            );
            match self.fetch_policy {
                SmtFetchPolicy::RoundRobin => self.round_robin(),
                SmtFetchPolicy::IQCount => self.iq_count(inputs, io),
                SmtFetchPolicy::LSQCount => self.lsq_count(inputs, io),
                SmtFetchPolicy::Branch => self.branch_count(),
            }
        } else {
            let tid = *io.active_threads.first()?;
            if self.is_fetchable(tid) {
                Some(tid)
            } else {
                None
            }
        }
    }

    /// Round-robin: first fetchable thread in priority order moves to the
    /// back of the rotation.
    fn round_robin(&mut self) -> Option<ThreadId> {
        for i in 0..self.priority_list.len() {
            let high_pri = self.priority_list[i];
            debug_assert!(high_pri < self.num_threads);

            if self.is_fetchable(high_pri) {
                self.priority_list.remove(i);
                self.priority_list.push_back(high_pri);
                return Some(high_pri);
            }
        }
        None
    }

    /// Fewest instructions in the IQ wins. Two threads reporting the same
    /// count collide on the map key and the later one wins; this should be
    /// rare.
    fn iq_count(&mut self, inputs: &FetchInputs, io: &FetchIo) -> Option<ThreadId> {
        let mut by_count: BTreeMap<usize, ThreadId> = BTreeMap::new();
        for &tid in io.active_threads {
            by_count.insert(inputs.from_iew.iew[tid].iq_count, tid);
        }

        by_count
            .values()
            .copied()
            .find(|&tid| self.is_fetchable(tid))
    }

    /// Fewest instructions in the LSQ wins; same tie behavior as
    /// [`Fetch::iq_count`].
    fn lsq_count(&mut self, inputs: &FetchInputs, io: &FetchIo) -> Option<ThreadId> {
        let mut by_count: BTreeMap<usize, ThreadId> = BTreeMap::new();
        for &tid in io.active_threads {
            by_count.insert(inputs.from_iew.iew[tid].ldstq_count, tid);
        }

        by_count
            .values()
            .copied()
            .find(|&tid| self.is_fetchable(tid))
    }

    fn branch_count(&mut self) -> Option<ThreadId> {
        panic!("Branch Count fetch policy unimplemented");
    }
}
