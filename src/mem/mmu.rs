//! MMU translation contract.

use super::request::FetchRequest;
use crate::common::Fault;

/// Outcome of a finished translation.
#[derive(Clone, Debug)]
pub struct TranslationCompletion {
    /// Fault raised by the walk, if any.
    pub fault: Option<Fault>,
    /// The request, with its physical address installed on success.
    pub req: FetchRequest,
}

/// Timing translation interface.
///
/// Each `translate_timing` call completes exactly once: either synchronously
/// (the returned `Some`) or later through whatever completion delivery the
/// concrete model provides. The fetch unit accounts for the outstanding
/// translation *before* issuing, precisely because the completion may arrive
/// inside this call.
pub trait Mmu {
    /// Starts a timing translation of `req`'s virtual address.
    ///
    /// Returns `Some(completion)` if the MMU finished synchronously; `None`
    /// if the completion will be delivered later.
    fn translate_timing(&mut self, req: FetchRequest) -> Option<TranslationCompletion>;
}
