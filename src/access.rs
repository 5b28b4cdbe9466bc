//! RAII guards for the two ways of holding a page open (component C5).

use std::cell::Cell;

use crate::forwarding::Forwarding;
use crate::platform::Platform;

/// Proof that the calling thread currently holds one of a
/// [`Forwarding`]'s shared retains.
///
/// Dropping the guard releases the retain exactly once. This is the only
/// way to release a retain; there is deliberately no public `release`
/// method that takes `&Forwarding` alone, so a caller cannot release a
/// retain it never held.
#[must_use = "dropping this immediately releases the retain"]
pub struct RetainedPage<'f, P: Platform> {
    forwarding: &'f Forwarding<P>,
}

impl<'f, P: Platform> RetainedPage<'f, P> {
    pub(crate) fn new(forwarding: &'f Forwarding<P>) -> Self {
        Self { forwarding }
    }
}

impl<P: Platform> Drop for RetainedPage<'_, P> {
    fn drop(&mut self) {
        self.forwarding.release_page();
    }
}

/// Proof that the calling thread holds exclusive, in-place relocation
/// ownership of a [`Forwarding`]'s page.
///
/// Obtained from [`Forwarding::in_place_relocation_claim_page`]. Must be
/// consumed with [`ClaimedPage::finish`] once in-place relocation of the
/// region completes; dropping without calling it also finishes the claim,
/// since leaving a page claimed forever would deadlock every future
/// `retain_page` caller.
pub struct ClaimedPage<'f, P: Platform> {
    forwarding: &'f Forwarding<P>,
    finished: Cell<bool>,
}

impl<'f, P: Platform> ClaimedPage<'f, P> {
    pub(crate) fn new(forwarding: &'f Forwarding<P>) -> Self {
        Self {
            forwarding,
            finished: Cell::new(false),
        }
    }

    /// Whether `offset` was already below the region's allocation top at the
    /// moment the claim started, i.e. whether the object there predates
    /// in-place relocation and must itself be relocated. `thread` must be
    /// the thread currently performing the in-place relocation; any other
    /// thread always gets `false`.
    pub fn is_below_top_at_start(&self, thread: P::Thread, offset: usize) -> bool {
        self.forwarding.is_below_top_at_start(thread, offset)
    }

    /// Mark in-place relocation of this page complete.
    pub fn finish(self) {
        // `Drop` below still runs; `finished` makes it a no-op.
        self.forwarding.in_place_relocation_finish();
        self.finished.set(true);
    }
}

impl<P: Platform> Drop for ClaimedPage<'_, P> {
    fn drop(&mut self) {
        if !self.finished.get() {
            self.forwarding.in_place_relocation_finish();
        }
    }
}
