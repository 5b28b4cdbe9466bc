//! The forwarding lifecycle lock (component C3): the reference-count
//! rendezvous protocol that lets mutators and collector threads retain a
//! region while it is being relocated, lets exactly one thread claim it for
//! in-place relocation, and lets a detacher wait until it is quiescent.
//!
//! # `ref_count` protocol
//!
//! `ref_count` starts at 1, representing the implicit retain the relocation
//! set holds on a region from the moment it is selected until the moment its
//! `Forwarding` is fully drained and the region is detached. From there:
//!
//! * While `ref_count > 0`, it is the number of outstanding retains.
//!   [`Forwarding::retain_page`] increments it with a CAS loop;
//!   [`Forwarding::release_page`] decrements it the same way.
//! * [`Forwarding::in_place_relocation_claim_page`] negates `ref_count`
//!   (`n -> -n`), marking "a thread wants to claim this page exclusively,
//!   `n` retains must still drain". Each subsequent `release_page` call on a
//!   negative count moves it one step towards `-1` (`-n -> -(n-1)`); once it
//!   reaches `-1`, only the claimer's own implicit retain remains and the
//!   claim is granted.
//! * `0` is terminal: the page has been fully released and may be detached.
//!   No further retain is possible once `ref_count` reaches `0`.
//!
//! This mirrors the `_ref_count` CAS loops in ZGC's forwarding table, reduced
//! to what a binding-agnostic crate can express without that VM's own
//! region/page types.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};

use crate::access::{ClaimedPage, RetainedPage};
use crate::config::Config;
use crate::entry::{ForwardingEntryTable, FromIndex, ToOffset};
use crate::error::{AccessOutcome, ClaimOutcome, WaitOutcome};
use crate::platform::{AddressSpace, Generation, Platform, Region, ThreadIdentity};
use crate::remset::RemsetHandshake;
use crate::stats::RelocationStallStat;

/// Which generation a region belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Age {
    Young,
    Old,
}

/// The per-region forwarding state: reference-count lifecycle lock, in-place
/// relocation marker, per-object entry table, and (for old regions) the
/// remembered-fields handshake.
pub struct Forwarding<P: Platform> {
    page: Mutex<Option<P::Region>>,
    from_age: Age,
    to_age: Age,

    ref_count: AtomicI32,
    ref_lock: Mutex<()>,
    ref_cond: Condvar,
    ref_abort: AtomicBool,

    in_place: AtomicBool,
    in_place_thread: AtomicU64,
    in_place_top_at_start: AtomicUsize,

    entries: ForwardingEntryTable,
    remset: Option<RemsetHandshake<P::AddressSpace>>,

    stall_stat: RelocationStallStat,
    config: Config,
}

impl<P: Platform> Forwarding<P> {
    /// Build a forwarding for `page`, about to be relocated from `from_age`
    /// to `to_age`. Old-generation sources get a [`RemsetHandshake`]; young
    /// ones don't, since the OC/YC handshake only concerns cross-generational
    /// fields discovered while relocating old regions.
    pub fn new(page: P::Region, from_age: Age, to_age: Age, config: Config) -> Self {
        let capacity = config.entry_table_capacity(page.object_max_count());
        let remset = matches!(from_age, Age::Old).then(RemsetHandshake::new);
        Self {
            page: Mutex::new(Some(page)),
            from_age,
            to_age,
            ref_count: AtomicI32::new(1),
            ref_lock: Mutex::new(()),
            ref_cond: Condvar::new(),
            ref_abort: AtomicBool::new(false),
            in_place: AtomicBool::new(false),
            in_place_thread: AtomicU64::new(0),
            in_place_top_at_start: AtomicUsize::new(0),
            entries: ForwardingEntryTable::new(capacity),
            remset,
            stall_stat: RelocationStallStat::new(),
            config,
        }
    }

    /// The generation the region is being relocated out of.
    pub fn from_age(&self) -> Age {
        self.from_age
    }

    fn notify_ref_waiters(&self) {
        let _guard = self.ref_lock.lock().unwrap();
        self.ref_cond.notify_all();
    }

    /// Retain the page for the duration of an access. The returned
    /// [`RetainedPage`] must be dropped to release the retain.
    pub fn retain_page(&self) -> AccessOutcome<'_, P> {
        loop {
            let cur = self.ref_count.load(Ordering::Acquire);
            if cur == 0 {
                return AccessOutcome::Released;
            }
            if cur < 0 {
                // An in-place claim is draining outstanding retains; wait for
                // it to resolve one way or another, then retry from scratch.
                match self.wait_page_released() {
                    WaitOutcome::Released => return AccessOutcome::Released,
                    WaitOutcome::Aborted => return AccessOutcome::Aborted,
                }
            }
            if self
                .ref_count
                .compare_exchange_weak(cur, cur + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return AccessOutcome::Retained(RetainedPage::new(self));
            }
        }
    }

    /// Release a retain previously obtained from `retain_page`. Called by
    /// [`RetainedPage::drop`]; not exposed directly so a retain can only be
    /// released by the guard that represents it.
    pub(crate) fn release_page(&self) {
        loop {
            let cur = self.ref_count.load(Ordering::Acquire);
            debug_assert_ne!(cur, 0, "release_page called on an already-terminal page");
            let next = if cur > 0 { cur - 1 } else { cur + 1 };
            if self
                .ref_count
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if next == 0 || next == -1 {
                    self.notify_ref_waiters();
                }
                return;
            }
        }
    }

    /// Block the calling thread until either `ref_count` reaches `0` or the
    /// surrounding relocation is aborted.
    pub fn wait_page_released(&self) -> WaitOutcome {
        let _timer = self
            .config
            .track_relocation_stall
            .then(|| self.stall_stat.start());

        let mut guard = self.ref_lock.lock().unwrap();
        loop {
            if self.ref_abort.load(Ordering::Acquire) {
                return WaitOutcome::Aborted;
            }
            if self.ref_count.load(Ordering::Acquire) == 0 {
                return WaitOutcome::Released;
            }
            guard = self.ref_cond.wait(guard).unwrap();
        }
    }

    /// Abort the relocation this forwarding belongs to: every thread
    /// currently retaining, waiting to retain, or waiting on the page is
    /// released with [`AccessOutcome::Aborted`] / [`WaitOutcome::Aborted`].
    pub fn abort_page(&self) {
        self.ref_abort.store(true, Ordering::Release);
        self.notify_ref_waiters();
    }

    /// Claim the page for exclusive in-place relocation. Blocks until every
    /// other outstanding retain has drained. Must only be called once per
    /// forwarding, by the single thread that will perform the in-place
    /// relocation.
    pub fn in_place_relocation_claim_page(&self) -> ClaimOutcome<'_, P> {
        loop {
            let cur = self.ref_count.load(Ordering::Acquire);
            assert!(
                cur > 0,
                "in_place_relocation_claim_page called on a terminal or already-claimed page"
            );
            if self
                .ref_count
                .compare_exchange_weak(cur, -cur, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }

        let mut guard = self.ref_lock.lock().unwrap();
        while self.ref_count.load(Ordering::Acquire) != -1 {
            guard = self.ref_cond.wait(guard).unwrap();
        }
        drop(guard);

        ClaimedPage::new(self)
    }

    /// Record that in-place relocation of this page has begun on the calling
    /// thread, snapshotting the region's allocation top so later calls to
    /// [`Forwarding::is_below_top_at_start`] can tell old objects from ones
    /// allocated after relocation started.
    pub fn in_place_relocation_start(&self, thread: P::Thread) {
        self.in_place.store(true, Ordering::Release);
        let top = if let Some(region) = self.page.lock().unwrap().as_ref() {
            let top = region.top();
            region.log_msg(&format!("In-place reloc start  - relocated to: {top}"));
            top
        } else {
            0
        };
        self.in_place_top_at_start.store(top, Ordering::Release);
        // Published last, with release ordering, so a thread that observes
        // its own identity here (via `is_in_place_thread`'s acquire load)
        // also observes the store to `in_place_top_at_start` above.
        self.in_place_thread.store(thread.as_u64(), Ordering::Release);
    }

    /// Whether `offset` was below the region's allocation cursor at the
    /// moment [`Forwarding::in_place_relocation_start`] was called, as
    /// observed by `thread`. Only the relocating thread is allowed to know
    /// about the old relocation top -- this is the sole mechanism by which
    /// one thread may treat a region address as still referring to a
    /// from-space object while others treat it as to-space.
    pub fn is_below_top_at_start(&self, thread: P::Thread, offset: usize) -> bool {
        self.is_in_place_thread(thread) && offset < self.in_place_top_at_start.load(Ordering::Acquire)
    }

    /// Finish in-place relocation: the page is now equivalent to a normally
    /// relocated, fully drained page. Called through [`ClaimedPage::finish`]
    /// or its `Drop` fallback, never directly.
    pub(crate) fn in_place_relocation_finish(&self) {
        if let Some(region) = self.page.lock().unwrap().as_ref() {
            region.log_msg(&format!(
                "In-place reloc finish - top at start: {}",
                self.in_place_top_at_start.load(Ordering::Relaxed)
            ));

            // Only for non-promoted pages, that still need to reset their
            // live map. Done with iterating over the "from-page" view, so
            // can now drop the livemap. A page promoted from young to old
            // keeps its livemap: the old generation still needs it.
            if self.from_age == Age::Old || self.to_age != Age::Old {
                region.finalize_reset_for_in_place_relocation();
            }
        }
        // Disable relaxed is-below-top-at-start checks.
        self.in_place_thread.store(0, Ordering::Release);
        self.in_place.store(false, Ordering::Release);
        self.ref_count.store(0, Ordering::Release);
        self.notify_ref_waiters();
    }

    /// Whether in-place relocation is currently underway for this page.
    pub fn is_in_place(&self) -> bool {
        self.in_place.load(Ordering::Acquire)
    }

    /// Whether `thread` is the one currently performing in-place relocation
    /// of this page, if any.
    pub fn is_in_place_thread(&self, thread: P::Thread) -> bool {
        self.is_in_place() && self.in_place_thread.load(Ordering::Acquire) == thread.as_u64()
    }

    /// Record that the object at `from_index` was relocated to `to_offset`.
    /// Must only be called by the thread currently relocating this region.
    pub fn insert_entry(&self, from_index: FromIndex, to_offset: ToOffset) {
        self.entries.insert(from_index, to_offset);
    }

    /// Look up the to-space offset of the object originally at `from_index`.
    pub fn find_entry(&self, from_index: FromIndex) -> Option<ToOffset> {
        self.entries.find(from_index)
    }

    /// Record a to-space field address that used to carry a remembered-set
    /// entry. A no-op for forwardings whose source is young, since they have
    /// no [`RemsetHandshake`].
    pub fn push_remembered_field(&self, addr: <P::AddressSpace as AddressSpace>::Addr) {
        if let Some(remset) = &self.remset {
            remset.push_field(addr);
        }
    }

    /// Called once this region's relocation is complete: snapshots the
    /// current young generation's sequence number and, if the young
    /// generation is in its concurrent mark phase, immediately publishes the
    /// remembered-fields array. A no-op for young-sourced forwardings.
    pub fn after_relocate(&self, young: &P::Generation, region: &P::Region) {
        if let Some(remset) = &self.remset {
            remset.after_relocate(young, region.start(), region.end());
        }
    }

    /// OC side: publish the remembered-fields array. A no-op for
    /// young-sourced forwardings.
    pub fn publish(&self, region: &P::Region) {
        if let Some(remset) = &self.remset {
            remset.publish(region.start(), region.end());
        }
    }

    /// YC side: notify this forwarding that the current young collection is
    /// concurrently scanning its own remembered set and does not need the
    /// OC's published array, if any. A no-op for young-sourced forwardings.
    pub fn notify_concurrent_scan_of(&self, young: &P::Generation, region: &P::Region) {
        if let Some(remset) = &self.remset {
            remset.notify_concurrent_scan_of(young, region.start(), region.end());
        }
    }

    /// Mark this forwarding as pre-dating the current young collection:
    /// relocation finished, and no YC ever retained the page, so the current
    /// YC will never call `notify_concurrent_scan_of` on it. Returns any
    /// array the OC had published, which the caller must scan itself. Always
    /// empty for young-sourced forwardings.
    pub fn mark_pre_yc_terminal(&self) -> Vec<<P::AddressSpace as AddressSpace>::Addr> {
        match &self.remset {
            Some(remset) => remset.mark_pre_yc_terminal(),
            None => Vec::new(),
        }
    }

    /// Detach the page once it has reached the terminal, fully-released
    /// state (`ref_count == 0`), handing ownership back to the caller for
    /// recycling. Returns `None` if the page was already detached or is not
    /// yet terminal.
    pub fn detach_page(&self) -> Option<P::Region> {
        if self.ref_count.load(Ordering::Acquire) != 0 {
            return None;
        }
        self.page.lock().unwrap().take()
    }

    /// Total time and count of stalls observed in `wait_page_released`.
    pub fn stall_stat(&self) -> (u64, u64) {
        (self.stall_stat.total_nanos(), self.stall_stat.stall_count())
    }

    /// Cross-check this forwarding's invariants: no duplicate `from_index` or
    /// `to_offset` among populated entries, and every populated entry's
    /// to-space object fits inside the region bounds. Reports the total
    /// object count and live byte count found to the region via
    /// [`Region::verify_live`].
    pub fn verify(&self, address_space: &P::AddressSpace) {
        #[cfg(any(debug_assertions, feature = "extreme_assertions"))]
        self.entries
            .verify_no_duplicates()
            .unwrap_or_else(|msg| panic!("Forwarding::verify: {msg}"));

        let page = self.page.lock().unwrap();
        let Some(region) = page.as_ref() else {
            return;
        };
        let object_max_count = region.object_max_count();
        let alignment = region.object_alignment();

        let mut object_count = 0usize;
        let mut live_bytes = 0usize;
        for (from_index, to_offset) in self.entries.iter_populated() {
            assert!(
                (from_index as usize) < object_max_count,
                "Forwarding::verify: invalid from index {from_index}"
            );

            let addr = address_space.offset_to_address(to_offset);
            let size = address_space.object_size(addr);
            let aligned_size = P::AddressSpace::align_up(size, alignment);
            live_bytes += aligned_size;
            object_count += 1;
        }

        region.verify_live(object_count, live_bytes, self.is_in_place());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockAddressSpace, MockGeneration, MockPlatform, MockRegion, MockThread};
    use std::sync::Arc;
    use std::thread;

    fn forwarding(object_max_count: usize, from_age: Age) -> Forwarding<MockPlatform> {
        let region = match from_age {
            Age::Young => MockRegion::new(object_max_count),
            Age::Old => MockRegion::old(object_max_count),
        };
        Forwarding::new(region, from_age, Age::Old, Config::default())
    }

    /// S1: a single retain/release pair leaves the page retainable again.
    #[test]
    fn simple_retain_release() {
        let fwd = forwarding(16, Age::Young);
        match fwd.retain_page() {
            AccessOutcome::Retained(guard) => drop(guard),
            other => panic!("expected Retained, got {other:?}"),
        }
        assert_eq!(fwd.wait_page_released(), WaitOutcome::Released);
    }

    /// S2: an in-place claim blocks until the sole outstanding retain drains.
    #[test]
    fn claim_waits_for_retainer_to_release() {
        let fwd = Arc::new(forwarding(16, Age::Young));

        let retained = match fwd.retain_page() {
            AccessOutcome::Retained(guard) => guard,
            other => panic!("expected Retained, got {other:?}"),
        };

        let claimer = {
            let fwd = fwd.clone();
            thread::spawn(move || {
                let claim = fwd.in_place_relocation_claim_page();
                match claim {
                    ClaimOutcome::Claimed(page) => page.finish(),
                }
            })
        };

        // Give the claimer a chance to register its wait before we release.
        thread::yield_now();
        drop(retained);
        claimer.join().unwrap();
    }

    #[test]
    fn abort_releases_a_blocked_waiter() {
        let fwd = Arc::new(forwarding(16, Age::Young));
        let _retained = match fwd.retain_page() {
            AccessOutcome::Retained(guard) => guard,
            other => panic!("expected Retained, got {other:?}"),
        };

        let waiter = {
            let fwd = fwd.clone();
            thread::spawn(move || fwd.wait_page_released())
        };
        thread::yield_now();
        fwd.abort_page();
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Aborted);
    }

    #[test]
    fn retain_after_release_sees_released() {
        let fwd = forwarding(16, Age::Young);
        let claim = fwd.in_place_relocation_claim_page();
        match claim {
            ClaimOutcome::Claimed(page) => page.finish(),
        }
        match fwd.retain_page() {
            AccessOutcome::Released => {}
            other => panic!("expected Released, got {other:?}"),
        }
    }

    #[test]
    fn in_place_relocation_tracks_top_at_start() {
        let region = MockRegion::new(16);
        region.set_top(64);
        let fwd = Forwarding::<MockPlatform>::new(region, Age::Young, Age::Old, Config::default());
        let claim = fwd.in_place_relocation_claim_page();
        let page = match claim {
            ClaimOutcome::Claimed(page) => page,
        };
        let relocator = MockThread::current();
        fwd.in_place_relocation_start(relocator);
        assert!(page.is_below_top_at_start(relocator, 32));
        assert!(!page.is_below_top_at_start(relocator, 64));
        page.finish();
    }

    /// Invariant 2 (spec.md §8): only the relocating thread ever observes
    /// `true` from `is_below_top_at_start`; any other thread gets `false`
    /// regardless of offset.
    #[test]
    fn is_below_top_at_start_gates_on_thread_identity() {
        let region = MockRegion::new(16);
        region.set_top(64);
        let fwd = Forwarding::<MockPlatform>::new(region, Age::Young, Age::Old, Config::default());
        let claim = fwd.in_place_relocation_claim_page();
        let page = match claim {
            ClaimOutcome::Claimed(page) => page,
        };
        let relocator = MockThread::current();
        fwd.in_place_relocation_start(relocator);

        let other = thread::spawn(MockThread::current).join().unwrap();
        assert_ne!(relocator, other);
        assert!(!fwd.is_below_top_at_start(other, 32));
        assert!(fwd.is_below_top_at_start(relocator, 32));
        page.finish();
    }

    #[test]
    fn entry_table_round_trips() {
        let fwd = forwarding(16, Age::Young);
        fwd.insert_entry(0, 80);
        assert_eq!(fwd.find_entry(0), Some(80));
        assert_eq!(fwd.find_entry(1), None);
    }

    #[test]
    fn young_sourced_forwarding_has_no_remset() {
        let fwd = forwarding(16, Age::Young);
        let young = MockGeneration::default();
        fwd.push_remembered_field(0x10);
        fwd.publish(&MockRegion::new(16));
        fwd.notify_concurrent_scan_of(&young, &MockRegion::new(16));
        assert_eq!(fwd.mark_pre_yc_terminal(), Vec::<usize>::new());
    }

    #[test]
    fn old_sourced_forwarding_publishes_remset() {
        let fwd = forwarding(16, Age::Old);
        let young = MockGeneration::default();
        young.set_phase_mark(true);
        fwd.push_remembered_field(0x20);
        let region = MockRegion::old(16);
        fwd.after_relocate(&young, &region);
        let drained = fwd.mark_pre_yc_terminal();
        assert_eq!(drained, vec![0x20]);
    }

    #[test]
    fn verify_reports_live_bytes_to_region() {
        let region = MockRegion::new(16);
        let fwd = Forwarding::<MockPlatform>::new(region, Age::Young, Age::Old, Config::default());
        fwd.insert_entry(0, 0);
        fwd.insert_entry(1, 8);
        fwd.verify(&MockAddressSpace);
    }

    /// A page promoted from young to old keeps its livemap: the old
    /// generation still needs it, so `finalize_reset_for_in_place_relocation`
    /// must not be called for a `Young -> Old` in-place relocation.
    #[test]
    fn promoted_page_keeps_its_livemap_on_finish() {
        let region = MockRegion::new(16);
        let fwd = Forwarding::<MockPlatform>::new(region, Age::Young, Age::Old, Config::default());
        match fwd.in_place_relocation_claim_page() {
            ClaimOutcome::Claimed(page) => page.finish(),
        }
        let region = fwd.detach_page().expect("ref_count reached 0 after finish");
        assert!(!region.finalize_reset_called());
    }

    /// A non-promoted in-place relocation (old staying old, or young staying
    /// young) must reset its livemap once it's done iterating the from-page
    /// view.
    #[test]
    fn non_promoted_page_resets_its_livemap_on_finish() {
        let region = MockRegion::old(16);
        let fwd = Forwarding::<MockPlatform>::new(region, Age::Old, Age::Old, Config::default());
        match fwd.in_place_relocation_claim_page() {
            ClaimOutcome::Claimed(page) => page.finish(),
        }
        let region = fwd.detach_page().expect("ref_count reached 0 after finish");
        assert!(region.finalize_reset_called());
    }

    #[test]
    fn in_place_relocation_finish_clears_in_place_thread() {
        let fwd = forwarding(16, Age::Young);
        let thread = MockThread::current();
        match fwd.in_place_relocation_claim_page() {
            ClaimOutcome::Claimed(page) => {
                fwd.in_place_relocation_start(thread);
                assert!(fwd.is_in_place_thread(thread));
                page.finish();
            }
        }
        assert!(!fwd.is_in_place_thread(thread));
    }
}
