//! Minimal mock implementations of the [`crate::platform`] traits, used only
//! by this crate's own unit tests. The standalone integration tests in
//! `tests/` have an independent copy (`tests/mock.rs`) since they compile
//! against this crate as an external dependency and cannot see `#[cfg(test)]`
//! items.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::platform::{AddressSpace, Generation, Platform, Region, ThreadIdentity};

pub struct MockRegion {
    object_max_count: usize,
    top: AtomicUsize,
    finalize_reset_called: AtomicBool,
    is_young: bool,
}

impl MockRegion {
    pub fn new(object_max_count: usize) -> Self {
        Self {
            object_max_count,
            top: AtomicUsize::new(0),
            finalize_reset_called: AtomicBool::new(false),
            is_young: true,
        }
    }

    pub fn old(object_max_count: usize) -> Self {
        Self {
            is_young: false,
            ..Self::new(object_max_count)
        }
    }

    pub fn set_top(&self, top: usize) {
        self.top.store(top, Ordering::Relaxed);
    }

    pub fn finalize_reset_called(&self) -> bool {
        self.finalize_reset_called.load(Ordering::Relaxed)
    }
}

impl Region for MockRegion {
    fn start(&self) -> usize {
        0
    }
    fn end(&self) -> usize {
        self.object_max_count * 8
    }
    fn top(&self) -> usize {
        self.top.load(Ordering::Relaxed)
    }
    fn object_max_count(&self) -> usize {
        self.object_max_count
    }
    fn object_alignment(&self) -> usize {
        8
    }
    fn finalize_reset_for_in_place_relocation(&self) {
        self.finalize_reset_called.store(true, Ordering::Relaxed);
    }
    fn log_msg(&self, _msg: &str) {}
    fn verify_live(&self, _object_count: usize, _live_bytes: usize, _in_place: bool) {}
    fn is_young(&self) -> bool {
        self.is_young
    }
}

pub struct MockAddressSpace;

impl AddressSpace for MockAddressSpace {
    type Addr = usize;
    fn offset_to_address(&self, offset: usize) -> usize {
        offset
    }
    fn object_size(&self, _addr: usize) -> usize {
        8
    }
}

#[derive(Default)]
pub struct MockGeneration {
    seqnum: AtomicU32,
    phase_mark: AtomicBool,
}

impl MockGeneration {
    pub fn set_seqnum(&self, seqnum: u32) {
        self.seqnum.store(seqnum, Ordering::Relaxed);
    }
    pub fn set_phase_mark(&self, mark: bool) {
        self.phase_mark.store(mark, Ordering::Relaxed);
    }
}

impl Generation for MockGeneration {
    fn seqnum(&self) -> u32 {
        self.seqnum.load(Ordering::Relaxed)
    }
    fn is_phase_mark(&self) -> bool {
        self.phase_mark.load(Ordering::Relaxed)
    }
}

static NEXT_THREAD_NUM: AtomicU64 = AtomicU64::new(1);

std::thread_local! {
    static THREAD_NUM: u64 = NEXT_THREAD_NUM.fetch_add(1, Ordering::Relaxed);
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MockThread(u64);

impl ThreadIdentity for MockThread {
    fn current() -> Self {
        MockThread(THREAD_NUM.with(|n| *n))
    }
    fn as_u64(self) -> u64 {
        self.0
    }
}

pub struct MockPlatform;

impl Platform for MockPlatform {
    type Region = MockRegion;
    type AddressSpace = MockAddressSpace;
    type Generation = MockGeneration;
    type Thread = MockThread;
}
