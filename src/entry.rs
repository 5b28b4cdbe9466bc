//! The per-object from-index -> to-offset table inside a [`crate::Forwarding`]
//! (component C2).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Index of an object within its from-space region's object-slot numbering.
pub type FromIndex = u32;

/// Offset of the relocated copy of an object within its to-space region.
pub type ToOffset = usize;

/// Sentinel written into a slot's `from_index` before it is populated. Real
/// indices never reach `u32::MAX` in practice (it would mean a region holds
/// four billion live objects), so this is safe to use as "empty".
const EMPTY: FromIndex = FromIndex::MAX;

struct Slot {
    from_index: AtomicU32,
    to_offset: AtomicUsize,
    /// Set last, with `Release` ordering, once `from_index` and `to_offset`
    /// are both written. Readers load this first with `Acquire` ordering so
    /// they never observe a partially-written slot.
    populated: AtomicBool,
}

impl Slot {
    fn empty() -> Self {
        Self {
            from_index: AtomicU32::new(EMPTY),
            to_offset: AtomicUsize::new(0),
            populated: AtomicBool::new(false),
        }
    }
}

/// A fixed-capacity, open-addressed, linear-probing map from `FromIndex` to
/// `ToOffset`.
///
/// `insert` is writer-exclusive by protocol: only the single thread
/// relocating the owning region ever calls it, so it performs no locking of
/// its own. `find` is safe to call concurrently from any number of readers
/// while `insert` is in progress, because a slot's `populated` flag is the
/// single synchronization point between the two (release-store on write,
/// acquire-load on read).
pub struct ForwardingEntryTable {
    slots: Box<[Slot]>,
}

static_assertions::assert_impl_all!(ForwardingEntryTable: Send, Sync);

impl ForwardingEntryTable {
    /// Allocate a table with room for `capacity` entries. `capacity` must be
    /// at least 1.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ForwardingEntryTable capacity must be > 0");
        let slots = (0..capacity).map(|_| Slot::empty()).collect();
        Self { slots }
    }

    /// Number of slots in the table (not the number of populated entries).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn probe_start(&self, from_index: FromIndex) -> usize {
        (from_index as usize) % self.slots.len()
    }

    /// Insert `(from_index, to_offset)`. Must only be called by the thread
    /// currently relocating the owning region; concurrent calls to `insert`
    /// are not supported (linear probing would race on slot selection).
    ///
    /// Panics if the table is full or if `from_index` is already present --
    /// both indicate a bug in the caller, since a region's live object set
    /// is known ahead of time and should never be relocated twice.
    pub fn insert(&self, from_index: FromIndex, to_offset: ToOffset) {
        assert_ne!(from_index, EMPTY, "from_index collides with the empty sentinel");
        let start = self.probe_start(from_index);
        for i in 0..self.slots.len() {
            let slot = &self.slots[(start + i) % self.slots.len()];
            if !slot.populated.load(Ordering::Relaxed) {
                slot.from_index.store(from_index, Ordering::Relaxed);
                slot.to_offset.store(to_offset, Ordering::Relaxed);
                slot.populated.store(true, Ordering::Release);
                return;
            }
            debug_assert_ne!(
                slot.from_index.load(Ordering::Relaxed),
                from_index,
                "duplicate from_index inserted into ForwardingEntryTable"
            );
        }
        panic!("ForwardingEntryTable is full");
    }

    /// Look up the to-space offset for `from_index`. Safe to call
    /// concurrently with `insert` and with other calls to `find`.
    pub fn find(&self, from_index: FromIndex) -> Option<ToOffset> {
        let start = self.probe_start(from_index);
        for i in 0..self.slots.len() {
            let slot = &self.slots[(start + i) % self.slots.len()];
            if !slot.populated.load(Ordering::Acquire) {
                // Linear probing never leaves a hole before the slot an
                // entry was inserted at, so an unpopulated slot means the
                // key isn't present (unless a concurrent insert is racing
                // with us -- in which case "not found yet" is a valid
                // answer for a lock-free reader).
                continue;
            }
            if slot.from_index.load(Ordering::Relaxed) == from_index {
                return Some(slot.to_offset.load(Ordering::Relaxed));
            }
        }
        None
    }

    /// Iterate over all currently populated `(from_index, to_offset)` pairs.
    /// Used by [`crate::Forwarding::verify`]; not part of the hot path.
    pub fn iter_populated(&self) -> impl Iterator<Item = (FromIndex, ToOffset)> + '_ {
        self.slots.iter().filter_map(|slot| {
            if slot.populated.load(Ordering::Acquire) {
                Some((
                    slot.from_index.load(Ordering::Relaxed),
                    slot.to_offset.load(Ordering::Relaxed),
                ))
            } else {
                None
            }
        })
    }

    /// Check that no `from_index` and no `to_offset` appears more than once
    /// among populated entries. Returns `Err` describing the first violation
    /// found, for [`crate::Forwarding::verify`] to turn into an assertion.
    pub fn verify_no_duplicates(&self) -> Result<(), String> {
        let entries: Vec<_> = self.iter_populated().collect();
        for (i, (from_i, to_i)) in entries.iter().enumerate() {
            for (from_j, to_j) in entries.iter().skip(i + 1) {
                if from_i == from_j {
                    return Err(format!("duplicate from_index {from_i}"));
                }
                if to_i == to_j {
                    return Err(format!("duplicate to_offset {to_i}"));
                }
            }
        }
        Ok(())
    }
}
